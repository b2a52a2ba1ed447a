//! Reads and writes the graphics resources of a Nintendo DS game: indexed
//! textures, sprite layouts, and palette animations.
//!
//! Resources come out of the archive as raw bytes plus an index and a name.
//! [`resources::GraphicsResource`] decodes them into a typed form that can be
//! exported as an image, edited, animated, and encoded back into bytes of the
//! same layout.

#![deny(clippy::disallowed_types)] // Deny anyhow usage in this crate

pub mod animation;
pub mod compose;
pub mod ids;
pub mod options;
pub mod palette;
pub mod pixels;
pub mod resources;
pub mod utils;
