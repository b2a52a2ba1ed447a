pub mod animation;
pub mod layout;
pub mod texture;
