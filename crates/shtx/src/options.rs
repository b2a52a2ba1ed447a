//! Host-configurable settings for imports and animation runs.

use serde::{Deserialize, Serialize};

use crate::pixels::{ImageForm, PixelForm};

/// Frames a color-cycle animation may run before it is cut off.
pub const DEFAULT_MAX_FRAMES: usize = 1080;

const TRANSPARENT_INDEX_TAG: &str = "tidx";

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("File name {stem:?} has no component {position} (expected {expected})")]
    MissingComponent {
        stem: String,
        position: usize,
        expected: &'static str,
    },
    #[error("File name {stem:?} has {component:?} where {expected} was expected")]
    Unrecognized {
        stem: String,
        component: String,
        expected: &'static str,
    },
}

/// How a brand-new texture resource is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub pixel_form: PixelForm,
    pub image_form: ImageForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent_index: Option<usize>,
}

impl ImportOptions {
    /// Reads the settings encoded in an image file name of the form
    /// `<prefix>_<4bpp|8bpp>_<texture|tile>[_..._tidx<N>]_<NAME>`, returning
    /// the resource name (the last component, uppercased) alongside them.
    pub fn from_file_stem(stem: &str) -> Result<(String, Self), OptionsError> {
        let components: Vec<&str> = stem.split('_').collect();
        let component = |position: usize, expected: &'static str| {
            components
                .get(position)
                .map(|c| c.to_ascii_lowercase())
                .ok_or_else(|| OptionsError::MissingComponent {
                    stem: stem.to_owned(),
                    position,
                    expected,
                })
        };
        let unrecognized = |component: String, expected: &'static str| OptionsError::Unrecognized {
            stem: stem.to_owned(),
            component,
            expected,
        };

        let pixel_form = match component(1, "4bpp or 8bpp")?.as_str() {
            "4bpp" => PixelForm::Bpp4,
            "8bpp" => PixelForm::Bpp8,
            other => return Err(unrecognized(other.to_owned(), "4bpp or 8bpp")),
        };
        let image_form = match component(2, "texture or tile")?.as_str() {
            "texture" => ImageForm::Texture,
            "tile" => ImageForm::Tile,
            other => return Err(unrecognized(other.to_owned(), "texture or tile")),
        };
        let transparent_index = stem.find(TRANSPARENT_INDEX_TAG).and_then(|at| {
            let digits: String = stem[at + TRANSPARENT_INDEX_TAG.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        });
        let name = components
            .last()
            .map(|name| name.to_ascii_uppercase())
            .unwrap_or_default();

        Ok((
            name,
            ImportOptions {
                pixel_form,
                image_form,
                transparent_index,
            },
        ))
    }
}

/// How an image replaces the contents of an existing texture.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaceOptions {
    /// Generate a new palette from the image instead of mapping onto the
    /// current one.
    pub rebuild_palette: bool,
    /// Reserve a fully transparent palette slot at this index when
    /// rebuilding.
    pub transparent_index: Option<usize>,
    /// Allow the image to change the texture's dimensions.
    pub resize: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    /// Upper bound on the number of frames produced. Color cycles fall back
    /// to [`DEFAULT_MAX_FRAMES`].
    pub max_frames: Option<usize>,
}

impl AnimationOptions {
    #[must_use]
    pub fn frame_cap(&self) -> usize {
        self.max_frames.unwrap_or(DEFAULT_MAX_FRAMES)
    }
}
