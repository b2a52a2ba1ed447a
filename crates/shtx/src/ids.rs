//! Resource identity as handed over by the archive, and the fixed table that
//! decides how a resource's pixels are arranged.

use std::{fmt::Display, ops::RangeInclusive};

use crate::pixels::ImageForm;

/// Resources whose pixels are stored in tile form. Everything else is a
/// texture. The game hardcodes this per resource, so there is nothing in the
/// data to infer it from.
const TILE_FORM_INDICES: &[RangeInclusive<u16>] = &[
    0x19E..=0x1A7,
    0x2C0..=0x2C0,
    0x2C4..=0x2C6,
    0x2C8..=0x2C8,
    0x2CA..=0x2CA,
    0x2CC..=0x2CC,
    0x316..=0x316,
    0x318..=0x318,
    0x331..=0x331,
    0x370..=0x370,
    0x3A7..=0x3A7,
    0x3A9..=0x3A9,
    0x3AB..=0x3AB,
    0x3AF..=0x3AF,
    0x3FE..=0x3FE,
    0x41B..=0x42C,
    0x8B4..=0x8B7,
    0xB61..=0xB6F,
    0xBC9..=0xC1B,
    0xC70..=0xC78,
    0xCA3..=0xCA8,
    0xCAF..=0xCAF,
    0xD02..=0xD9F,
    0xDF3..=0xDF3,
    0xDFB..=0xE08,
    0xE0E..=0xE10,
    0xE17..=0xE25,
    0xE2A..=0xE41,
    0xE50..=0xE50,
];

/// The arrangement a resource uses when nothing overrides it.
#[must_use]
pub fn default_image_form(index: u16) -> ImageForm {
    if TILE_FORM_INDICES.iter().any(|range| range.contains(&index)) {
        ImageForm::Tile
    } else {
        ImageForm::Texture
    }
}

/// The archive's stable index for a resource, plus its name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    index: u16,
    name: String,
}

impl ResourceId {
    #[must_use]
    pub fn new(index: u16, name: impl Into<String>) -> Self {
        ResourceId {
            index,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn name_upper(&self) -> String {
        self.name.to_ascii_uppercase()
    }

    #[must_use]
    pub fn is_layout_name(&self) -> bool {
        self.name_upper().ends_with("BNL")
    }

    #[must_use]
    pub fn is_animation_name(&self) -> bool {
        self.name_upper().ends_with("BNA")
    }

    #[must_use]
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.contains(needle)
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:03X} ({})", self.index, self.name)
    }
}

impl std::fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourceId")
            .field(&format_args!("{:#05X}", self.index))
            .field(&self.name)
            .finish()
    }
}
