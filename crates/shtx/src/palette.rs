//! 15-bit palettes and their 24-bit realization.
//!
//! Colors are stored as RGB555 and expanded on demand by shifting each 5-bit
//! channel left by three. Going the other way divides each 8-bit channel by
//! eight, so a 24-bit color survives a round trip only if every channel is
//! already a multiple of eight. That loss is part of the format.

use bytes::BufMut;
use image::{Rgba, RgbaImage};
use itertools::Itertools as _;

/// Swatch squares are this many pixels on a side.
const SWATCH_CELL: u32 = 16;
const SWATCH_COLUMNS: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("A palette must have between 1 and 256 colors, requested {requested}")]
    InvalidColorCount { requested: usize },
    #[error("Transparent index {index} is past the end of a {len} color palette")]
    TransparentIndexOutOfRange { index: usize, len: usize },
    #[error("Color quantization failed")]
    Quantize(#[from] imagequant::Error),
}

/// A 15-bit color: red in bits 0-4, green in bits 5-9, blue in bits 10-14.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rgb555(u16);

impl Rgb555 {
    pub const BLACK: Rgb555 = Rgb555(0);

    /// Wraps a raw value. Bit 15 is not part of the color and is dropped.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Rgb555(raw & 0x7FFF)
    }

    /// Builds a color from three 5-bit channels. Higher bits are masked off.
    #[must_use]
    pub const fn from_channels(r: u8, g: u8, b: u8) -> Self {
        Rgb555((r as u16 & 0x1F) | ((g as u16 & 0x1F) << 5) | ((b as u16 & 0x1F) << 10))
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [
            (self.0 & 0x1F) as u8,
            ((self.0 >> 5) & 0x1F) as u8,
            ((self.0 >> 10) & 0x1F) as u8,
        ]
    }

    /// Expands to 24-bit color; each channel is shifted left by three.
    #[must_use]
    pub const fn to_rgb24(self) -> [u8; 3] {
        let [r, g, b] = self.channels();
        [r << 3, g << 3, b << 3]
    }

    /// Truncates a 24-bit color; each channel is divided by eight.
    #[must_use]
    pub const fn from_rgb24(r: u8, g: u8, b: u8) -> Self {
        Rgb555::from_channels(r / 8, g / 8, b / 8)
    }
}

/// Expands an RGB555 value to an opaque 24-bit color.
#[must_use]
pub fn to24(color: Rgb555) -> Rgba<u8> {
    let [r, g, b] = color.to_rgb24();
    Rgba([r, g, b, 0xFF])
}

/// Truncates a 24-bit color to RGB555. Alpha is discarded.
#[must_use]
pub fn to15(color: Rgba<u8>) -> Rgb555 {
    let [r, g, b, _] = color.0;
    Rgb555::from_rgb24(r, g, b)
}

fn distance(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| {
            let d = u32::from(x.abs_diff(y));
            d * d
        })
        .sum()
}

/// An ordered list of up to 256 colors, at most one of which may be marked as
/// the fully transparent slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb555>,
    transparent: Option<usize>,
}

impl Palette {
    #[must_use]
    pub fn new(colors: Vec<Rgb555>) -> Self {
        Palette {
            colors,
            transparent: None,
        }
    }

    pub(crate) fn from_parts(colors: Vec<Rgb555>, transparent: Option<usize>) -> Self {
        let transparent = transparent.filter(|&index| index < colors.len());
        Palette {
            colors,
            transparent,
        }
    }

    /// Builds a palette from 24-bit colors. The first fully transparent color
    /// becomes the transparent slot.
    #[must_use]
    pub fn from_rgba(colors: &[Rgba<u8>]) -> Self {
        Palette {
            colors: colors.iter().copied().map(to15).collect(),
            transparent: colors.iter().position(|c| c.0[3] == 0),
        }
    }

    /// Reads little-endian RGB555 entries until the block is exhausted.
    #[must_use]
    pub fn parse(block: &[u8]) -> Self {
        Palette::new(
            block
                .chunks_exact(2)
                .map(|pair| Rgb555::new(u16::from_le_bytes([pair[0], pair[1]])))
                .collect(),
        )
    }

    /// Writes exactly `capacity` entries, padding with black or dropping
    /// surplus colors so the block length never changes.
    pub fn encode_into<B: BufMut>(&self, out: &mut B, capacity: usize) {
        for i in 0..capacity {
            let color = self.colors.get(i).copied().unwrap_or(Rgb555::BLACK);
            out.put_u16_le(color.raw());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Rgb555> {
        self.colors.get(index).copied()
    }

    #[must_use]
    pub fn transparent_index(&self) -> Option<usize> {
        self.transparent
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Rgb555] {
        &self.colors
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Rgb555] {
        &mut self.colors
    }

    /// The realized 24-bit color of an entry. The transparent slot has an
    /// alpha of zero; every other entry is opaque.
    #[must_use]
    pub fn color(&self, index: usize) -> Option<Rgba<u8>> {
        let color = self.colors.get(index)?;
        if self.transparent == Some(index) {
            Some(Rgba([0, 0, 0, 0]))
        } else {
            Some(to24(*color))
        }
    }

    pub fn colors(&self) -> impl Iterator<Item = Rgba<u8>> + '_ {
        (0..self.colors.len()).filter_map(|i| self.color(i))
    }

    /// Finds the entry closest to `color` by squared distance over all four
    /// channels, returning its index and the distance. Ties go to the lowest
    /// index.
    #[must_use]
    pub fn nearest_index(&self, color: Rgba<u8>) -> Option<(usize, u32)> {
        self.nearest_index_within(color, self.colors.len())
    }

    /// Like [`Palette::nearest_index`], but only considers the first `limit`
    /// entries.
    #[must_use]
    pub fn nearest_index_within(&self, color: Rgba<u8>, limit: usize) -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (index, candidate) in self.colors().take(limit).enumerate() {
            let dist = distance(candidate, color);
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((index, dist));
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }

    /// Inserts a transparent entry at `index`, shifting later entries up by
    /// one.
    pub fn insert_transparent(&mut self, index: usize) -> Result<(), PaletteError> {
        if index > self.colors.len() {
            return Err(PaletteError::TransparentIndexOutOfRange {
                index,
                len: self.colors.len(),
            });
        }
        self.colors.insert(index, Rgb555::BLACK);
        self.transparent = Some(index);
        Ok(())
    }

    /// Quantizes the colors of `image` down to at most `max_colors` entries.
    ///
    /// Fully transparent pixels do not contribute. If the image has fewer
    /// distinct colors than requested the palette is padded with black. When
    /// `transparent_index` is given, a transparent entry is inserted there,
    /// so the result holds `max_colors + 1` entries.
    pub fn from_image(
        image: &RgbaImage,
        max_colors: usize,
        transparent_index: Option<usize>,
    ) -> Result<Self, PaletteError> {
        if max_colors == 0 || max_colors > 256 {
            return Err(PaletteError::InvalidColorCount {
                requested: max_colors,
            });
        }

        let opaque: Vec<Rgba<u8>> = image.pixels().filter(|p| p.0[3] != 0).copied().collect();
        let distinct: Vec<Rgb555> = opaque
            .iter()
            .copied()
            .map(to15)
            .sorted_unstable()
            .dedup()
            .collect();
        let mut colors = if distinct.len() <= max_colors {
            distinct
        } else {
            quantize(&opaque, max_colors)?
        };
        log::debug!(
            "Built {} palette colors from a {}x{} image",
            colors.len(),
            image.width(),
            image.height()
        );
        colors.resize(max_colors, Rgb555::BLACK);

        let mut palette = Palette::new(colors);
        if let Some(index) = transparent_index {
            palette.insert_transparent(index)?;
        }
        Ok(palette)
    }

    /// Renders the palette as a grid of 16×16 swatches, sixteen per row.
    #[must_use]
    pub fn swatch_image(&self) -> RgbaImage {
        let count = u32::try_from(self.colors.len()).unwrap_or(u32::MAX);
        let rows = count.div_ceil(SWATCH_COLUMNS);
        RgbaImage::from_fn(SWATCH_COLUMNS * SWATCH_CELL, rows * SWATCH_CELL, |x, y| {
            let index = (y / SWATCH_CELL) * SWATCH_COLUMNS + x / SWATCH_CELL;
            self.color(index as usize).unwrap_or(Rgba([0, 0, 0, 0]))
        })
    }
}

/// Reduces `pixels` to at most `max_colors` opaque colors. Alpha is ignored.
fn quantize(pixels: &[Rgba<u8>], max_colors: usize) -> Result<Vec<Rgb555>, PaletteError> {
    let mut attributes = imagequant::new();
    // The quantizer needs room for at least two colors.
    attributes.set_max_colors(u32::try_from(max_colors.max(2)).unwrap_or(256))?;
    let bitmap: Vec<imagequant::RGBA> = pixels
        .iter()
        .map(|p| imagequant::RGBA::new(p.0[0], p.0[1], p.0[2], 0xFF))
        .collect();
    let mut image = attributes.new_image(bitmap, pixels.len(), 1, 0.0)?;
    let mut result = attributes.quantize(&mut image)?;
    Ok(result
        .palette_vec()
        .into_iter()
        .map(|color| Rgb555::from_rgb24(color.r, color.g, color.b))
        .take(max_colors)
        .collect())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn rgb555_survives_expansion(raw in 0u16..0x8000) {
            let color = Rgb555::new(raw);
            prop_assert_eq!(to15(to24(color)), color);
        }

        #[test]
        fn nearest_index_is_in_range(r: u8, g: u8, b: u8, a: u8) {
            let palette = Palette::new((0..37u16).map(|i| Rgb555::new(i * 811)).collect());
            let (index, _) = palette.nearest_index(Rgba([r, g, b, a])).unwrap();
            prop_assert!(index < palette.len());
        }
    }

    #[test]
    fn expansion_loses_low_bits() {
        let color = Rgba([0x0F, 0x17, 0xFF, 0xFF]);
        assert_eq!(to24(to15(color)), Rgba([0x08, 0x10, 0xF8, 0xFF]));
        assert_eq!(to15(Rgba([0x08, 0x10, 0xF8, 0xFF])), Rgb555::from_channels(1, 2, 31));
    }

    #[test]
    fn channel_layout() {
        let color = Rgb555::new(0x7C1F);
        assert_eq!(color.channels(), [31, 0, 31]);
        assert_eq!(Rgb555::new(0xFFFF).raw(), 0x7FFF);
        assert_eq!(Rgb555::from_channels(1, 2, 3).raw(), 1 | (2 << 5) | (3 << 10));
    }

    #[test]
    fn exact_match_has_zero_distance() {
        let palette = Palette::new(vec![
            Rgb555::from_channels(31, 0, 0),
            Rgb555::from_channels(0, 31, 0),
            Rgb555::from_channels(0, 0, 31),
        ]);
        let green = to24(Rgb555::from_channels(0, 31, 0));
        assert_eq!(palette.nearest_index(green), Some((1, 0)));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let palette = Palette::new(vec![
            Rgb555::from_channels(0, 0, 0),
            Rgb555::from_channels(2, 0, 0),
            Rgb555::from_channels(2, 0, 0),
        ]);
        // Equidistant from entries 0 and 1.
        let (index, _) = palette.nearest_index(Rgba([8, 0, 0, 0xFF])).unwrap();
        assert_eq!(index, 0);
        let (index, dist) = palette.nearest_index(Rgba([16, 0, 0, 0xFF])).unwrap();
        assert_eq!((index, dist), (1, 0));
    }

    #[test]
    fn empty_palette_has_no_nearest() {
        assert_eq!(Palette::default().nearest_index(Rgba([0, 0, 0, 0xFF])), None);
    }

    #[test]
    fn parse_and_encode_keep_block_length() {
        let block = [0x1F, 0x00, 0xE0, 0x83];
        let palette = Palette::parse(&block);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.get(0), Some(Rgb555::from_channels(31, 0, 0)));
        // Bit 15 is not part of the color.
        assert_eq!(palette.get(1), Some(Rgb555::new(0x03E0)));

        let mut out = Vec::new();
        palette.encode_into(&mut out, 3);
        assert_eq!(out, vec![0x1F, 0x00, 0xE0, 0x03, 0x00, 0x00]);
        let mut out = Vec::new();
        palette.encode_into(&mut out, 1);
        assert_eq!(out, vec![0x1F, 0x00]);
    }

    #[test]
    fn few_colors_are_padded_with_black() {
        let mut image = RgbaImage::from_pixel(8, 8, Rgba([0xF8, 0, 0, 0xFF]));
        image.put_pixel(0, 0, Rgba([0, 0xF8, 0, 0xFF]));
        let palette = Palette::from_image(&image, 16, None).unwrap();
        assert_eq!(palette.len(), 16);
        assert!(palette.as_slice().contains(&Rgb555::from_channels(31, 0, 0)));
        assert!(palette.as_slice().contains(&Rgb555::from_channels(0, 31, 0)));
        assert!(palette.as_slice()[2..].iter().all(|&c| c == Rgb555::BLACK));
    }

    #[test]
    fn transparent_slot_shifts_entries() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([0xF8, 0xF8, 0xF8, 0xFF]));
        let palette = Palette::from_image(&image, 15, Some(0)).unwrap();
        assert_eq!(palette.len(), 16);
        assert_eq!(palette.transparent_index(), Some(0));
        assert_eq!(palette.color(0), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(palette.get(1), Some(Rgb555::from_channels(31, 31, 31)));

        let mut palette = Palette::new(vec![Rgb555::BLACK; 4]);
        assert!(matches!(
            palette.insert_transparent(5),
            Err(PaletteError::TransparentIndexOutOfRange { index: 5, len: 4 })
        ));
    }

    #[test]
    fn quantizes_many_colors() {
        let image = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 0xFF])
        });
        let palette = Palette::from_image(&image, 16, None).unwrap();
        assert_eq!(palette.len(), 16);
        assert!(palette.as_slice().iter().unique().count() >= 12);
    }

    #[test]
    fn quantizes_to_a_single_color() {
        let mut image = RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([0x80 + (x * 4) as u8, 0x40 + (y * 4) as u8, 0x20, 0xFF])
        });
        // Transparent pixels never claim an entry.
        image.put_pixel(0, 0, Rgba([0, 0, 0xF8, 0]));
        let palette = Palette::from_image(&image, 1, None).unwrap();
        assert_eq!(palette.len(), 1);
        let [r, g, b] = palette.get(0).unwrap().channels();
        assert!(r >= 16 && g >= 8 && b < 8);
    }

    #[test]
    fn colors_that_share_an_rgb555_value_are_merged() {
        let image = RgbaImage::from_fn(8, 1, |x, _| Rgba([0xF8 + x as u8, 0, 0, 0xFF]));
        let palette = Palette::from_image(&image, 1, None).unwrap();
        assert_eq!(palette.as_slice(), &[Rgb555::from_channels(31, 0, 0)]);
    }

    #[test]
    fn rejects_zero_colors() {
        let image = RgbaImage::new(8, 8);
        assert!(matches!(
            Palette::from_image(&image, 0, None),
            Err(PaletteError::InvalidColorCount { requested: 0 })
        ));
    }

    #[test]
    fn swatch_layout() {
        let palette = Palette::new((0..48u16).map(Rgb555::new).collect());
        let swatch = palette.swatch_image();
        assert_eq!(swatch.dimensions(), (256, 48));
        assert_eq!(*swatch.get_pixel(16 * 3 + 2, 16 * 2 + 5), to24(Rgb555::new(35)));
    }
}
