//! Conversion between the hardware pixel packings and a linear indexed raster.
//!
//! Two arrangements exist. Tile form stores the image as 8×8 blocks in
//! row-major block order, each block scanned row by row; 4bpp packs two pixels
//! per byte with the first pixel in the low nibble. Texture form stores pixels
//! row-major with one byte per pixel.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Widths and heights a resource header can declare.
pub const VALID_DIMENSIONS: [u32; 8] = [8, 16, 32, 64, 128, 256, 512, 1024];

const TILE_DIM: u32 = 8;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{axis} {value} is not one of {VALID_DIMENSIONS:?}")]
    InvalidDimension { axis: &'static str, value: u32 },
    #[error("Pixel buffer length mismatch: expected {expected} bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Pixel {position} has index {index}, but only {limit} colors are addressable")]
    IndexOutOfRange {
        position: usize,
        index: u8,
        limit: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelForm {
    #[serde(rename = "4bpp")]
    Bpp4,
    #[serde(rename = "8bpp")]
    Bpp8,
}

impl PixelForm {
    /// Maps the header's form code (the number of colors) to a pixel form.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x10 => Some(PixelForm::Bpp4),
            0x100 => Some(PixelForm::Bpp8),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            PixelForm::Bpp4 => 0x10,
            PixelForm::Bpp8 => 0x100,
        }
    }

    #[must_use]
    pub fn color_count(self) -> usize {
        match self {
            PixelForm::Bpp4 => 16,
            PixelForm::Bpp8 => 256,
        }
    }

    /// Size of the palette block that follows the resource header.
    #[must_use]
    pub fn palette_block_len(self) -> usize {
        match self {
            PixelForm::Bpp4 => 0x60,
            PixelForm::Bpp8 => 0x200,
        }
    }

    /// Number of bytes a single row of `width` pixels occupies.
    #[must_use]
    pub fn row_bytes(self, width: u32, image_form: ImageForm) -> usize {
        match (self, image_form) {
            (PixelForm::Bpp4, ImageForm::Tile) => width as usize / 2,
            _ => width as usize,
        }
    }

    /// Number of bytes an image of the given size occupies.
    #[must_use]
    pub fn packed_len(self, width: u32, height: u32, image_form: ImageForm) -> usize {
        self.row_bytes(width, image_form) * height as usize
    }
}

impl Display for PixelForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelForm::Bpp4 => write!(f, "4bpp"),
            PixelForm::Bpp8 => write!(f, "8bpp"),
        }
    }
}

/// The arrangement of pixels within the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageForm {
    Texture,
    Tile,
}

impl Display for ImageForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageForm::Texture => write!(f, "texture"),
            ImageForm::Tile => write!(f, "tile"),
        }
    }
}

/// Checks that a width or height is one of [`VALID_DIMENSIONS`].
pub fn validate_dimension(axis: &'static str, value: u32) -> Result<u32, CodecError> {
    if VALID_DIMENSIONS.contains(&value) {
        Ok(value)
    } else {
        Err(CodecError::InvalidDimension { axis, value })
    }
}

/// A row-major raster of palette indices, one per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedRaster {
    width: u32,
    height: u32,
    indices: Vec<u8>,
}

impl IndexedRaster {
    pub fn new(width: u32, height: u32, indices: Vec<u8>) -> Result<Self, CodecError> {
        let expected = width as usize * height as usize;
        if indices.len() != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: indices.len(),
            });
        }
        Ok(Self {
            width,
            height,
            indices,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.indices[y as usize * self.width as usize + x as usize])
    }

    /// Fails with the first pixel whose index is not below `limit`.
    pub fn check_indices(&self, limit: usize) -> Result<(), CodecError> {
        match self
            .indices
            .iter()
            .position(|&index| usize::from(index) >= limit)
        {
            Some(position) => Err(CodecError::IndexOutOfRange {
                position,
                index: self.indices[position],
                limit,
            }),
            None => Ok(()),
        }
    }
}

/// Visits every pixel position in storage order.
fn for_each_stored_position<F>(width: u32, height: u32, image_form: ImageForm, mut body: F)
where
    F: FnMut(u32, u32),
{
    match image_form {
        ImageForm::Texture => {
            for y in 0..height {
                for x in 0..width {
                    body(x, y);
                }
            }
        }
        ImageForm::Tile => {
            for block_row in 0..height / TILE_DIM {
                for block_col in 0..width / TILE_DIM {
                    for ypix in 0..TILE_DIM {
                        for xpix in 0..TILE_DIM {
                            body(block_col * TILE_DIM + xpix, block_row * TILE_DIM + ypix);
                        }
                    }
                }
            }
        }
    }
}

fn decode_unchecked(
    bytes: &[u8],
    pixel_form: PixelForm,
    width: u32,
    height: u32,
    image_form: ImageForm,
) -> IndexedRaster {
    let stride = width as usize;
    let mut indices = vec![0u8; stride * height as usize];
    let mut stored = 0usize;
    let packed = pixel_form == PixelForm::Bpp4 && image_form == ImageForm::Tile;
    for_each_stored_position(width, height, image_form, |x, y| {
        let index = if packed {
            bytes
                .get(stored / 2)
                .map(|byte| (byte >> ((stored % 2) * 4)) & 0xF)
        } else {
            bytes.get(stored).copied()
        };
        if let Some(index) = index {
            indices[y as usize * stride + x as usize] = index;
        }
        stored += 1;
    });
    IndexedRaster {
        width,
        height,
        indices,
    }
}

/// Decodes a pixel payload of exactly `width`×`height` pixels.
///
/// Bytes past the end of the image are ignored; a payload that is too short
/// is rejected.
pub fn decode(
    bytes: &[u8],
    pixel_form: PixelForm,
    width: u32,
    height: u32,
    image_form: ImageForm,
) -> Result<IndexedRaster, CodecError> {
    validate_dimension("width", width)?;
    validate_dimension("height", height)?;
    let expected = pixel_form.packed_len(width, height, image_form);
    if bytes.len() < expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(decode_unchecked(
        bytes, pixel_form, width, height, image_form,
    ))
}

/// Decodes as much of a `width`×`height` image as `bytes` holds. Pixels past
/// the end of the data are left at index 0.
pub fn decode_partial(
    bytes: &[u8],
    pixel_form: PixelForm,
    width: u32,
    height: u32,
    image_form: ImageForm,
) -> Result<IndexedRaster, CodecError> {
    validate_dimension("width", width)?;
    validate_dimension("height", height)?;
    Ok(decode_unchecked(
        bytes, pixel_form, width, height, image_form,
    ))
}

/// Decodes a payload at an arbitrary valid width, deriving the height from
/// the payload length. Tile-form heights are rounded down to whole blocks.
pub fn decode_with_width(
    bytes: &[u8],
    pixel_form: PixelForm,
    width: u32,
    image_form: ImageForm,
) -> Result<IndexedRaster, CodecError> {
    validate_dimension("width", width)?;
    let row_bytes = pixel_form.row_bytes(width, image_form);
    let mut height = u32::try_from(bytes.len() / row_bytes).unwrap_or(u32::MAX);
    if image_form == ImageForm::Tile {
        height -= height % TILE_DIM;
    }
    Ok(decode_unchecked(
        bytes, pixel_form, width, height, image_form,
    ))
}

/// Packs a raster back into its stored form. This is the exact inverse of
/// [`decode`].
pub fn encode(
    raster: &IndexedRaster,
    pixel_form: PixelForm,
    image_form: ImageForm,
) -> Result<Vec<u8>, CodecError> {
    let width = validate_dimension("width", raster.width)?;
    let height = validate_dimension("height", raster.height)?;
    let packed = pixel_form == PixelForm::Bpp4 && image_form == ImageForm::Tile;
    if packed {
        raster.check_indices(pixel_form.color_count())?;
    }

    let mut bytes = vec![0u8; pixel_form.packed_len(width, height, image_form)];
    let mut stored = 0usize;
    for_each_stored_position(width, height, image_form, |x, y| {
        let index = raster.indices[y as usize * width as usize + x as usize];
        if packed {
            bytes[stored / 2] |= index << ((stored % 2) * 4);
        } else {
            bytes[stored] = index;
        }
        stored += 1;
    });
    Ok(bytes)
}

/// Packs a raster into a destination buffer that must already have the exact
/// encoded length. Nothing is written if the length does not match.
pub fn encode_into(
    raster: &IndexedRaster,
    pixel_form: PixelForm,
    image_form: ImageForm,
    dest: &mut [u8],
) -> Result<(), CodecError> {
    let expected = pixel_form.packed_len(raster.width, raster.height, image_form);
    if dest.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: dest.len(),
        });
    }
    let bytes = encode(raster, pixel_form, image_form)?;
    dest.copy_from_slice(&bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn arb_form() -> impl Strategy<Value = (PixelForm, ImageForm)> {
        prop::sample::select(vec![
            (PixelForm::Bpp4, ImageForm::Tile),
            (PixelForm::Bpp8, ImageForm::Tile),
            (PixelForm::Bpp4, ImageForm::Texture),
            (PixelForm::Bpp8, ImageForm::Texture),
        ])
    }

    fn arb_small_dimensions() -> impl Strategy<Value = (u32, u32)> {
        (
            prop::sample::select(VALID_DIMENSIONS[..5].to_vec()),
            prop::sample::select(VALID_DIMENSIONS[..5].to_vec()),
        )
    }

    /// One axis of 256 or more, the other kept small.
    fn arb_large_dimensions() -> impl Strategy<Value = (u32, u32)> {
        (
            prop::sample::select(VALID_DIMENSIONS[5..].to_vec()),
            prop::sample::select(VALID_DIMENSIONS[..2].to_vec()),
            any::<bool>(),
        )
            .prop_map(|(long, short, wide)| if wide { (long, short) } else { (short, long) })
    }

    fn arb_raster(
        dimensions: impl Strategy<Value = (u32, u32)>,
    ) -> impl Strategy<Value = (IndexedRaster, PixelForm, ImageForm)> {
        (dimensions, arb_form())
            .prop_flat_map(|((width, height), (pixel_form, image_form))| {
                let max = if pixel_form == PixelForm::Bpp4 { 15 } else { 255 };
                prop::collection::vec(0u8..=max, (width * height) as usize).prop_map(
                    move |indices| {
                        (
                            IndexedRaster::new(width, height, indices).unwrap(),
                            pixel_form,
                            image_form,
                        )
                    },
                )
            })
    }

    fn check_round_trip(
        raster: &IndexedRaster,
        pixel_form: PixelForm,
        image_form: ImageForm,
    ) -> Result<(), TestCaseError> {
        let bytes = encode(raster, pixel_form, image_form)?;
        prop_assert_eq!(
            bytes.len(),
            pixel_form.packed_len(raster.width(), raster.height(), image_form)
        );
        let decoded = decode(&bytes, pixel_form, raster.width(), raster.height(), image_form)?;
        prop_assert_eq!(&decoded, raster);
        Ok(())
    }

    proptest! {
        #[test]
        fn decode_inverts_encode((raster, pixel_form, image_form) in arb_raster(arb_small_dimensions())) {
            check_round_trip(&raster, pixel_form, image_form)?;
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn decode_inverts_encode_at_large_sizes(
            (raster, pixel_form, image_form) in arb_raster(arb_large_dimensions())
        ) {
            check_round_trip(&raster, pixel_form, image_form)?;
        }
    }

    #[test]
    fn large_dimensions_round_trip() {
        let indices = (0..1024u32 * 8).map(|i| (i % 16) as u8).collect();
        let raster = IndexedRaster::new(1024, 8, indices).unwrap();
        let bytes = encode(&raster, PixelForm::Bpp4, ImageForm::Tile).unwrap();
        assert_eq!(bytes.len(), 1024 * 8 / 2);
        let decoded = decode(&bytes, PixelForm::Bpp4, 1024, 8, ImageForm::Tile).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn tile_4bpp_nibble_order() {
        // First tile row: pixel 0 in the low nibble, pixel 1 in the high nibble.
        let mut bytes = vec![0u8; 8 * 8 / 2];
        bytes[0] = 0x21;
        bytes[4] = 0x0F;
        let raster = decode(&bytes, PixelForm::Bpp4, 8, 8, ImageForm::Tile).unwrap();
        assert_eq!(raster.get(0, 0), Some(1));
        assert_eq!(raster.get(1, 0), Some(2));
        assert_eq!(raster.get(0, 1), Some(0xF));
        assert_eq!(raster.get(1, 1), Some(0));
    }

    #[test]
    fn tile_blocks_are_row_major() {
        // 16x8 image: the second block holds the right half of the image.
        let mut bytes = vec![0u8; 16 * 8];
        bytes[64] = 7;
        bytes[64 + 9] = 9;
        let raster = decode(&bytes, PixelForm::Bpp8, 16, 8, ImageForm::Tile).unwrap();
        assert_eq!(raster.get(8, 0), Some(7));
        assert_eq!(raster.get(9, 1), Some(9));
        assert_eq!(raster.get(0, 0), Some(0));
    }

    #[test]
    fn texture_form_is_row_major() {
        let bytes: Vec<u8> = (0..64).collect();
        let raster = decode(&bytes, PixelForm::Bpp8, 8, 8, ImageForm::Texture).unwrap();
        assert_eq!(raster.get(3, 2), Some(19));
        assert_eq!(raster.indices(), &bytes[..]);
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        let bytes = vec![0u8; 12 * 8];
        assert!(matches!(
            decode(&bytes, PixelForm::Bpp8, 12, 8, ImageForm::Tile),
            Err(CodecError::InvalidDimension {
                axis: "width",
                value: 12
            })
        ));
        let raster = IndexedRaster::new(8, 2048, vec![0; 8 * 2048]).unwrap();
        assert!(matches!(
            encode(&raster, PixelForm::Bpp8, ImageForm::Texture),
            Err(CodecError::InvalidDimension {
                axis: "height",
                value: 2048
            })
        ));
    }

    #[test]
    fn short_payload_is_rejected() {
        let bytes = vec![0u8; 31];
        assert!(matches!(
            decode(&bytes, PixelForm::Bpp4, 8, 8, ImageForm::Tile),
            Err(CodecError::LengthMismatch {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn partial_decode_stops_at_end_of_data() {
        // Half the bytes a texture-form 8x8 image needs.
        let bytes: Vec<u8> = (1..=32).collect();
        let raster = decode_partial(&bytes, PixelForm::Bpp4, 8, 8, ImageForm::Texture).unwrap();
        assert_eq!(raster.get(7, 3), Some(32));
        assert_eq!(raster.get(0, 4), Some(0));
        assert_eq!(raster.get(7, 7), Some(0));
        assert!(matches!(
            decode_partial(&bytes, PixelForm::Bpp4, 8, 12, ImageForm::Texture),
            Err(CodecError::InvalidDimension { axis: "height", .. })
        ));
    }

    #[test]
    fn mismatched_destination_is_untouched() {
        let raster = IndexedRaster::new(8, 8, vec![1; 64]).unwrap();
        let mut dest = vec![0xAAu8; 63];
        let err = encode_into(&raster, PixelForm::Bpp8, ImageForm::Tile, &mut dest).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                expected: 64,
                actual: 63
            }
        ));
        assert!(dest.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn oversized_nibble_is_rejected() {
        let mut indices = vec![0u8; 64];
        indices[10] = 16;
        let raster = IndexedRaster::new(8, 8, indices).unwrap();
        assert!(matches!(
            encode(&raster, PixelForm::Bpp4, ImageForm::Tile),
            Err(CodecError::IndexOutOfRange {
                position: 10,
                index: 16,
                limit: 16
            })
        ));
    }

    #[test]
    fn raster_length_is_checked() {
        assert!(matches!(
            IndexedRaster::new(8, 8, vec![0; 63]),
            Err(CodecError::LengthMismatch {
                expected: 64,
                actual: 63
            })
        ));
    }

    #[test]
    fn width_override_derives_height() {
        let bytes = vec![0u8; 16 * 20];
        let raster = decode_with_width(&bytes, PixelForm::Bpp8, 16, ImageForm::Texture).unwrap();
        assert_eq!(raster.height(), 20);
        let tiles = decode_with_width(&bytes, PixelForm::Bpp8, 16, ImageForm::Tile).unwrap();
        assert_eq!(tiles.height(), 16);
    }
}
