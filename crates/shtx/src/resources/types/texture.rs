//! `SHTX` texture resources: a 0x14 byte header, a fixed-size RGB555 palette
//! block, and the packed pixel data.

use bytes::BufMut as _;
use image::{Rgba, RgbaImage};

use crate::{
    options::{ImportOptions, ReplaceOptions},
    palette::{Palette, PaletteError, Rgb555},
    pixels::{self, CodecError, ImageForm, IndexedRaster, PixelForm},
    resources::ParseError,
    utils::mem_reader::MemReader,
};

pub(crate) const MAGIC: &[u8; 4] = b"SHTX";
pub(crate) const HEADER_LEN: usize = 0x14;

const FORM_OFFSET: usize = 0x06;
const WIDTH_OFFSET: usize = 0x0E;
const HEIGHT_OFFSET: usize = 0x0F;

/// Width used when a requested export width is not a valid dimension.
const FALLBACK_WIDTH: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Palette(#[from] PaletteError),
    #[error("Cannot map pixels onto an empty palette")]
    EmptyPalette,
}

fn dimension_from_log2(axis: &'static str, exponent: u8) -> Result<u32, CodecError> {
    let value = 1u32.checked_shl(exponent.into()).unwrap_or(0);
    pixels::validate_dimension(axis, value)
}

fn log2_dimension(value: u32) -> u8 {
    // Dimensions are validated powers of two no larger than 1024.
    u8::try_from(value.trailing_zeros()).unwrap_or(u8::MAX)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture {
    header: [u8; HEADER_LEN],
    pixel_form: PixelForm,
    width: u32,
    height: u32,
    image_form: ImageForm,
    palette: Palette,
    pixels: Vec<u8>,
}

impl Texture {
    #[must_use]
    pub(crate) fn has_magic(data: &[u8]) -> bool {
        data.starts_with(MAGIC)
    }

    pub fn parse(data: &[u8], image_form: ImageForm) -> Result<Self, ParseError> {
        let mut reader = MemReader::new("texture", data);
        let header: [u8; HEADER_LEN] = reader.read_array()?;

        let mut fields = MemReader::new("texture header", &header);
        let magic: [u8; 4] = fields.read_array()?;
        if &magic != MAGIC {
            return Err(ParseError::BadMagic {
                expected: *MAGIC,
                actual: magic,
            });
        }
        fields.seek_to(FORM_OFFSET)?;
        let code = fields.read_u16_le()?;
        let pixel_form = PixelForm::from_code(code).ok_or(ParseError::UnknownPixelForm { code })?;
        fields.seek_to(WIDTH_OFFSET)?;
        let width = dimension_from_log2("width", fields.read_u8()?)?;
        let height = dimension_from_log2("height", fields.read_u8()?)?;

        let palette = Palette::parse(reader.read_slice(pixel_form.palette_block_len())?);
        let pixels = reader.read_remaining().to_vec();

        log::debug!(
            "Parsed {pixel_form} {image_form} texture {width}x{height} with {} palette entries",
            palette.len()
        );
        Ok(Texture {
            header,
            pixel_form,
            width,
            height,
            image_form,
            palette,
            pixels,
        })
    }

    /// Creates a texture from a bitmap, generating its palette from the
    /// bitmap's colors.
    pub fn from_image(image: &RgbaImage, options: &ImportOptions) -> Result<Self, ImportError> {
        let width = pixels::validate_dimension("width", image.width())?;
        let height = pixels::validate_dimension("height", image.height())?;
        let pixel_form = options.pixel_form;

        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(MAGIC);
        header[4..6].copy_from_slice(b"DS");
        header[FORM_OFFSET..FORM_OFFSET + 2].copy_from_slice(&pixel_form.code().to_le_bytes());
        header[8..].copy_from_slice(&[
            0x01,
            0x00,
            0x00,
            0x01,
            0xC0,
            0x00,
            log2_dimension(width),
            log2_dimension(height),
            0x00,
            0xC0,
            0x00,
            0x00,
        ]);

        let mut texture = Texture {
            header,
            pixel_form,
            width,
            height,
            image_form: options.image_form,
            palette: Palette::new(vec![Rgb555::BLACK; pixel_form.color_count()]),
            pixels: vec![0; pixel_form.packed_len(width, height, options.image_form)],
        };
        texture.import_image(
            image,
            &ReplaceOptions {
                rebuild_palette: true,
                transparent_index: options.transparent_index,
                resize: false,
            },
        )?;
        Ok(texture)
    }

    #[must_use]
    pub fn pixel_form(&self) -> PixelForm {
        self.pixel_form
    }

    #[must_use]
    pub fn image_form(&self) -> ImageForm {
        self.image_form
    }

    pub fn set_image_form(&mut self, image_form: ImageForm) {
        self.image_form = image_form;
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
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub(crate) fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    /// The stored pixel bytes, including any bytes past the end of the image.
    #[must_use]
    pub fn pixel_data(&self) -> &[u8] {
        &self.pixels
    }

    fn palette_capacity(&self) -> usize {
        self.pixel_form.palette_block_len() / 2
    }

    fn image_len(&self) -> usize {
        self.pixel_form
            .packed_len(self.width, self.height, self.image_form)
    }

    /// Decodes the pixel data at the header's dimensions. If the data is
    /// shorter than the image, decoding stops at its end and the remaining
    /// pixels are index 0.
    pub fn raster(&self) -> Result<IndexedRaster, CodecError> {
        let expected = self.image_len();
        if self.pixels.len() < expected {
            log::warn!(
                "Texture holds {} pixel bytes, {expected} needed for {}x{} in {} form",
                self.pixels.len(),
                self.width,
                self.height,
                self.image_form
            );
        }
        pixels::decode_partial(
            &self.pixels,
            self.pixel_form,
            self.width,
            self.height,
            self.image_form,
        )
    }

    /// Decodes the pixel data at a different width, deriving the height from
    /// the data length. Invalid widths fall back to 256.
    pub fn raster_with_width(&self, width: u32) -> Result<IndexedRaster, CodecError> {
        let width = if pixels::VALID_DIMENSIONS.contains(&width) {
            width
        } else {
            log::warn!("Width {width} is not a valid dimension, using {FALLBACK_WIDTH}");
            FALLBACK_WIDTH
        };
        pixels::decode_with_width(&self.pixels, self.pixel_form, width, self.image_form)
    }

    /// Realizes a raster against this texture's palette. Pixels equal to
    /// `transparent_key` come out fully transparent, and indices past the end
    /// of the palette are opaque black.
    #[must_use]
    pub fn render(&self, raster: &IndexedRaster, transparent_key: Option<u8>) -> RgbaImage {
        RgbaImage::from_fn(raster.width(), raster.height(), |x, y| {
            match raster.get(x, y) {
                Some(index) if Some(index) != transparent_key => self
                    .palette
                    .color(usize::from(index))
                    .unwrap_or(Rgba([0, 0, 0, 0xFF])),
                _ => Rgba([0, 0, 0, 0]),
            }
        })
    }

    pub fn to_image(&self, transparent_key: Option<u8>) -> Result<RgbaImage, CodecError> {
        Ok(self.render(&self.raster()?, transparent_key))
    }

    pub fn to_image_with_width(
        &self,
        width: u32,
        transparent_key: Option<u8>,
    ) -> Result<RgbaImage, CodecError> {
        Ok(self.render(&self.raster_with_width(width)?, transparent_key))
    }

    /// Encodes `raster` into the replacement pixel data without touching
    /// `self`. Unless resizing, the image must occupy exactly as many bytes as
    /// the current one, and any trailing bytes are kept.
    fn encode_pixels(&self, raster: &IndexedRaster, resize: bool) -> Result<Vec<u8>, CodecError> {
        let mut bytes = pixels::encode(raster, self.pixel_form, self.image_form)?;
        if !resize {
            let expected = self.image_len();
            if bytes.len() != expected {
                return Err(CodecError::LengthMismatch {
                    expected,
                    actual: bytes.len(),
                });
            }
            let Some(trailing) = self.pixels.get(expected..) else {
                // The stored data is too short to take a full image in place.
                return Err(CodecError::LengthMismatch {
                    expected: self.pixels.len(),
                    actual: bytes.len(),
                });
            };
            bytes.extend_from_slice(trailing);
        }
        Ok(bytes)
    }

    fn commit_pixels(&mut self, raster: &IndexedRaster, pixels: Vec<u8>) {
        if raster.width() != self.width || raster.height() != self.height {
            log::warn!(
                "Resizing texture from {}x{} to {}x{}",
                self.width,
                self.height,
                raster.width(),
                raster.height()
            );
            self.width = raster.width();
            self.height = raster.height();
            self.header[WIDTH_OFFSET] = log2_dimension(self.width);
            self.header[HEIGHT_OFFSET] = log2_dimension(self.height);
        }
        self.pixels = pixels;
    }

    /// Replaces the pixel data with an already-indexed raster.
    pub fn set_raster(&mut self, raster: &IndexedRaster, resize: bool) -> Result<(), CodecError> {
        raster.check_indices(self.palette.len())?;
        let pixels = self.encode_pixels(raster, resize)?;
        self.commit_pixels(raster, pixels);
        Ok(())
    }

    /// Merges a new palette over the current one. Entries past the end of the
    /// new palette keep their current colors, and the result never exceeds the
    /// palette block.
    fn merged_palette(&self, new: Palette) -> Palette {
        let capacity = self.palette_capacity();
        let mut colors: Vec<Rgb555> = new.as_slice().iter().copied().take(capacity).collect();
        colors.extend(self.palette.as_slice().iter().skip(colors.len()).copied());
        colors.truncate(capacity);
        Palette::from_parts(colors, new.transparent_index())
    }

    /// Replaces the palette with user-supplied colors, optionally inserting a
    /// transparent entry.
    pub fn set_palette(
        &mut self,
        colors: &[Rgba<u8>],
        transparent_index: Option<usize>,
    ) -> Result<(), PaletteError> {
        let mut palette = Palette::from_rgba(colors);
        if let Some(index) = transparent_index {
            palette.insert_transparent(index)?;
        }
        self.palette = self.merged_palette(palette);
        Ok(())
    }

    /// Replaces the image with a bitmap, mapping each pixel to its nearest
    /// palette entry. Nothing is modified unless the whole import succeeds.
    pub fn import_image(
        &mut self,
        image: &RgbaImage,
        options: &ReplaceOptions,
    ) -> Result<(), ImportError> {
        pixels::validate_dimension("width", image.width())?;
        pixels::validate_dimension("height", image.height())?;

        let palette = if options.rebuild_palette {
            let reserved = usize::from(options.transparent_index.is_some());
            let max_colors = self.pixel_form.color_count() - reserved;
            log::info!("Generating a new {max_colors} color palette");
            self.merged_palette(Palette::from_image(
                image,
                max_colors,
                options.transparent_index,
            )?)
        } else {
            self.palette.clone()
        };

        let limit = palette.len().min(self.pixel_form.color_count());
        let indices = image
            .pixels()
            .map(|&pixel| {
                palette
                    .nearest_index_within(pixel, limit)
                    .and_then(|(index, _)| u8::try_from(index).ok())
                    .ok_or(ImportError::EmptyPalette)
            })
            .collect::<Result<Vec<u8>, _>>()?;
        let raster = IndexedRaster::new(image.width(), image.height(), indices)?;
        let pixels = self.encode_pixels(&raster, options.resize)?;

        self.palette = palette;
        self.commit_pixels(&raster, pixels);
        Ok(())
    }

    /// Serializes the header, palette block and pixel data.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.pixel_form.palette_block_len() + self.pixels.len());
        out.put_slice(&self.header);
        self.palette.encode_into(&mut out, self.palette_capacity());
        out.put_slice(&self.pixels);
        out
    }
}
