use bytes::BufMut as _;
use image::{Rgba, RgbaImage};

use crate::{
    palette::Rgb555,
    pixels::{ImageForm, PixelForm},
    resources::types::layout::{LayoutEntry, Tint},
};

/// A distinct, non-black palette color for every index.
#[must_use]
pub fn indexed_color(index: usize) -> Rgb555 {
    let index = u16::try_from(index).unwrap();
    Rgb555::new(0x0421 + index * 0x6B)
}

/// Builds a complete SHTX payload. `pixel_byte` supplies each stored pixel
/// byte in storage order.
#[must_use]
pub fn texture_bytes(
    pixel_form: PixelForm,
    width: u32,
    height: u32,
    pixel_byte: impl Fn(usize) -> u8,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_slice(b"SHTXDS");
    out.put_u16_le(pixel_form.code());
    out.put_slice(&[0x01, 0x00, 0x00, 0x01, 0xC0, 0x00]);
    out.put_u8(u8::try_from(width.trailing_zeros()).unwrap());
    out.put_u8(u8::try_from(height.trailing_zeros()).unwrap());
    out.put_slice(&[0x00, 0xC0, 0x00, 0x00]);
    for i in 0..pixel_form.palette_block_len() / 2 {
        out.put_u16_le(indexed_color(i).raw());
    }
    let image_form = match pixel_form {
        PixelForm::Bpp4 => ImageForm::Tile,
        PixelForm::Bpp8 => ImageForm::Texture,
    };
    for i in 0..pixel_form.packed_len(width, height, image_form) {
        out.put_u8(pixel_byte(i));
    }
    out
}

/// A smooth gradient with many distinct colors.
#[must_use]
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = u8::try_from(x * 255 / width.max(1)).unwrap();
        let g = u8::try_from(y * 255 / height.max(1)).unwrap();
        Rgba([r, g, r ^ g, 0xFF])
    })
}

/// An opaque image where every pixel has a different color.
#[must_use]
pub fn numbered_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            u8::try_from(x % 256).unwrap(),
            u8::try_from(y % 256).unwrap(),
            0x80,
            0xFF,
        ])
    })
}

/// A layout entry with the given source `(x, y, w, h)` and screen
/// `(x, y, w, h)` rectangles and no tint.
#[must_use]
pub fn layout_entry(
    texture_ref: i16,
    (texture_x, texture_y, texture_w, texture_h): (i16, i16, i16, i16),
    (screen_x, screen_y, screen_w, screen_h): (i16, i16, i16, i16),
) -> LayoutEntry {
    LayoutEntry {
        texture_ref,
        texture_x,
        texture_y,
        texture_w,
        texture_h,
        screen_x,
        screen_y,
        screen_w,
        screen_h,
        tint: Tint::IDENTITY,
        ..LayoutEntry::default()
    }
}
