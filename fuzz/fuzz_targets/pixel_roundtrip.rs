#![no_main]

use libfuzzer_sys::fuzz_target;
use shtx::pixels::{ImageForm, PixelForm, decode, encode};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, pixels)) = data.split_first() else {
        return;
    };
    let pixel_form = if selector & 1 == 0 {
        PixelForm::Bpp4
    } else {
        PixelForm::Bpp8
    };
    let image_form = if selector & 2 == 0 {
        ImageForm::Tile
    } else {
        ImageForm::Texture
    };
    let width = 8 << ((selector >> 2) % 3);
    let height = 8 << ((selector >> 4) % 3);

    let Ok(raster) = decode(pixels, pixel_form, width, height, image_form) else {
        return;
    };
    let encoded = encode(&raster, pixel_form, image_form).unwrap();
    assert_eq!(&pixels[..encoded.len()], &encoded[..]);
});
