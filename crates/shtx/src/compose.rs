//! Assembles screen bitmaps from layout entries.
//!
//! Entries are drawn in order with straight overwrite, so later entries cover
//! earlier ones. Fully transparent source pixels are never drawn.

use image::{
    Rgba, RgbaImage,
    imageops::{self, FilterType},
};
use serde::{Deserialize, Serialize};

use crate::{
    ids::ResourceId,
    pixels::{CodecError, ImageForm},
    resources::{
        GraphicsResource,
        types::layout::{LayoutEntry, Tint},
    },
};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 0xFF]);

/// Largest canvas or tile edge that will be allocated. Layout coordinates are
/// signed 16-bit, so a corrupt entry can otherwise ask for a 65535 pixel edge.
pub const MAX_CANVAS_DIMENSION: u32 = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Layout entry {entry} references texture {texture}, which could not be resolved")]
    UnresolvedTexture { entry: usize, texture: usize },
    #[error("Entries {start}..{end} are out of range for a layout of {len} entries")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("Layout needs a {width}x{height} canvas, larger than {MAX_CANVAS_DIMENSION} on a side")]
    CanvasTooLarge { width: u32, height: u32 },
    #[error(
        "Layout entry {entry} draws a {width}x{height} tile, larger than {MAX_CANVAS_DIMENSION} on a side"
    )]
    TileTooLarge {
        entry: usize,
        width: u32,
        height: u32,
    },
}

/// Resolves a layout entry's texture reference to a decoded image.
pub trait TextureSource {
    fn texture(&self, index: usize) -> Option<&RgbaImage>;
}

impl TextureSource for [RgbaImage] {
    fn texture(&self, index: usize) -> Option<&RgbaImage> {
        self.get(index)
    }
}

impl TextureSource for Vec<RgbaImage> {
    fn texture(&self, index: usize) -> Option<&RgbaImage> {
        self.get(index)
    }
}

/// What the canvas holds before any entry is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    Transparent,
    /// Opaque black.
    Dark,
}

/// The textures a layout refers to relatively: reference `k` is the `k`-th
/// texture resource that follows the layout in container order.
#[derive(Clone, Debug, Default)]
pub struct SiblingTextures {
    textures: Vec<RgbaImage>,
}

impl SiblingTextures {
    /// Decodes as many sibling textures as `entries` can reference.
    ///
    /// `resources` must be in container order. Siblings are decoded in texture
    /// form with index 0 transparent. If the container runs out of textures the
    /// list is short, and composing an entry past its end fails.
    pub fn collect<'a, I>(
        layout: &ResourceId,
        entries: &[LayoutEntry],
        resources: I,
    ) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = &'a GraphicsResource>,
    {
        let needed = entries
            .iter()
            .filter_map(LayoutEntry::texture_index)
            .max()
            .map_or(0, |max| max + 1);
        let textures = resources
            .into_iter()
            .filter(|resource| resource.id().index() > layout.index())
            .filter_map(GraphicsResource::texture)
            .take(needed)
            .map(|texture| {
                let mut texture = texture.clone();
                texture.set_image_form(ImageForm::Texture);
                texture.to_image(Some(0))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if textures.len() < needed {
            log::warn!(
                "Layout {layout} references {needed} textures, but only {} follow it",
                textures.len()
            );
        }
        Ok(SiblingTextures { textures })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureSource for SiblingTextures {
    fn texture(&self, index: usize) -> Option<&RgbaImage> {
        self.textures.get(index)
    }
}

/// The canvas size that holds every entry's destination rectangle.
fn canvas_size(entries: &[LayoutEntry]) -> (u32, u32) {
    let (right, bottom) = entries
        .iter()
        .map(LayoutEntry::screen_extent)
        .fold((0, 0), |(w, h), (x, y)| (w.max(x), h.max(y)));
    (right.unsigned_abs(), bottom.unsigned_abs())
}

fn scale_channel(value: u8, factor: u8) -> u8 {
    u8::try_from(u16::from(value) * u16::from(factor) / 255).unwrap_or(u8::MAX)
}

fn apply_tint(tile: &mut RgbaImage, tint: Tint) {
    let factors = tint.channels();
    for pixel in tile.pixels_mut() {
        for (channel, &factor) in pixel.0.iter_mut().zip(factors.iter()) {
            *channel = scale_channel(*channel, factor);
        }
    }
}

/// The largest of the source rectangle and the screen rectangle, which bounds
/// what [`build_tile`] allocates.
fn tile_size(entry: &LayoutEntry) -> (u32, u32) {
    let (screen_w, screen_h) = entry.screen_size();
    (
        u32::from(entry.texture_w.unsigned_abs()).max(screen_w),
        u32::from(entry.texture_h.unsigned_abs()).max(screen_h),
    )
}

/// Cuts out the entry's source rectangle, then applies its flips, tint and
/// scaling. Parts of the rectangle outside the texture are transparent.
fn build_tile(entry: &LayoutEntry, texture: &RgbaImage) -> RgbaImage {
    let tile_w = u32::from(entry.texture_w.unsigned_abs());
    let tile_h = u32::from(entry.texture_h.unsigned_abs());
    let origin_x = i64::from(entry.texture_x);
    let origin_y = i64::from(entry.texture_y);
    let mut tile = RgbaImage::from_fn(tile_w, tile_h, |x, y| {
        let sx = u32::try_from(origin_x + i64::from(x)).ok();
        let sy = u32::try_from(origin_y + i64::from(y)).ok();
        sx.zip(sy)
            .and_then(|(sx, sy)| texture.get_pixel_checked(sx, sy))
            .copied()
            .unwrap_or(TRANSPARENT)
    });

    if entry.flip_horizontal() {
        imageops::flip_horizontal_in_place(&mut tile);
    }
    if entry.flip_vertical() {
        imageops::flip_vertical_in_place(&mut tile);
    }
    if !entry.tint.is_identity() {
        apply_tint(&mut tile, entry.tint);
    }

    let (dst_w, dst_h) = entry.screen_size();
    if (dst_w, dst_h) != tile.dimensions() && dst_w > 0 && dst_h > 0 && tile_w > 0 && tile_h > 0
    {
        tile = imageops::resize(&tile, dst_w, dst_h, FilterType::Nearest);
    }
    tile
}

fn blit(canvas: &mut RgbaImage, tile: &RgbaImage, entry: &LayoutEntry) {
    let (dst_w, dst_h) = entry.screen_size();
    let left = i64::from(entry.screen_x);
    let top = i64::from(entry.screen_y);
    for (x, y, pixel) in tile.enumerate_pixels() {
        if pixel.0[3] == 0 || x >= dst_w || y >= dst_h {
            continue;
        }
        let (Ok(cx), Ok(cy)) = (
            u32::try_from(left + i64::from(x)),
            u32::try_from(top + i64::from(y)),
        ) else {
            continue;
        };
        if cx < canvas.width() && cy < canvas.height() {
            canvas.put_pixel(cx, cy, *pixel);
        }
    }
}

fn draw_entries<T>(
    canvas: &mut RgbaImage,
    entries: &[LayoutEntry],
    first_entry: usize,
    textures: &T,
) -> Result<(), ComposeError>
where
    T: TextureSource + ?Sized,
{
    // Resolve everything first so a failure never leaves a half-drawn canvas.
    let resolved = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| entry.texture_index().map(|index| (i, entry, index)))
        .map(|(i, entry, index)| {
            let (width, height) = tile_size(entry);
            if width > MAX_CANVAS_DIMENSION || height > MAX_CANVAS_DIMENSION {
                return Err(ComposeError::TileTooLarge {
                    entry: first_entry + i,
                    width,
                    height,
                });
            }
            textures
                .texture(index)
                .map(|texture| (entry, texture))
                .ok_or(ComposeError::UnresolvedTexture {
                    entry: first_entry + i,
                    texture: index,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (entry, texture) in resolved {
        let tile = build_tile(entry, texture);
        blit(canvas, &tile, entry);
    }
    Ok(())
}

fn blank_canvas(
    entries: &[LayoutEntry],
    background: Background,
) -> Result<RgbaImage, ComposeError> {
    let (width, height) = canvas_size(entries);
    if width > MAX_CANVAS_DIMENSION || height > MAX_CANVAS_DIMENSION {
        return Err(ComposeError::CanvasTooLarge { width, height });
    }
    Ok(match background {
        Background::Transparent => RgbaImage::new(width, height),
        Background::Dark => RgbaImage::from_pixel(width, height, BLACK),
    })
}

/// Composites every entry onto a canvas just large enough to hold them all.
pub fn compose<T>(
    entries: &[LayoutEntry],
    textures: &T,
    background: Background,
) -> Result<RgbaImage, ComposeError>
where
    T: TextureSource + ?Sized,
{
    let mut canvas = blank_canvas(entries, background)?;
    draw_entries(&mut canvas, entries, 0, textures)?;
    log::debug!(
        "Composed {} layout entries onto a {}x{} canvas",
        entries.len(),
        canvas.width(),
        canvas.height()
    );
    Ok(canvas)
}

/// Composites `count` entries starting at `start`. The canvas is still sized
/// to hold the whole layout.
pub fn compose_range<T>(
    entries: &[LayoutEntry],
    start: usize,
    count: usize,
    textures: &T,
    background: Background,
) -> Result<RgbaImage, ComposeError>
where
    T: TextureSource + ?Sized,
{
    let end = start.saturating_add(count);
    let selected = entries
        .get(start..end)
        .ok_or(ComposeError::RangeOutOfBounds {
            start,
            end,
            len: entries.len(),
        })?;
    let mut canvas = blank_canvas(entries, background)?;
    draw_entries(&mut canvas, selected, start, textures)?;
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use crate::utils::testing::{layout_entry, numbered_image};

    use super::*;

    #[test]
    fn empty_layout_is_empty_image() {
        let textures: Vec<RgbaImage> = Vec::new();
        let canvas = compose(&[], &textures, Background::Transparent).unwrap();
        assert_eq!(canvas.dimensions(), (0, 0));
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let entry = layout_entry(-1, (0, 0, 8, 8), (i16::MAX, 0, i16::MIN, 8));
        let textures: Vec<RgbaImage> = Vec::new();
        assert!(matches!(
            compose(&[entry.clone()], &textures, Background::Dark),
            Err(ComposeError::CanvasTooLarge {
                width: 65535,
                height: 8
            })
        ));
        assert!(matches!(
            compose_range(&[entry], 0, 0, &textures, Background::Dark),
            Err(ComposeError::CanvasTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_tile_is_rejected() {
        let textures = vec![numbered_image(8, 8)];
        let entries = [
            layout_entry(0, (0, 0, 8, 8), (0, 0, 8, 8)),
            layout_entry(0, (0, 0, i16::MIN, 8), (0, 0, 8, 8)),
        ];
        assert!(matches!(
            compose(&entries, &textures, Background::Transparent),
            Err(ComposeError::TileTooLarge {
                entry: 1,
                width: 32768,
                height: 8
            })
        ));
    }

    #[test]
    fn noop_entry_still_sizes_canvas() {
        let entry = layout_entry(-1, (0, 0, 8, 8), (4, 2, 16, -8));
        let textures: Vec<RgbaImage> = Vec::new();
        let canvas = compose(&[entry], &textures, Background::Transparent).unwrap();
        assert_eq!(canvas.dimensions(), (20, 10));
        assert!(canvas.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn copies_source_rect() {
        let textures = vec![numbered_image(16, 16)];
        let entry = layout_entry(0, (4, 8, 4, 4), (2, 1, 4, 4));
        let canvas = compose(&[entry], &textures, Background::Transparent).unwrap();
        assert_eq!(canvas.dimensions(), (6, 5));
        assert_eq!(canvas.get_pixel(2, 1), textures[0].get_pixel(4, 8));
        assert_eq!(canvas.get_pixel(5, 4), textures[0].get_pixel(7, 11));
        assert_eq!(canvas.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn negative_width_mirrors_horizontally() {
        let textures = vec![numbered_image(8, 8)];
        let plain = compose(
            &[layout_entry(0, (0, 0, 8, 8), (0, 0, 8, 8))],
            &textures,
            Background::Transparent,
        )
        .unwrap();
        let flipped = compose(
            &[layout_entry(0, (0, 0, 8, 8), (0, 0, -8, 8))],
            &textures,
            Background::Transparent,
        )
        .unwrap();
        assert_eq!(flipped, imageops::flip_horizontal(&plain));

        let flipped = compose(
            &[layout_entry(0, (0, 0, 8, 8), (0, 0, 8, -8))],
            &textures,
            Background::Transparent,
        )
        .unwrap();
        assert_eq!(flipped, imageops::flip_vertical(&plain));
    }

    #[test]
    fn later_entries_overwrite_earlier() {
        let red = RgbaImage::from_pixel(8, 8, Rgba([0xFF, 0, 0, 0xFF]));
        let mut blue = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0xFF, 0xFF]));
        blue.put_pixel(0, 0, TRANSPARENT);
        let textures = vec![red, blue];
        let entries = [
            layout_entry(0, (0, 0, 8, 8), (0, 0, 8, 8)),
            layout_entry(1, (0, 0, 8, 8), (0, 0, 8, 8)),
        ];
        let canvas = compose(&entries, &textures, Background::Transparent).unwrap();
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([0xFF, 0, 0, 0xFF]));
        assert_eq!(*canvas.get_pixel(1, 0), Rgba([0, 0, 0xFF, 0xFF]));
    }

    #[test]
    fn tint_scales_every_channel() {
        let textures = vec![RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 0xFF]))];
        let mut entry = layout_entry(0, (0, 0, 8, 8), (0, 0, 8, 8));
        entry.tint = Tint(0x80FF_8000);
        let canvas = compose(&[entry], &textures, Background::Transparent).unwrap();
        assert_eq!(*canvas.get_pixel(3, 3), Rgba([200, 50, 0, 128]));
    }

    #[test]
    fn scales_to_destination_size() {
        let textures = vec![numbered_image(8, 8)];
        let entry = layout_entry(0, (0, 0, 4, 4), (0, 0, 8, 8));
        let canvas = compose(&[entry], &textures, Background::Transparent).unwrap();
        assert_eq!(canvas.dimensions(), (8, 8));
        assert_eq!(canvas.get_pixel(7, 7), textures[0].get_pixel(3, 3));
    }

    #[test]
    fn unresolved_texture_aborts() {
        let textures = vec![numbered_image(8, 8)];
        let entries = [
            layout_entry(0, (0, 0, 8, 8), (0, 0, 8, 8)),
            layout_entry(3, (0, 0, 8, 8), (0, 0, 8, 8)),
        ];
        assert!(matches!(
            compose(&entries, &textures, Background::Transparent),
            Err(ComposeError::UnresolvedTexture {
                entry: 1,
                texture: 3
            })
        ));
    }

    #[test]
    fn dark_background_and_ranges() {
        let textures = vec![numbered_image(8, 8)];
        let entries = [
            layout_entry(0, (0, 0, 4, 4), (0, 0, 4, 4)),
            layout_entry(0, (4, 4, 4, 4), (8, 8, 4, 4)),
        ];
        let canvas = compose_range(&entries, 1, 1, &textures, Background::Dark).unwrap();
        assert_eq!(canvas.dimensions(), (12, 12));
        assert_eq!(*canvas.get_pixel(0, 0), BLACK);
        assert_eq!(canvas.get_pixel(8, 8), textures[0].get_pixel(4, 4));
        assert!(matches!(
            compose_range(&entries, 1, 2, &textures, Background::Dark),
            Err(ComposeError::RangeOutOfBounds {
                start: 1,
                end: 3,
                len: 2
            })
        ));
    }
}
