//! Palette segment rotation.

use std::ops::Range;

use crate::{
    animation::AnimationError,
    palette::Rgb555,
    resources::types::animation::{RotateEntry, RotationDirection},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

#[derive(Clone, Debug)]
struct Segment {
    range: Range<usize>,
    frames_per_tick: usize,
    direction: Direction,
}

/// Rotation state for a set of entries, validated against one palette.
#[derive(Clone, Debug)]
pub(crate) struct RotateInterpreter {
    segments: Vec<Segment>,
    cycle_len: usize,
}

impl RotateInterpreter {
    /// Validates every entry against a palette of `palette_len` colors.
    ///
    /// Entries that would ever rotate must have a supported direction. Entries
    /// that are effective must also lie entirely within the palette.
    pub(crate) fn prime<'a, I>(entries: I, palette_len: usize) -> Result<Self, AnimationError>
    where
        I: IntoIterator<Item = &'a RotateEntry>,
    {
        let mut segments = Vec::new();
        let mut cycle_len: Option<usize> = None;
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.frames_per_tick == 0 {
                continue;
            }
            let direction = match entry.direction {
                RotationDirection::Right => Direction::Right,
                RotationDirection::Left => Direction::Left,
                RotationDirection::Other(raw) => {
                    return Err(AnimationError::UnsupportedRotation { entry: index, raw });
                }
            };
            if !entry.is_effective() {
                continue;
            }

            let start = i64::from(entry.palette_offset);
            let end = start + i64::from(entry.segment_size);
            let range = usize::try_from(start)
                .ok()
                .zip(usize::try_from(end).ok())
                .filter(|&(_, end)| end <= palette_len)
                .map(|(start, end)| start..end)
                .ok_or(AnimationError::PaletteRange {
                    entry: index,
                    start,
                    end,
                    len: palette_len,
                })?;

            let frames_per_tick = usize::from(entry.frames_per_tick);
            let period = frames_per_tick * usize::from(entry.segment_size);
            let combined = match cycle_len {
                None => Some(period),
                Some(len) => (len / num::integer::gcd(len, period)).checked_mul(period),
            };
            cycle_len = Some(combined.ok_or(AnimationError::CycleTooLong { entry: index })?);
            segments.push(Segment {
                range,
                frames_per_tick,
                direction,
            });
        }

        let cycle_len = cycle_len.unwrap_or_else(|| {
            log::warn!("Rotation animation has no effective entries");
            0
        });
        log::debug!(
            "Primed {} rotation segments with a cycle of {cycle_len} ticks",
            segments.len()
        );
        Ok(RotateInterpreter {
            segments,
            cycle_len,
        })
    }

    pub(crate) fn cycle_len(&self) -> usize {
        self.cycle_len
    }

    /// Applies tick `tick`: each segment due on this tick moves by one slot.
    pub(crate) fn step(&self, tick: usize, palette: &mut [Rgb555]) {
        for segment in &self.segments {
            if tick % segment.frames_per_tick != 0 {
                continue;
            }
            let slice = &mut palette[segment.range.clone()];
            match segment.direction {
                Direction::Right => slice.rotate_right(1),
                Direction::Left => slice.rotate_left(1),
            }
        }
    }
}
