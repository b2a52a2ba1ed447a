//! Linear color cycling of single palette slots.
//!
//! All entries share one clock that advances by [`CLOCK_STEP`] per tick and
//! wraps at [`CLOCK_WRAP`]. Stored durations are in ticks and are scaled to
//! clock units when the animation is primed, so a control point with duration
//! `n` lasts `n` ticks.

use crate::{
    animation::AnimationError,
    palette::Rgb555,
    resources::types::animation::{CONTROL_POINT_SLOTS, ColorCycleEntry},
};

pub(crate) const CLOCK_STEP: usize = 0x20;
pub(crate) const CLOCK_WRAP: usize = 0x17E0;
const DURATION_SCALE: i32 = 32;

type Channels = [i32; 3];

fn channels(color: Rgb555) -> Channels {
    color.channels().map(i32::from)
}

fn pack(channels: Channels) -> Rgb555 {
    let [r, g, b] = channels.map(|c| u8::try_from(c & 0x1F).unwrap_or(0));
    Rgb555::from_channels(r, g, b)
}

/// Moves `from` toward `to` by `elapsed / duration` of the way, truncating
/// toward zero.
fn interpolate(from: Channels, to: Channels, elapsed: i32, duration: i32) -> Channels {
    let mut out = [0; 3];
    for ((channel, from), to) in out.iter_mut().zip(from).zip(to) {
        *channel = from + (to - from) * elapsed / duration;
    }
    out
}

#[derive(Clone, Debug)]
struct PrimedPoint {
    target: Channels,
    duration: i32,
}

/// One entry after priming. The parsed record is never modified.
#[derive(Clone, Debug)]
struct PrimedSlot {
    offset: usize,
    initial: Channels,
    points: Vec<PrimedPoint>,
    total: usize,
}

impl PrimedSlot {
    fn prime(index: usize, entry: &ColorCycleEntry, palette: &[Rgb555]) -> Result<Self, AnimationError> {
        let len = palette.len();
        let offset = usize::try_from(entry.palette_offset)
            .ok()
            .filter(|&offset| offset < len)
            .ok_or(AnimationError::PaletteRange {
                entry: index,
                start: i64::from(entry.palette_offset),
                end: i64::from(entry.palette_offset) + 1,
                len,
            })?;

        let absolute = entry.colors_are_absolute();
        let points = entry
            .active_points()
            .take(CONTROL_POINT_SLOTS)
            .enumerate()
            .map(|(point_index, point)| -> Result<PrimedPoint, AnimationError> {
                let target = if absolute {
                    ColorCycleEntry::literal_color(point)
                } else {
                    usize::try_from(point.color)
                        .ok()
                        .and_then(|i| palette.get(i).copied())
                        .ok_or(AnimationError::ControlPointIndex {
                            entry: index,
                            point: point_index,
                            index: point.color,
                            len,
                        })?
                };
                Ok(PrimedPoint {
                    target: channels(target),
                    duration: i32::from(point.duration) * DURATION_SCALE,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let total = points
            .iter()
            .map(|point| usize::try_from(point.duration).unwrap_or(0))
            .sum();

        Ok(PrimedSlot {
            offset,
            initial: channels(palette[offset]),
            points,
            total,
        })
    }

    /// The slot's color at clock time `clock`, or `None` if it has no active
    /// control points.
    ///
    /// The color is a function of the clock alone. The first pass through the
    /// control points starts from the slot's primed color and later passes
    /// start from the last target, so when the shared clock wraps back to zero
    /// the slot returns to its primed color even if the wrap lands partway
    /// through a pass. That return is what lets a run end on a frame equal to
    /// its first one.
    fn color_at(&self, clock: usize) -> Option<Rgb555> {
        if self.total == 0 {
            return None;
        }
        let pass = clock / self.total;
        let mut local = i32::try_from(clock % self.total).ok()?;
        let mut from = if pass == 0 {
            self.initial
        } else {
            self.points.last()?.target
        };
        for point in &self.points {
            if local < point.duration {
                return Some(pack(interpolate(from, point.target, local, point.duration)));
            }
            local -= point.duration;
            from = point.target;
        }
        // Only reachable if the durations do not sum to `total`.
        Some(pack(from))
    }
}

/// Tracks when a color-cycling palette has come back around.
///
/// The palette after the first tick is the reference. Once at least two later
/// frames have differed from it, the next frame that matches it ends the run.
#[derive(Clone, Debug, Default)]
struct CycleDetector {
    reference: Option<Vec<Rgb555>>,
    changes: usize,
}

impl CycleDetector {
    fn observe(&mut self, palette: &[Rgb555]) -> bool {
        let Some(reference) = &self.reference else {
            self.reference = Some(palette.to_vec());
            return false;
        };
        if reference.as_slice() == palette {
            self.changes >= 2
        } else {
            self.changes += 1;
            false
        }
    }
}

/// What the driver should do after a color-cycle tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CycleProgress {
    Continue,
    Finished,
}

#[derive(Clone, Debug)]
pub(crate) struct ColorCycleInterpreter {
    slots: Vec<PrimedSlot>,
    detector: CycleDetector,
}

impl ColorCycleInterpreter {
    /// Validates every entry against `palette` and resolves control point
    /// colors. Palette-relative colors are read from `palette` as it stands
    /// now and never re-read.
    pub(crate) fn prime<'a, I>(entries: I, palette: &[Rgb555]) -> Result<Self, AnimationError>
    where
        I: IntoIterator<Item = &'a ColorCycleEntry>,
    {
        let slots = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| PrimedSlot::prime(index, entry, palette))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Primed {} color cycle entries", slots.len());
        Ok(ColorCycleInterpreter {
            slots,
            detector: CycleDetector::default(),
        })
    }

    /// The shared clock value on tick `tick`.
    pub(crate) fn clock(tick: usize) -> usize {
        (tick * CLOCK_STEP) % CLOCK_WRAP
    }

    pub(crate) fn step(&mut self, tick: usize, palette: &mut [Rgb555]) -> CycleProgress {
        let clock = Self::clock(tick);
        for slot in &self.slots {
            if let Some(color) = slot.color_at(clock) {
                palette[slot.offset] = color;
            }
        }
        if self.detector.observe(palette) {
            CycleProgress::Finished
        } else {
            CycleProgress::Continue
        }
    }
}
