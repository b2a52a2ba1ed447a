//! Frame-by-frame palette animation.
//!
//! An [`AnimationRun`] borrows the target texture resource mutably for its
//! whole lifetime: every tick mutates the live palette, and every frame it
//! yields is an owned copy of the resource taken right after that tick.

mod color_cycle;
mod rotate;

use crate::{
    options::AnimationOptions,
    resources::{
        GraphicsResource, ResourceKind,
        types::animation::{Animation, AnimationStyle},
    },
};

use self::{
    color_cycle::{ColorCycleInterpreter, CycleProgress},
    rotate::RotateInterpreter,
};

#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("Rotation entry {entry} has unsupported type {raw}")]
    UnsupportedRotation { entry: usize, raw: i16 },
    #[error("Entry {entry} covers palette slots {start}..{end}, but the palette has {len} colors")]
    PaletteRange {
        entry: usize,
        start: i64,
        end: i64,
        len: usize,
    },
    #[error(
        "Entry {entry} control point {point} refers to palette index {index}, but the palette has {len} colors"
    )]
    ControlPointIndex {
        entry: usize,
        point: usize,
        index: i16,
        len: usize,
    },
    #[error("Rotation entry {entry} makes the palette cycle too long to count")]
    CycleTooLong { entry: usize },
    #[error("Animation target must be a texture, found {actual}")]
    NotATexture { actual: ResourceKind },
}

#[derive(Debug)]
enum Interpreter {
    Rotate(RotateInterpreter),
    ColorCycle(ColorCycleInterpreter),
    Inert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Primed,
    Stepping,
    Done,
}

/// A primed animation driving one texture resource.
#[derive(Debug)]
pub struct AnimationRun<'t> {
    target: &'t mut GraphicsResource,
    interpreter: Interpreter,
    phase: Phase,
    tick: usize,
    frame_limit: Option<usize>,
}

impl<'t> AnimationRun<'t> {
    /// Primes `animation` against `target`'s palette.
    ///
    /// Every entry is validated here, so a malformed animation fails before
    /// the target is touched.
    pub fn new(
        animation: &Animation,
        target: &'t mut GraphicsResource,
        options: &AnimationOptions,
    ) -> Result<Self, AnimationError> {
        let Some(texture) = target.texture() else {
            return Err(AnimationError::NotATexture {
                actual: target.kind(),
            });
        };
        let palette = texture.palette().as_slice();

        let (interpreter, frame_limit) = match animation.style() {
            AnimationStyle::Rotate => {
                let interpreter =
                    RotateInterpreter::prime(animation.rotate_entries(), palette.len())?;
                let cycle = interpreter.cycle_len();
                let limit = options.max_frames.map_or(cycle, |max| max.min(cycle));
                (Interpreter::Rotate(interpreter), Some(limit))
            }
            AnimationStyle::ColorCycle => {
                let interpreter =
                    ColorCycleInterpreter::prime(animation.color_cycle_entries(), palette)?;
                (
                    Interpreter::ColorCycle(interpreter),
                    Some(options.frame_cap()),
                )
            }
            AnimationStyle::Inert => (Interpreter::Inert, Some(0)),
        };
        log::debug!(
            "Animating {} with a {:?} animation, up to {frame_limit:?} frames",
            target.id(),
            animation.style()
        );

        Ok(AnimationRun {
            target,
            interpreter,
            phase: Phase::Primed,
            tick: 0,
            frame_limit,
        })
    }

    #[must_use]
    pub fn tick(&self) -> usize {
        self.tick
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    fn step(&mut self) -> Option<GraphicsResource> {
        if self.frame_limit.is_some_and(|limit| self.tick >= limit) {
            if let Interpreter::ColorCycle(_) = self.interpreter {
                log::warn!(
                    "Color cycle on {} did not settle within {} frames",
                    self.target.id(),
                    self.tick
                );
            }
            return None;
        }
        let palette = self.target.texture_mut()?.palette_mut().as_mut_slice();
        let finished = match &mut self.interpreter {
            Interpreter::Rotate(interpreter) => {
                interpreter.step(self.tick, palette);
                false
            }
            Interpreter::ColorCycle(interpreter) => {
                interpreter.step(self.tick, palette) == CycleProgress::Finished
            }
            Interpreter::Inert => return None,
        };
        self.tick += 1;
        if finished {
            self.phase = Phase::Done;
        }
        Some(self.target.clone())
    }
}

impl Iterator for AnimationRun<'_> {
    type Item = GraphicsResource;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Done {
            return None;
        }
        let frame = self.step();
        if frame.is_none() {
            self.phase = Phase::Done;
        } else if self.phase == Phase::Primed {
            self.phase = Phase::Stepping;
        }
        frame
    }
}
