//! Palette animation records.
//!
//! An animation payload is a flat run of fixed-size records with no header.
//! Which record form it holds is not stored in the data; it is declared by the
//! resource's name.

use std::fmt::Display;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::{
    ids::ResourceId,
    palette::Rgb555,
    resources::ParseError,
    utils::mem_reader::{self, MemReader},
};

pub(crate) const ROTATE_RECORD_LEN: usize = 8;
pub(crate) const COLOR_CYCLE_RECORD_LEN: usize = 0xCC;

/// Number of control point slots in a color-cycle record.
pub const CONTROL_POINT_SLOTS: usize = 32;

/// Bit of the determinant marking control point colors as RGB555 literals.
const ABSOLUTE_COLORS: u8 = 0x10;

/// The record form an animation resource holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationStyle {
    Rotate,
    ColorCycle,
    /// The name declares neither form; the payload is kept as opaque bytes.
    Inert,
}

impl AnimationStyle {
    #[must_use]
    pub fn from_id(id: &ResourceId) -> Self {
        if id.name_contains("PAN") {
            AnimationStyle::Rotate
        } else if id.name_contains("CAN") {
            AnimationStyle::ColorCycle
        } else {
            AnimationStyle::Inert
        }
    }

    fn record_len(self) -> Option<usize> {
        match self {
            AnimationStyle::Rotate => Some(ROTATE_RECORD_LEN),
            AnimationStyle::ColorCycle => Some(COLOR_CYCLE_RECORD_LEN),
            AnimationStyle::Inert => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationDirection {
    Right,
    Left,
    /// Any other stored value, including the reserved type 3. Rejected when
    /// the animation is primed.
    Other(i16),
}

impl RotationDirection {
    #[must_use]
    pub fn from_raw(raw: i16) -> Self {
        match raw {
            1 => RotationDirection::Right,
            2 => RotationDirection::Left,
            other => RotationDirection::Other(other),
        }
    }

    #[must_use]
    pub fn raw(self) -> i16 {
        match self {
            RotationDirection::Right => 1,
            RotationDirection::Left => 2,
            RotationDirection::Other(raw) => raw,
        }
    }
}

/// Rotates a run of palette entries by one slot every `frames_per_tick` ticks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateEntry {
    pub palette_offset: i16,
    pub swap_size: i16,
    pub segment_size: u8,
    pub frames_per_tick: u8,
    pub direction: RotationDirection,
}

impl RotateEntry {
    pub fn parse(record: &[u8]) -> mem_reader::Result<Self> {
        let mut reader = MemReader::for_record("rotate entry", record, ROTATE_RECORD_LEN)?;
        Ok(RotateEntry {
            palette_offset: reader.read_i16_le()?,
            swap_size: reader.read_i16_le()?,
            segment_size: reader.read_u8()?,
            frames_per_tick: reader.read_u8()?,
            direction: RotationDirection::from_raw(reader.read_i16_le()?),
        })
    }

    pub fn write_to<B: BufMut>(&self, out: &mut B) {
        out.put_i16_le(self.palette_offset);
        out.put_i16_le(self.swap_size);
        out.put_u8(self.segment_size);
        out.put_u8(self.frames_per_tick);
        out.put_i16_le(self.direction.raw());
    }

    #[must_use]
    pub fn is_effective(&self) -> bool {
        self.frames_per_tick > 0 && self.segment_size > 0
    }
}

impl Display for RotateEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rotate offset {:#06X} type {} every {} ticks, {}x{}",
            self.palette_offset,
            self.direction.raw(),
            self.frames_per_tick,
            self.swap_size,
            self.segment_size
        )
    }
}

/// One stored control point. `color` is either an RGB555 literal or a
/// palette index depending on the entry's determinant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub color: i16,
    pub duration: i16,
    pub elapsed: i16,
}

/// Linearly fades one palette slot through a list of control points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCycleEntry {
    pub palette_offset: i16,
    pub determinant: u8,
    pub indexer: u8,
    pub points: [ControlPoint; CONTROL_POINT_SLOTS],
    /// Working state as last stored: red, green, blue, and packed color.
    pub working: [i16; 4],
}

impl ColorCycleEntry {
    pub fn parse(record: &[u8]) -> mem_reader::Result<Self> {
        let mut reader = MemReader::for_record("color cycle entry", record, COLOR_CYCLE_RECORD_LEN)?;
        let palette_offset = reader.read_i16_le()?;
        let determinant = reader.read_u8()?;
        let indexer = reader.read_u8()?;
        let mut points = [ControlPoint::default(); CONTROL_POINT_SLOTS];
        for point in &mut points {
            *point = ControlPoint {
                color: reader.read_i16_le()?,
                duration: reader.read_i16_le()?,
                elapsed: reader.read_i16_le()?,
            };
        }
        let mut working = [0i16; 4];
        for value in &mut working {
            *value = reader.read_i16_le()?;
        }
        Ok(ColorCycleEntry {
            palette_offset,
            determinant,
            indexer,
            points,
            working,
        })
    }

    pub fn write_to<B: BufMut>(&self, out: &mut B) {
        out.put_i16_le(self.palette_offset);
        out.put_u8(self.determinant);
        out.put_u8(self.indexer);
        for point in &self.points {
            out.put_i16_le(point.color);
            out.put_i16_le(point.duration);
            out.put_i16_le(point.elapsed);
        }
        for value in self.working {
            out.put_i16_le(value);
        }
    }

    #[must_use]
    pub fn colors_are_absolute(&self) -> bool {
        self.determinant & ABSOLUTE_COLORS != 0
    }

    /// The leading control points with a positive duration. The first point
    /// without one ends the list.
    pub fn active_points(&self) -> impl Iterator<Item = &ControlPoint> {
        self.points.iter().take_while(|point| point.duration > 0)
    }

    /// The stored color of a control point read as an RGB555 literal.
    #[must_use]
    pub fn literal_color(point: &ControlPoint) -> Rgb555 {
        Rgb555::new(u16::from_le_bytes(point.color.to_le_bytes()))
    }
}

impl Display for ColorCycleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "color cycle offset {:#06X} determinant {:#04X}, {} points",
            self.palette_offset,
            self.determinant,
            self.active_points().count()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationEntry {
    Rotate(RotateEntry),
    ColorCycle(ColorCycleEntry),
}

impl AnimationEntry {
    fn write_to<B: BufMut>(&self, out: &mut B) {
        match self {
            AnimationEntry::Rotate(entry) => entry.write_to(out),
            AnimationEntry::ColorCycle(entry) => entry.write_to(out),
        }
    }
}

impl Display for AnimationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnimationEntry::Rotate(entry) => entry.fmt(f),
            AnimationEntry::ColorCycle(entry) => entry.fmt(f),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Animation {
    style: AnimationStyle,
    entries: Vec<AnimationEntry>,
    trailing: Vec<u8>,
}

impl Animation {
    pub fn parse(data: &[u8], style: AnimationStyle) -> Result<Self, ParseError> {
        let Some(record_len) = style.record_len() else {
            log::debug!("Animation declares no record form, keeping {} bytes", data.len());
            return Ok(Animation {
                style,
                entries: Vec::new(),
                trailing: data.to_vec(),
            });
        };
        let (records, trailing) = mem_reader::split_records(data, record_len);
        let entries = records
            .into_iter()
            .map(|record| -> mem_reader::Result<_> {
                Ok(match style {
                    AnimationStyle::ColorCycle => {
                        AnimationEntry::ColorCycle(ColorCycleEntry::parse(record)?)
                    }
                    _ => AnimationEntry::Rotate(RotateEntry::parse(record)?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Parsed {} {style:?} animation entries", entries.len());
        Ok(Animation {
            style,
            entries,
            trailing: trailing.to_vec(),
        })
    }

    #[must_use]
    pub fn style(&self) -> AnimationStyle {
        self.style
    }

    #[must_use]
    pub fn entries(&self) -> &[AnimationEntry] {
        &self.entries
    }

    pub fn rotate_entries(&self) -> impl Iterator<Item = &RotateEntry> {
        self.entries.iter().filter_map(|entry| match entry {
            AnimationEntry::Rotate(entry) => Some(entry),
            AnimationEntry::ColorCycle(_) => None,
        })
    }

    pub fn color_cycle_entries(&self) -> impl Iterator<Item = &ColorCycleEntry> {
        self.entries.iter().filter_map(|entry| match entry {
            AnimationEntry::ColorCycle(entry) => Some(entry),
            AnimationEntry::Rotate(_) => None,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            entry.write_to(&mut out);
        }
        out.put_slice(&self.trailing);
        out
    }
}

#[cfg(test)]
mod tests {
    use datalit::datalit;

    use super::*;

    #[test]
    fn style_follows_name() {
        assert_eq!(
            AnimationStyle::from_id(&ResourceId::new(1, "BG_PAN_TEST_BNA")),
            AnimationStyle::Rotate
        );
        assert_eq!(
            AnimationStyle::from_id(&ResourceId::new(1, "BG_CAN_TEST_BNA")),
            AnimationStyle::ColorCycle
        );
        assert_eq!(
            AnimationStyle::from_id(&ResourceId::new(1, "BG_TEST_BNA")),
            AnimationStyle::Inert
        );
    }

    #[test]
    fn parses_rotate_records() {
        let data = datalit! {
            @endian = le,
            0x0010u16,
            0x0001u16,
            4u8,
            2u8,
            1u16,
            // second record: reserved type
            0x0020u16,
            0x0001u16,
            8u8,
            1u8,
            3u16,
            // partial record
            0xABu8,
        };
        let animation = Animation::parse(&data, AnimationStyle::Rotate).unwrap();
        let entries: Vec<_> = animation.rotate_entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            *entries[0],
            RotateEntry {
                palette_offset: 0x10,
                swap_size: 1,
                segment_size: 4,
                frames_per_tick: 2,
                direction: RotationDirection::Right,
            }
        );
        assert_eq!(entries[1].direction, RotationDirection::Other(3));
        assert_eq!(animation.to_bytes(), &data[..]);
        assert_eq!(
            entries[0].to_string(),
            "rotate offset 0x0010 type 1 every 2 ticks, 1x4"
        );
    }

    #[test]
    fn parses_color_cycle_record() {
        let mut data = datalit! {
            @endian = le,
            0x0005u16,
            0x10u8,
            0x00u8,
            0x7FFFu16,
            0x0003u16,
            0x0000u16,
            0x001Fu16,
            0x0002u16,
            0x0007u16,
        }
        .to_vec();
        data.resize(COLOR_CYCLE_RECORD_LEN, 0);
        data[0xCA] = 0x34;
        let animation = Animation::parse(&data, AnimationStyle::ColorCycle).unwrap();
        let entry = animation.color_cycle_entries().next().unwrap();
        assert_eq!(entry.palette_offset, 5);
        assert!(entry.colors_are_absolute());
        assert_eq!(entry.active_points().count(), 2);
        assert_eq!(
            entry.points[1],
            ControlPoint {
                color: 0x1F,
                duration: 2,
                elapsed: 7
            }
        );
        assert_eq!(entry.working, [0, 0, 0, 0x34]);
        assert_eq!(
            ColorCycleEntry::literal_color(&entry.points[0]),
            Rgb555::new(0x7FFF)
        );
        assert_eq!(animation.to_bytes(), data);
    }

    #[test]
    fn inert_animation_keeps_bytes() {
        let data = [1u8, 2, 3, 4, 5];
        let animation = Animation::parse(&data, AnimationStyle::Inert).unwrap();
        assert!(animation.entries().is_empty());
        assert_eq!(animation.to_bytes(), data);
    }
}
