//! Sprite layouts: an 8 byte header followed by fixed 0x1C byte blit records.

use std::fmt::Display;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::{
    resources::ParseError,
    utils::mem_reader::{self, MemReader},
};

pub(crate) const HEADER_LEN: usize = 8;
pub(crate) const RECORD_LEN: usize = 0x1C;

/// A per-channel multiplier packed as `0xAARRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tint(pub u32);

impl Tint {
    /// Opaque white, which leaves pixels unchanged.
    pub const IDENTITY: Tint = Tint(0xFFFF_FFFF);

    #[must_use]
    pub fn channels(self) -> [u8; 4] {
        let [a, r, g, b] = self.0.to_be_bytes();
        [r, g, b, a]
    }

    #[must_use]
    pub fn is_identity(self) -> bool {
        self == Tint::IDENTITY
    }
}

impl Default for Tint {
    fn default() -> Self {
        Tint::IDENTITY
    }
}

/// One blit: copy a rectangle of a texture onto the screen.
///
/// A negative `screen_w` or `screen_h` mirrors the blit on that axis; the
/// magnitude is the drawn size. A negative `texture_ref` makes the entry a
/// no-op that still counts toward the canvas size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub reserved0: i16,
    pub texture_ref: i16,
    pub reserved1: i16,
    pub screen_x: i16,
    pub screen_y: i16,
    pub texture_w: i16,
    pub texture_h: i16,
    pub texture_x: i16,
    pub texture_y: i16,
    pub screen_w: i16,
    pub screen_h: i16,
    pub reserved2: i16,
    pub tint: Tint,
}

impl LayoutEntry {
    pub fn parse(record: &[u8]) -> mem_reader::Result<Self> {
        let mut reader = MemReader::for_record("layout entry", record, RECORD_LEN)?;
        Ok(LayoutEntry {
            reserved0: reader.read_i16_le()?,
            texture_ref: reader.read_i16_le()?,
            reserved1: reader.read_i16_le()?,
            screen_x: reader.read_i16_le()?,
            screen_y: reader.read_i16_le()?,
            texture_w: reader.read_i16_le()?,
            texture_h: reader.read_i16_le()?,
            texture_x: reader.read_i16_le()?,
            texture_y: reader.read_i16_le()?,
            screen_w: reader.read_i16_le()?,
            screen_h: reader.read_i16_le()?,
            reserved2: reader.read_i16_le()?,
            tint: Tint(reader.read_u32_le()?),
        })
    }

    pub fn write_to<B: BufMut>(&self, out: &mut B) {
        for field in [
            self.reserved0,
            self.texture_ref,
            self.reserved1,
            self.screen_x,
            self.screen_y,
            self.texture_w,
            self.texture_h,
            self.texture_x,
            self.texture_y,
            self.screen_w,
            self.screen_h,
            self.reserved2,
        ] {
            out.put_i16_le(field);
        }
        out.put_u32_le(self.tint.0);
    }

    /// Index into the resolved texture list, or `None` for a no-op entry.
    #[must_use]
    pub fn texture_index(&self) -> Option<usize> {
        usize::try_from(self.texture_ref).ok()
    }

    #[must_use]
    pub fn flip_horizontal(&self) -> bool {
        self.screen_w < 0
    }

    #[must_use]
    pub fn flip_vertical(&self) -> bool {
        self.screen_h < 0
    }

    #[must_use]
    pub fn screen_size(&self) -> (u32, u32) {
        (
            u32::from(self.screen_w.unsigned_abs()),
            u32::from(self.screen_h.unsigned_abs()),
        )
    }

    /// The far corner of the drawn rectangle on each axis.
    #[must_use]
    pub fn screen_extent(&self) -> (i32, i32) {
        (
            i32::from(self.screen_x) + i32::from(self.screen_w.unsigned_abs()),
            i32::from(self.screen_y) + i32::from(self.screen_h.unsigned_abs()),
        )
    }
}

impl Display for LayoutEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (screen_right, screen_bottom) = self.screen_extent();
        write!(
            f,
            "texture {}: src ({}, {})-({}, {}) -> screen ({}, {})-({}, {})",
            self.texture_ref,
            self.texture_x,
            self.texture_y,
            i32::from(self.texture_x) + i32::from(self.texture_w),
            i32::from(self.texture_y) + i32::from(self.texture_h),
            self.screen_x,
            self.screen_y,
            screen_right,
            screen_bottom,
        )?;
        if self.flip_horizontal() {
            write!(f, " flip-h")?;
        }
        if self.flip_vertical() {
            write!(f, " flip-v")?;
        }
        if !self.tint.is_identity() {
            write!(f, " tint {:08X}", self.tint.0)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    header: [u8; HEADER_LEN],
    entries: Vec<LayoutEntry>,
    trailing: Vec<u8>,
}

impl Layout {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = MemReader::new("layout", data);
        let header = reader.read_array::<HEADER_LEN>()?;
        let (records, trailing) = mem_reader::split_records(reader.read_remaining(), RECORD_LEN);
        let entries = records
            .into_iter()
            .map(LayoutEntry::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if !trailing.is_empty() {
            log::debug!(
                "Layout has {} trailing bytes after {} entries",
                trailing.len(),
                entries.len()
            );
        }
        Ok(Layout {
            header,
            entries,
            trailing: trailing.to_vec(),
        })
    }

    #[must_use]
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Entries may be edited in place; the record count is fixed.
    pub fn entries_mut(&mut self) -> &mut [LayoutEntry] {
        &mut self.entries
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.entries.len() * RECORD_LEN + self.trailing.len());
        out.put_slice(&self.header);
        for entry in &self.entries {
            entry.write_to(&mut out);
        }
        out.put_slice(&self.trailing);
        out
    }
}
