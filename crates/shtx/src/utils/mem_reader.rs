use bytes::Buf as _;

#[derive(Debug, thiserror::Error)]
pub enum MemReaderError {
    #[error(
        "Not enough data reading {context} at offset {offset:#X}. Needed {required}, but only {available} available."
    )]
    NotEnoughData {
        context: &'static str,
        offset: usize,
        required: usize,
        available: usize,
    },
    #[error("Record size for {context} must be {expected:#X} bytes, was {actual:#X}")]
    RecordSize {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, MemReaderError>;

macro_rules! impl_read_int {
    ($name:ident, $get:ident, $ty:ty) => {
        pub(crate) fn $name(&mut self) -> Result<$ty> {
            self.ensure(std::mem::size_of::<$ty>())?;
            let mut buf = &self.data[self.offset..];
            let value = buf.$get();
            self.offset += std::mem::size_of::<$ty>();
            Ok(value)
        }
    };
}

/// A little-endian cursor over an in-memory payload.
///
/// Every read is bounds checked up front, so a failed read never advances the
/// cursor.
#[derive(Debug, Clone)]
pub(crate) struct MemReader<'a> {
    context: &'static str,
    data: &'a [u8],
    offset: usize,
}

impl<'a> MemReader<'a> {
    #[must_use]
    pub(crate) fn new(context: &'static str, data: &'a [u8]) -> Self {
        Self {
            context,
            data,
            offset: 0,
        }
    }

    /// Creates a reader over a fixed-length record, failing if the slice is
    /// not exactly `size` bytes long.
    pub(crate) fn for_record(context: &'static str, data: &'a [u8], size: usize) -> Result<Self> {
        if data.len() != size {
            return Err(MemReaderError::RecordSize {
                context,
                expected: size,
                actual: data.len(),
            });
        }
        Ok(Self::new(context, data))
    }

    #[must_use]
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn ensure(&self, required: usize) -> Result<()> {
        if self.remaining() < required {
            return Err(MemReaderError::NotEnoughData {
                context: self.context,
                offset: self.offset,
                required,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn seek_to(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(MemReaderError::NotEnoughData {
                context: self.context,
                offset: self.offset,
                required: offset - self.offset,
                available: self.remaining(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    impl_read_int!(read_u8, get_u8, u8);
    impl_read_int!(read_u16_le, get_u16_le, u16);
    impl_read_int!(read_i16_le, get_i16_le, i16);
    impl_read_int!(read_u32_le, get_u32_le, u32);

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_slice(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    #[must_use]
    pub(crate) fn read_remaining(&mut self) -> &'a [u8] {
        let slice = &self.data[self.offset..];
        self.offset = self.data.len();
        slice
    }
}

/// Splits a payload into consecutive fixed-size records, returning the records
/// and any trailing bytes that do not make up a whole record.
#[must_use]
pub(crate) fn split_records(data: &[u8], record_size: usize) -> (Vec<&[u8]>, &[u8]) {
    let chunks = data.chunks_exact(record_size);
    let rest = chunks.remainder();
    (chunks.collect(), rest)
}
