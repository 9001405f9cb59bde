//! A cursor over raw font table data.

use crate::tag::Tag;

/// A big-endian reader over a font table.
///
/// All reads return `None` once they would run past the end of the data,
/// leaving the offset where it was.
#[derive(Debug, Clone, Copy)]
pub struct TableStream<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> TableStream<'a> {
    /// A stream positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Jump to an absolute offset.
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// The current offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// The total size of the underlying data.
    pub fn original_size(&self) -> usize {
        self.data.len()
    }

    fn read_bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.offset..self.offset + N)?;
        self.offset += N;

        Some(bytes.try_into().unwrap())
    }

    /// Read a big-endian `u16`.
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_bytes().map(u16::from_be_bytes)
    }

    /// Read a big-endian `i16`.
    pub fn read_i16(&mut self) -> Option<i16> {
        self.read_bytes().map(i16::from_be_bytes)
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_bytes().map(u32::from_be_bytes)
    }

    /// Read a four-byte tag.
    pub fn read_tag(&mut self) -> Option<Tag> {
        self.read_bytes().map(Tag)
    }

    /// Read `count` big-endian `u16` values.
    pub fn read_u16_array(&mut self, count: usize) -> Option<Vec<u16>> {
        let mut values = Vec::with_capacity(count);

        for _ in 0..count {
            values.push(self.read_u16()?);
        }

        Some(values)
    }
}
