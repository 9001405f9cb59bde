//! The boundary between the object model and the parser that feeds it.

use crate::Error;
use crate::object::{Object, ObjectKey};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// A supplier of object values and raw byte ranges.
///
/// Implemented by the document parser. Reference types hold a handle to a
/// resolver so they can materialize their value lazily, and stream objects
/// use it to expose their encoded bytes as a bounded [`ReadView`].
pub trait Resolver: Send + Sync {
    /// Produce the value for `key`.
    ///
    /// Returns [`Error::MissingObject`] if the object store has no entry for
    /// the key.
    fn dereference(&self, key: ObjectKey) -> Result<Object, Error>;

    /// Open a bounded view over `length` bytes of the document starting at
    /// `start`.
    fn create_view(&self, start: u64, length: u64) -> io::Result<ReadView>;
}

/// Random access to the raw bytes of a document.
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`, returning how many
    /// were read. Zero means end of data.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };

        if offset >= self.len() {
            return Ok(0);
        }

        let available = &self[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);

        Ok(n)
    }
}

/// A bounded, seekable window into a byte source.
///
/// Reads never cross the end of the window; seeking past the end is
/// allowed, as with a file, and reads from there return nothing.
/// Positions are relative to the start of the window, so a fresh view reads
/// from the beginning of its range. Each view tracks its own position;
/// multiple views over one source do not disturb each other.
pub struct ReadView {
    source: Arc<dyn ByteSource>,
    start: u64,
    length: u64,
    position: u64,
}

impl ReadView {
    /// A view over `length` bytes of `source` starting at `start`.
    pub fn new(source: Arc<dyn ByteSource>, start: u64, length: u64) -> Self {
        Self {
            source,
            start,
            length,
            position: 0,
        }
    }

    /// The length of the window.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl Read for ReadView {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length.saturating_sub(self.position);

        if remaining == 0 {
            return Ok(0);
        }

        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self
            .source
            .read_at(self.start + self.position, &mut buf[..want])?;
        self.position += n as u64;

        Ok(n)
    }
}

impl Seek for ReadView {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the view",
            ));
        };

        self.position = target;

        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::{ByteSource, ReadView};
    use std::io::{Read, Seek, SeekFrom};
    use std::sync::Arc;

    fn source() -> Arc<dyn ByteSource> {
        Arc::new((0u8..32).collect::<Vec<u8>>())
    }

    #[test]
    fn view_reads_only_its_window() {
        let mut view = ReadView::new(source(), 4, 6);
        let mut buf = Vec::new();
        view.read_to_end(&mut buf).unwrap();

        assert_eq!(buf, vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn reads_truncate_at_the_window_end() {
        let mut view = ReadView::new(source(), 30, 8);
        let mut buf = [0; 8];
        let n = view.read(&mut buf).unwrap();

        assert_eq!(n, 2);
        assert_eq!(&buf[..n], &[30, 31]);
        assert_eq!(view.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn seeking_is_relative_to_the_window() {
        let mut view = ReadView::new(source(), 10, 10);
        view.seek(SeekFrom::Start(3)).unwrap();

        let mut buf = [0; 2];
        view.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [13, 14]);

        view.seek(SeekFrom::End(-1)).unwrap();
        let mut last = [0; 1];
        view.read_exact(&mut last).unwrap();
        assert_eq!(last, [19]);

        view.seek(SeekFrom::Current(-2)).unwrap();
        assert_eq!(view.stream_position().unwrap(), 8);
    }

    #[test]
    fn seeking_before_the_start_fails() {
        let mut view = ReadView::new(source(), 10, 10);

        assert!(view.seek(SeekFrom::Current(-1)).is_err());
        assert!(view.seek(SeekFrom::End(-11)).is_err());
        // A failed seek leaves the position untouched.
        assert_eq!(view.stream_position().unwrap(), 0);
    }

    #[test]
    fn seeking_past_the_end_reads_nothing() {
        let mut view = ReadView::new(source(), 10, 10);

        assert_eq!(view.seek(SeekFrom::Start(15)).unwrap(), 15);
        let mut buf = [0; 4];
        assert_eq!(view.read(&mut buf).unwrap(), 0);

        // Seeking back into the window recovers.
        view.seek(SeekFrom::Start(9)).unwrap();
        assert_eq!(view.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 19);
    }

    #[test]
    fn views_over_one_source_are_independent() {
        let source = source();
        let mut a = ReadView::new(source.clone(), 0, 4);
        let mut b = ReadView::new(source, 4, 4);

        let mut buf = [0; 2];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 1]);
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [4, 5]);
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }
}
