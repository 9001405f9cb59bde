//! Allocation of scratch buffers for random access stream decoding.

use std::io::{self, Cursor, Read, Seek, Write};

/// A factory for the scratch buffers used while decoding streams.
///
/// Decoders need a read/write/seek buffer to hold intermediate results;
/// where that buffer lives (heap, temp file, pooled pages) is the
/// provider's business. Each call yields a fresh, empty, independent
/// buffer positioned at its start.
pub trait StreamCacheProvider {
    /// The buffer type this provider allocates.
    type Buffer: Read + Write + Seek;

    /// Allocate a fresh buffer.
    fn create_buffer(&self) -> io::Result<Self::Buffer>;
}

/// The default provider: plain in-memory buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStreamCache;

impl StreamCacheProvider for MemoryStreamCache {
    type Buffer = Cursor<Vec<u8>>;

    fn create_buffer(&self) -> io::Result<Self::Buffer> {
        Ok(Cursor::new(Vec::new()))
    }
}
