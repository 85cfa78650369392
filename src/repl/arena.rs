//! Region allocator for recovered record buffers.
//!
//! Records are carved out of large `BytesMut` chunks. Each handed-out `Bytes`
//! keeps its chunk alive through reference counting, so records stay valid
//! after they leave the recovery machine for the commit step; the arena itself
//! only ever holds on to the chunk it is currently filling.

use bytes::{Bytes, BytesMut};

/// Default chunk size (1MB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Arena owned by one recovery machine.
#[derive(Debug)]
pub struct RecordArena {
    chunk: BytesMut,
    chunk_size: usize,
    chunks_allocated: u64,
    bytes_allocated: u64,
}

impl RecordArena {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk: BytesMut::new(),
            chunk_size: chunk_size.max(1),
            chunks_allocated: 0,
            bytes_allocated: 0,
        }
    }

    /// Build a buffer of `len` bytes with `fill` and freeze it.
    ///
    /// `fill` receives an empty buffer with at least `len` bytes of capacity.
    pub fn build(&mut self, len: usize, fill: impl FnOnce(&mut BytesMut)) -> Bytes {
        if len == 0 {
            return Bytes::new();
        }
        if self.chunk.capacity() < len {
            self.chunk = BytesMut::with_capacity(self.chunk_size.max(len));
            self.chunks_allocated += 1;
        }

        fill(&mut self.chunk);
        debug_assert_eq!(self.chunk.len(), len, "arena buffer filled to the wrong length");
        self.bytes_allocated += self.chunk.len() as u64;
        self.chunk.split().freeze()
    }

    /// Forget the current chunk; outstanding buffers remain valid.
    pub fn reset(&mut self) {
        self.chunk = BytesMut::new();
    }

    pub fn chunks_allocated(&self) -> u64 {
        self.chunks_allocated
    }

    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated
    }
}

impl Default for RecordArena {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}
