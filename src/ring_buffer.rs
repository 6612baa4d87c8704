// ABOUTME: Fixed-capacity circular byte queue used for per-stream tx/rx staging
// ABOUTME: Mirrors the head/tail/size bookkeeping of a classic ring buffer, with async transport drain/fill helpers

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{MuxError, Result};

/// A fixed-capacity circular byte queue.
///
/// `head` is the next position to read from, `tail` the next position to
/// write to; `size` tracks how many bytes are currently held so that
/// `head == tail` is unambiguous between empty and full.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Box<[u8]>,
    head: usize,
    tail: usize,
    size: usize,
}

impl RingBuffer {
    /// Create an empty ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size == self.data.len()
    }

    pub fn free_space(&self) -> usize {
        self.data.len() - self.size
    }

    /// Copy up to `src.len()` bytes from `src` into the buffer's free space.
    /// Returns the number of bytes actually copied; callers must treat a
    /// short return as backpressure rather than an error.
    pub fn append(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.free_space());
        for &byte in &src[..n] {
            self.data[self.tail] = byte;
            self.tail = (self.tail + 1) % self.data.len();
        }
        self.size += n;
        n
    }

    /// Copy exactly `dst.len()` bytes out of the buffer, advancing `head`.
    /// Errors if fewer than `dst.len()` bytes are held.
    pub fn pop(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.size {
            return Err(MuxError::Internal(format!(
                "ring buffer pop of {} exceeds held size {}",
                dst.len(),
                self.size
            )));
        }
        for slot in dst.iter_mut() {
            *slot = self.data[self.head];
            self.head = (self.head + 1) % self.data.len();
        }
        self.size -= dst.len();
        Ok(())
    }

    /// Write up to `min(n, size)` buffered bytes out to `sink`, advancing `head`.
    /// Returns the number of bytes written.
    pub async fn drain_to_transport<W: AsyncWrite + Unpin>(
        &mut self,
        sink: &mut W,
        n: usize,
    ) -> Result<usize> {
        let n = n.min(self.size);
        if n == 0 {
            return Ok(0);
        }

        let mut staged = vec![0u8; n];
        for slot in staged.iter_mut() {
            *slot = self.data[self.head];
            self.head = (self.head + 1) % self.data.len();
        }
        self.size -= n;

        sink.write_all(&staged).await?;
        Ok(n)
    }

    /// Read up to `min(n, free_space())` bytes from `source` into the buffer, advancing `tail`.
    /// Returns the number of bytes ingested.
    pub async fn fill_from_transport<R: AsyncRead + Unpin>(
        &mut self,
        source: &mut R,
        n: usize,
    ) -> Result<usize> {
        let n = n.min(self.free_space());
        if n == 0 {
            return Ok(0);
        }

        let mut staged = vec![0u8; n];
        let read = source.read(&mut staged).await?;
        for &byte in &staged[..read] {
            self.data[self.tail] = byte;
            self.tail = (self.tail + 1) % self.data.len();
        }
        self.size += read;
        Ok(read)
    }
}
