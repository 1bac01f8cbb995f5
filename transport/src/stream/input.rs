//! The consuming side: exposes views arriving from a channel as one byte sequence.

use std::sync::Mutex;

use strom_bytes::view::View;

use crate::errors::ShuffleError;
use crate::{ViewProvider, ViewSink};

/// The dual reader: a continuous byte sequence that crosses view boundaries
/// transparently.
///
/// Each rotation first hands the exhausted view to the sink, so the pool behind it
/// can reclaim the memory, and then pulls the next view from the provider. The
/// stream never interprets marker bytes; that is the record layer's responsibility.
/// All operations lock internally so a supervising thread may
/// [`close`](ContinuousInputStream::close) concurrently.
pub struct ContinuousInputStream<P: ViewProvider, S: ViewSink> {
    inner: Mutex<Inner<P, S>>,
}

struct Inner<P, S> {
    provider: P,
    sink: S,
    view: Option<View>,
    pos: usize,
    end: usize,
    mark: usize,
}

impl<P: ViewProvider, S: ViewSink> ContinuousInputStream<P, S> {

    /// Creates a stream pulling views from `provider` and releasing them to `sink`.
    pub fn new(provider: P, sink: S) -> Self {
        ContinuousInputStream {
            inner: Mutex::new(Inner {
                provider,
                sink,
                view: None,
                pos: 0,
                end: 0,
                mark: 0,
            }),
        }
    }

    /// Reads one byte, rotating to the next view when the current one is drained.
    ///
    /// `None` means the provider yielded no further view: the stream is exhausted.
    pub fn read_byte(&self) -> Option<u8> {
        let mut inner = self.lock();
        if inner.remaining() == 0 && !inner.advance() {
            return None;
        }
        let byte = inner.view.as_ref().expect("view present")[inner.pos];
        inner.pos += 1;
        Some(byte)
    }

    /// Fills `buf`, rotating across as many views as necessary.
    ///
    /// Returns the number of bytes read, which is `buf.len()` unless the provider
    /// terminates mid-copy, in which case the result is `None` — end of stream is
    /// never conflated with a short read. An empty `buf` reads zero bytes without
    /// touching the pool.
    pub fn read(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.is_empty() {
            return Some(0);
        }
        let mut inner = self.lock();
        let mut copied = 0;
        while copied < buf.len() {
            if inner.remaining() == 0 && !inner.advance() {
                return None;
            }
            let step = inner.remaining().min(buf.len() - copied);
            let pos = inner.pos;
            buf[copied .. copied + step]
                .copy_from_slice(&inner.view.as_ref().expect("view present")[pos .. pos + step]);
            inner.pos += step;
            copied += step;
        }
        Some(copied)
    }

    /// Validates `offset` and `length` against `buf` and reads into that range.
    pub fn read_slice(&self, buf: &mut [u8], offset: usize, length: usize) -> Result<Option<usize>, ShuffleError> {
        if offset.checked_add(length).map(|end| end > buf.len()).unwrap_or(true) {
            return Err(ShuffleError::Range { offset, length, bound: buf.len() });
        }
        Ok(self.read(&mut buf[offset .. offset + length]))
    }

    /// Skips up to `n` bytes with the same rotation discipline as `read`,
    /// returning the number of bytes actually skipped.
    pub fn skip(&self, n: usize) -> usize {
        let mut inner = self.lock();
        let mut skipped = 0;
        while skipped < n {
            if inner.remaining() == 0 && !inner.advance() {
                break;
            }
            let step = inner.remaining().min(n - skipped);
            inner.pos += step;
            skipped += step;
        }
        skipped
    }

    /// Bytes remaining in the current view only; not a global lookahead.
    pub fn available(&self) -> usize {
        self.lock().remaining()
    }

    /// Records the cursor's position within the currently held view.
    ///
    /// Only the position is remembered: a previously read view may already have
    /// been returned to the pool, so re-reading from the mark is out of scope for
    /// the streaming path.
    pub fn mark(&self) {
        let mut inner = self.lock();
        inner.mark = inner.pos;
    }

    /// Whether `mark` is supported. Always true.
    pub fn mark_supported(&self) -> bool {
        true
    }

    /// Releases the held view back through the sink and resets local state.
    pub fn flush(&self) {
        let mut inner = self.lock();
        if let Some(view) = inner.view.take() {
            inner.sink.put(view);
        }
        inner.pos = 0;
        inner.end = 0;
        inner.mark = 0;
    }

    /// Releases the held view and resets local state; delegates to `flush`.
    pub fn close(&self) {
        self.flush();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<P, S>> {
        self.inner.lock().expect("unable to lock stream")
    }
}

/// A stream abandoned mid-view still returns that view through the sink, so the
/// pool behind it is not diminished.
impl<P: ViewProvider, S: ViewSink> Drop for ContinuousInputStream<P, S> {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if let Some(view) = inner.view.take() {
                inner.sink.put(view);
            }
        }
    }
}

impl<P: ViewProvider, S: ViewSink> Inner<P, S> {

    fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// The rotation primitive: hands the current view to the sink, requests the next
    /// from the provider, and resets the cursor to the new view's bounds. `false`
    /// when the provider yields nothing — the stream is exhausted.
    fn advance(&mut self) -> bool {
        if let Some(view) = self.view.take() {
            self.sink.put(view);
        }
        match self.provider.get() {
            Some(view) => {
                self.pos = view.base_offset();
                self.end = view.capacity();
                self.view = Some(view);
                true
            }
            None => {
                self.pos = 0;
                self.end = 0;
                false
            }
        }
    }
}
