//! The producing side: serializes a byte sequence into successive pooled views.

use std::sync::Mutex;

use strom_bytes::view::View;

use crate::errors::ShuffleError;
use crate::markers::{BLOCK_END, ITERATION_END, MARKER_LEN};
use crate::{ViewProvider, ViewSink};

/// Serializes a sequence of writes into successive views, inserting boundary markers.
///
/// Views are acquired from the provider on demand (the blocking backpressure point)
/// and handed to the sink when they fill, when a marker forces rotation, or on
/// [`flush`](ContinuousOutputStream::flush). Steady-state access is single-writer,
/// but all operations lock internally so a supervising thread may
/// [`close`](ContinuousOutputStream::close) concurrently without corrupting the
/// cursor.
pub struct ContinuousOutputStream<P: ViewProvider, S: ViewSink> {
    inner: Mutex<Inner<P, S>>,
}

struct Inner<P, S> {
    provider: P,
    sink: S,
    view: Option<View>,
    cursor: usize,
    closed: bool,
}

impl<P: ViewProvider, S: ViewSink> ContinuousOutputStream<P, S> {

    /// Creates a stream drawing views from `provider` and flushing them to `sink`.
    pub fn new(provider: P, sink: S) -> Self {
        ContinuousOutputStream {
            inner: Mutex::new(Inner {
                provider,
                sink,
                view: None,
                cursor: 0,
                closed: false,
            }),
        }
    }

    /// Writes a single byte, flushing the view when it fills exactly.
    ///
    /// The byte path reserves no marker trailer: an exactly-full view is flushed
    /// as-is, with no abandoned tail for a marker to flag, and the next write
    /// acquires a fresh view. A byte-path view left with fewer than `MARKER_LEN`
    /// free bytes is rotated out by the next slice write or by
    /// [`close`](ContinuousOutputStream::close), with its unwritten tail zeroed.
    pub fn write_byte(&self, byte: u8) -> Result<(), ShuffleError> {
        let mut inner = self.lock()?;
        inner.ensure_view()?;
        let cursor = inner.cursor;
        inner.view.as_mut().expect("view present")[cursor] = byte;
        inner.cursor += 1;
        if inner.cursor == inner.view.as_ref().expect("view present").capacity() {
            inner.flush();
        }
        Ok(())
    }

    /// Writes `bytes` without ever splitting them across views.
    ///
    /// When the payload plus the reserved marker trailer does not fit the current
    /// view, `BLOCK_END` is written at the cursor and the view is flushed before a
    /// fresh one is acquired and the payload copied. A payload that cannot fit even
    /// an empty view is a [`ShuffleError::RecordTooLarge`]; the caller must chunk
    /// records well below one view's usable size.
    pub fn write(&self, bytes: &[u8]) -> Result<(), ShuffleError> {
        let mut inner = self.lock()?;
        inner.ensure_view()?;

        // The byte path can park the cursor inside the trailer, where no marker
        // fits; that view rotates out first, its unwritten tail zeroed.
        if inner.view.as_ref().expect("view present").capacity() - inner.cursor < MARKER_LEN {
            inner.zero_tail();
            inner.rotate()?;
        }

        let view = inner.view.as_ref().expect("view present");
        let usable = view.capacity() - MARKER_LEN - view.base_offset();
        if bytes.len() > usable {
            return Err(ShuffleError::RecordTooLarge { length: bytes.len(), capacity: usable });
        }

        let avail = (view.capacity() - MARKER_LEN) - inner.cursor;
        if bytes.len() > avail {
            let cursor = inner.cursor;
            inner.view.as_mut().expect("view present")[cursor .. cursor + MARKER_LEN]
                .copy_from_slice(&BLOCK_END);
            inner.cursor += MARKER_LEN;
            inner.rotate()?;
        }

        let cursor = inner.cursor;
        inner.view.as_mut().expect("view present")[cursor .. cursor + bytes.len()]
            .copy_from_slice(bytes);
        inner.cursor += bytes.len();
        Ok(())
    }

    /// Validates `offset` and `length` against `bytes` and writes that range.
    pub fn write_slice(&self, bytes: &[u8], offset: usize, length: usize) -> Result<(), ShuffleError> {
        if offset.checked_add(length).map(|end| end > bytes.len()).unwrap_or(true) {
            return Err(ShuffleError::Range { offset, length, bound: bytes.len() });
        }
        self.write(&bytes[offset .. offset + length])
    }

    /// Hands the held view to the sink, if any; a no-op otherwise.
    pub fn flush(&self) -> Result<(), ShuffleError> {
        let mut inner = self.lock()?;
        inner.flush();
        Ok(())
    }

    /// Terminates the logical stream with exactly one `ITERATION_END`.
    ///
    /// A stream that never wrote anything still acquires one view so the terminal
    /// marker reaches the consumer. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), ShuffleError> {
        let mut inner = self.inner.lock().expect("unable to lock stream");
        if inner.closed {
            return Ok(());
        }
        inner.ensure_view()?;
        // The slice path always leaves a marker's worth of trailer; only the byte
        // path can leave less, in which case the partial view rotates out first.
        if inner.view.as_ref().expect("view present").capacity() - inner.cursor < MARKER_LEN {
            inner.zero_tail();
            inner.rotate()?;
        }
        let cursor = inner.cursor;
        inner.view.as_mut().expect("view present")[cursor .. cursor + MARKER_LEN]
            .copy_from_slice(&ITERATION_END);
        inner.cursor += MARKER_LEN;
        inner.flush();
        inner.closed = true;
        Ok(())
    }

    /// Bytes written into the currently held view.
    pub fn size(&self) -> usize {
        let inner = self.inner.lock().expect("unable to lock stream");
        match &inner.view {
            Some(view) => inner.cursor - view.base_offset(),
            None => 0,
        }
    }

    /// Rewinds the cursor to the start of the currently held view.
    ///
    /// Present only for small in-memory use; the streaming path never rewinds.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("unable to lock stream");
        if let Some(view) = &inner.view {
            inner.cursor = view.base_offset();
        }
    }

    /// Copies out the bytes written into the currently held view.
    ///
    /// Present only for small in-memory use; views already flushed are gone.
    pub fn to_byte_array(&self) -> Vec<u8> {
        let inner = self.inner.lock().expect("unable to lock stream");
        match &inner.view {
            Some(view) => view[view.base_offset() .. inner.cursor].to_vec(),
            None => Vec::new(),
        }
    }

    /// Always fails: the stream is a one-directional pipe, not a buffer snapshot.
    pub fn write_to<W: std::io::Write>(&self, _writer: &mut W) -> Result<(), ShuffleError> {
        Err(ShuffleError::Unsupported("write_to"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner<P, S>>, ShuffleError> {
        let inner = self.inner.lock().expect("unable to lock stream");
        if inner.closed {
            return Err(ShuffleError::Closed);
        }
        Ok(inner)
    }
}

impl<P: ViewProvider, S: ViewSink> Inner<P, S> {

    /// Acquires a view if none is held.
    fn ensure_view(&mut self) -> Result<(), ShuffleError> {
        if self.view.is_none() {
            let view = self.provider.get().ok_or(ShuffleError::Terminated)?;
            self.cursor = view.base_offset();
            self.view = Some(view);
        }
        Ok(())
    }

    /// Hands the held view to the sink and acquires a fresh one.
    fn rotate(&mut self) -> Result<(), ShuffleError> {
        if let Some(view) = self.view.take() {
            self.sink.put(view);
        }
        let view = self.provider.get().ok_or(ShuffleError::Terminated)?;
        self.cursor = view.base_offset();
        self.view = Some(view);
        Ok(())
    }

    /// Hands the held view to the sink; idempotent.
    fn flush(&mut self) {
        if let Some(view) = self.view.take() {
            self.sink.put(view);
            self.cursor = 0;
        }
    }

    /// Zeroes the unwritten bytes between the cursor and the end of the view.
    fn zero_tail(&mut self) {
        let cursor = self.cursor;
        if let Some(view) = self.view.as_mut() {
            view[cursor ..].fill(0);
        }
    }
}

/// A data-bearing view abandoned without `close` still reaches the sink, so the
/// pool behind it is not diminished; a held view with nothing written is dropped.
impl<P: ViewProvider, S: ViewSink> Drop for ContinuousOutputStream<P, S> {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if let Some(view) = inner.view.take() {
                if inner.cursor > view.base_offset() {
                    inner.sink.put(view);
                }
            }
        }
    }
}
