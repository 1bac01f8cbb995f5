//! Length-prefixed record framing over the continuous streams.
//!
//! Each record is serialized with `bincode` and framed as a big-endian `u32` length
//! followed by the payload, written with a single stream write so a frame never
//! straddles a view boundary. The reader is the layer that interprets boundary
//! markers: `BLOCK_END` skips the abandoned tail of a view, `ITERATION_END` ends the
//! record sequence. Because frame lengths are bounded by
//! [`MAX_RECORD_LEN`](crate::markers::MAX_RECORD_LEN), a frame position can never be
//! misread as a marker.

use byteorder::{ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::ShuffleError;
use crate::markers::{BLOCK_END, ITERATION_END, MARKER_LEN, MAX_RECORD_LEN};
use crate::stream::{ContinuousInputStream, ContinuousOutputStream};
use crate::{ViewProvider, ViewSink};

/// The byte order of the frame length prefix.
type ByteOrder = byteorder::BigEndian;

/// Writes typed records into an output stream as length-prefixed frames.
pub struct RecordWriter<P: ViewProvider, S: ViewSink> {
    stream: ContinuousOutputStream<P, S>,
    frame: Vec<u8>,
}

impl<P: ViewProvider, S: ViewSink> RecordWriter<P, S> {

    /// Wraps an output stream.
    pub fn new(stream: ContinuousOutputStream<P, S>) -> Self {
        RecordWriter {
            stream,
            frame: Vec::new(),
        }
    }

    /// Serializes `record` and writes its frame in one stream write.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), ShuffleError> {
        let length = bincode::serialized_size(record)? as usize;
        if length > MAX_RECORD_LEN {
            return Err(ShuffleError::RecordTooLarge { length, capacity: MAX_RECORD_LEN });
        }
        self.frame.clear();
        self.frame.write_u32::<ByteOrder>(length as u32)?;
        bincode::serialize_into(&mut self.frame, record)?;
        self.stream.write(&self.frame)
    }

    /// Flushes the underlying stream.
    pub fn flush(&self) -> Result<(), ShuffleError> {
        self.stream.flush()
    }

    /// Terminates the record sequence with `ITERATION_END` and flushes.
    pub fn close(&self) -> Result<(), ShuffleError> {
        self.stream.close()
    }

    /// The underlying stream.
    pub fn stream(&self) -> &ContinuousOutputStream<P, S> {
        &self.stream
    }
}

/// Reads typed records from an input stream, interpreting boundary markers.
pub struct RecordReader<P: ViewProvider, S: ViewSink> {
    stream: ContinuousInputStream<P, S>,
    payload: Vec<u8>,
    finished: bool,
}

impl<P: ViewProvider, S: ViewSink> RecordReader<P, S> {

    /// Wraps an input stream.
    pub fn new(stream: ContinuousInputStream<P, S>) -> Self {
        RecordReader {
            stream,
            payload: Vec::new(),
            finished: false,
        }
    }

    /// Reads the next record.
    ///
    /// `Ok(None)` after `ITERATION_END` was read, or once the provider is exhausted;
    /// marker bytes themselves are never surfaced. A provider that terminates in the
    /// middle of a frame is a [`ShuffleError::Terminated`] — the peer flushed a
    /// partial record, which framing forbids.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ShuffleError> {
        if self.finished {
            return Ok(None);
        }
        let mut prefix = [0u8; MARKER_LEN];
        loop {
            if self.stream.read(&mut prefix).is_none() {
                // Exhausted at a frame boundary: the peer shut down without closing.
                self.finished = true;
                return Ok(None);
            }
            if prefix == BLOCK_END {
                // The rest of this view was abandoned by the writer.
                let tail = self.stream.available();
                self.stream.skip(tail);
                continue;
            }
            if prefix == ITERATION_END {
                self.finished = true;
                return Ok(None);
            }
            let length = (&prefix[..]).read_u32::<ByteOrder>()? as usize;
            self.payload.resize(length, 0);
            if self.stream.read(&mut self.payload[..]).is_none() {
                return Err(ShuffleError::Terminated);
            }
            return Ok(Some(bincode::deserialize(&self.payload[..])?));
        }
    }

    /// Whether `ITERATION_END` has been read.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Releases the held view and closes the underlying stream.
    pub fn close(&self) {
        self.stream.close();
    }

    /// The underlying stream.
    pub fn stream(&self) -> &ContinuousInputStream<P, S> {
        &self.stream
    }
}
