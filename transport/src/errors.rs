//! Failures surfaced by the shuffle layer.
//!
//! Pool exhaustion is deliberately absent: an empty pool blocks the caller and
//! surfaces only as latency. Likewise a provider that yields no further view is the
//! expected end-of-stream condition on the consuming side, reported as `None` by the
//! read path rather than as an error.

use thiserror::Error;

use crate::producer::ProducerState;

/// An error from the streams, record layer, or data producer.
///
/// The stream and record types do no local recovery; every failure propagates to the
/// serializer or deserializer above them, which decides whether a corrupt record is
/// fatal to the task. The producer surfaces binding and state errors synchronously so
/// misconfiguration is caught at deployment time, not mid-stream.
#[derive(Error, Debug)]
pub enum ShuffleError {
    /// Offset and length arguments do not describe a range within the supplied bytes.
    #[error("range error: offset {offset} plus length {length} exceeds bound {bound}")]
    Range {
        /// Supplied offset.
        offset: usize,
        /// Supplied length.
        length: usize,
        /// Exclusive upper bound the range must fit within.
        bound: usize,
    },

    /// The operation is not part of the streaming contract, by design.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A single record cannot fit the usable space of an empty view.
    ///
    /// Payloads are never split across views; callers must keep record sizes bounded
    /// well under one view's capacity.
    #[error("record of {length} bytes exceeds the usable view capacity of {capacity} bytes")]
    RecordTooLarge {
        /// Serialized length of the record.
        length: usize,
        /// Usable bytes of an empty view, less the reserved marker trailer.
        capacity: usize,
    },

    /// The stream was already closed.
    #[error("stream is closed")]
    Closed,

    /// The view provider terminated while more data was required.
    #[error("view provider terminated")]
    Terminated,

    /// A gate operation was invoked in a producer state that does not permit it.
    #[error("cannot {operation} while the producer is {state:?}")]
    IllegalState {
        /// The operation attempted.
        operation: &'static str,
        /// The producer's state at the time.
        state: ProducerState,
    },

    /// The supplied gate or channel index does not exist in the bound topology.
    #[error("no channel {channel} on gate {gate}")]
    UnknownChannel {
        /// Gate index.
        gate: usize,
        /// Channel index within the gate.
        channel: usize,
    },

    /// The output binding does not match the topology the producer was built for.
    #[error("invalid output binding: {0}")]
    Binding(String),

    /// Record serialization or deserialization failed.
    #[error("record serialization failed: {0}")]
    Serialize(#[from] bincode::Error),

    /// An underlying byte-level write failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
