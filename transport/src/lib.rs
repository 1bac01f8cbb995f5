//! The shuffle data plane: serializing record sequences into pooled views and
//! demultiplexing them across downstream channels.
//!
//! A producing task writes records into a [`stream::ContinuousOutputStream`], which
//! serializes bytes into the current [`View`](strom_bytes::view::View) and, whenever a
//! view fills, hands it through a [`ViewSink`] to a downstream channel, pulling a
//! fresh view from the [`pool::ViewPool`] at the next write. Acquisition blocks while the pool is
//! empty, which is how downstream slowness propagates all the way back into the
//! record-producing computation. On the receiving task a
//! [`stream::ContinuousInputStream`] pulls filled views from its channel-fed queue and
//! exposes one continuous byte sequence to the deserializer.
//!
//! # Examples
//! ```
//! use strom_transport::pool::ViewPool;
//! use strom_transport::stream::{ContinuousOutputStream, ContinuousInputStream};
//! use strom_transport::record::{RecordWriter, RecordReader};
//!
//! let pool = ViewPool::new(4, 128);
//! let (send, recv) = crossbeam_channel::unbounded();
//!
//! // Serialize a record sequence into pooled views.
//! let output = ContinuousOutputStream::new(pool.clone(), send);
//! let mut writer = RecordWriter::new(output);
//! writer.write(&String::from("hello")).unwrap();
//! writer.write(&String::from("world")).unwrap();
//! writer.close().unwrap();
//!
//! // Reconstruct it byte-exact on the other side; drained views return to the pool.
//! let input = ContinuousInputStream::new(recv, pool.clone());
//! let mut reader = RecordReader::new(input);
//! assert_eq!(reader.read::<String>().unwrap(), Some(String::from("hello")));
//! assert_eq!(reader.read::<String>().unwrap(), Some(String::from("world")));
//! assert_eq!(reader.read::<String>().unwrap(), None);
//! ```

#![forbid(missing_docs)]

pub mod config;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod gate;
pub mod logging;
pub mod markers;
pub mod pool;
pub mod producer;
pub mod record;
pub mod stream;

pub use errors::ShuffleError;
pub use gate::TaskId;
pub use pool::ViewPool;
pub use producer::DataProducer;

use strom_bytes::view::View;

/// A source of views.
///
/// Providers are pure hand-off points: they carry no buffering logic of their own.
/// The producing side's provider is the task's view pool; the consuming side's is
/// the queue fed by its input channel.
pub trait ViewProvider {
    /// Yields the next view, blocking the caller while none is available.
    ///
    /// Blocking here is the system's backpressure mechanism, not an error. `None` is
    /// terminal: the pool was closed or the feeding channel disconnected, and no
    /// further view will ever be produced.
    fn get(&mut self) -> Option<View>;
}

/// A destination for views.
pub trait ViewSink {
    /// Hands `view` onward, transferring ownership; the caller retains nothing.
    fn put(&mut self, view: View);
}

impl<P: ?Sized + ViewProvider> ViewProvider for Box<P> {
    fn get(&mut self) -> Option<View> { (**self).get() }
}

impl<S: ?Sized + ViewSink> ViewSink for Box<S> {
    fn put(&mut self, view: View) { (**self).put(view) }
}
