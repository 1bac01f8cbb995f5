//! Buffered typed-event logging for strom components.
//!
//! A [`Logger`] is a cheaply clonable handle that components use to record typed
//! events. Events are buffered with their elapsed time since the logger was created,
//! and handed to a flush action in batches: when the buffer fills, on an explicit
//! [`Logger::flush`], and once more when the last handle drops.
#![forbid(missing_docs)]

use std::rc::Rc;
use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Number of buffered events before an automatic flush.
const BUFFER_CAPACITY: usize = 1024;

/// A shared handle to a buffer of timestamped events.
pub struct Logger<E> {
    inner: Rc<RefCell<Buffer<E>>>,
}

impl<E> Clone for Logger<E> {
    fn clone(&self) -> Self {
        Logger { inner: Rc::clone(&self.inner) }
    }
}

struct Buffer<E> {
    time: Instant,
    buffer: Vec<(Duration, E)>,
    action: Box<dyn FnMut(&mut Vec<(Duration, E)>)>,
}

impl<E> Logger<E> {

    /// Allocates a new logger which flushes batches of events through `action`.
    ///
    /// The action receives the batch as a mutable vector and may drain or swap it;
    /// whatever remains is discarded.
    pub fn new<F>(action: F) -> Self
    where
        F: FnMut(&mut Vec<(Duration, E)>)+'static,
    {
        Logger {
            inner: Rc::new(RefCell::new(Buffer {
                time: Instant::now(),
                buffer: Vec::with_capacity(BUFFER_CAPACITY),
                action: Box::new(action),
            })),
        }
    }

    /// Adds one event to the buffer, stamped with the elapsed time.
    pub fn log<T: Into<E>>(&self, event: T) {
        let mut inner = self.inner.borrow_mut();
        let elapsed = inner.time.elapsed();
        inner.buffer.push((elapsed, event.into()));
        if inner.buffer.len() >= BUFFER_CAPACITY {
            inner.flush();
        }
    }

    /// Adds many events to the buffer with a single elapsed-time reading.
    pub fn log_many<I>(&self, events: I)
    where
        I: IntoIterator,
        I::Item: Into<E>,
    {
        let mut inner = self.inner.borrow_mut();
        let elapsed = inner.time.elapsed();
        for event in events {
            inner.buffer.push((elapsed, event.into()));
        }
        if inner.buffer.len() >= BUFFER_CAPACITY {
            inner.flush();
        }
    }

    /// Flushes buffered events through the action.
    pub fn flush(&self) {
        self.inner.borrow_mut().flush();
    }
}

impl<E> Buffer<E> {
    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            (self.action)(&mut self.buffer);
            self.buffer.clear();
        }
    }
}

impl<E> Drop for Buffer<E> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {

    use std::rc::Rc;
    use std::cell::RefCell;
    use super::Logger;

    #[test]
    fn events_reach_the_action_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        {
            let logger = Logger::<usize>::new(move |batch| {
                sink.borrow_mut().extend(batch.drain(..).map(|(_, e)| e));
            });
            logger.log(1usize);
            logger.log_many([2usize, 3]);
        }
        // dropping the last handle flushes the remainder.
        assert_eq!(&*seen.borrow(), &[1, 2, 3]);
    }

    #[test]
    fn clones_share_one_buffer() {
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        {
            let logger = Logger::<usize>::new(move |batch| {
                *sink.borrow_mut() += batch.len();
            });
            let other = logger.clone();
            logger.log(0usize);
            other.log(1usize);
        }
        assert_eq!(*seen.borrow(), 2);
    }
}
