//! Types and traits for moving views and events between threads.
//!
//! A [`ChannelQueue`] is the shared-mutable boundary between a producing task and
//! the transport thread that drains its channel: the producer enqueues, the
//! transport dequeues, and delivery order per channel is enqueue order. The
//! crossbeam endpoints at the bottom of the file feed a consuming task's input
//! stream and return drained views toward a pool.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{Receiver, Sender};

use strom_bytes::view::View;

use crate::events::TransportEvent;
use crate::{ViewProvider, ViewSink};

/// A FIFO queue of transport events for one channel.
///
/// Views enqueued here are delivered in enqueue order; a single logical stream's
/// bytes are split across consecutive views, and the receiver reconstructs the byte
/// sequence by concatenation in arrival order, so per-channel FIFO is load-bearing.
/// Data events are stamped with consecutive sequence numbers at enqueue.
#[derive(Clone)]
pub struct ChannelQueue {
    shared: Arc<(Mutex<State>, Condvar)>,
}

struct State {
    queue: VecDeque<TransportEvent>,
    next_seqno: usize,
    discarded: bool,
}

impl ChannelQueue {

    /// Allocates an empty queue.
    pub fn new() -> ChannelQueue {
        ChannelQueue {
            shared: Arc::new((
                Mutex::new(State {
                    queue: VecDeque::new(),
                    next_seqno: 0,
                    discarded: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Enqueues one event, stamping data events with the channel's next sequence
    /// number. Events pushed after `discard` are dropped.
    pub fn push(&self, mut event: TransportEvent) {
        let (lock, _) = &*self.shared;
        let mut state = lock.lock().expect("unable to lock channel queue");
        if state.discarded {
            return;
        }
        if let TransportEvent::Data(header, _) = &mut event {
            header.seqno = state.next_seqno;
            state.next_seqno += 1;
        }
        state.queue.push_back(event);
    }

    /// Drains every queued event into `staged`, waking exhaustion waiters.
    pub fn drain_into(&self, staged: &mut Vec<TransportEvent>) {
        let (lock, drained) = &*self.shared;
        let mut state = lock.lock().expect("unable to lock channel queue");
        staged.extend(state.queue.drain(..));
        drained.notify_all();
    }

    /// Dequeues the front event, waking exhaustion waiters when the queue empties.
    pub fn pop(&self) -> Option<TransportEvent> {
        let (lock, drained) = &*self.shared;
        let mut state = lock.lock().expect("unable to lock channel queue");
        let event = state.queue.pop_front();
        if state.queue.is_empty() {
            drained.notify_all();
        }
        event
    }

    /// Blocks until every enqueued event has been dequeued.
    pub fn await_drained(&self) {
        let (lock, drained) = &*self.shared;
        let mut state = lock.lock().expect("unable to lock channel queue");
        while !state.queue.is_empty() {
            state = drained.wait(state).expect("unable to wait on channel queue");
        }
    }

    /// Drops all in-flight events and refuses future pushes; the hard-cancel path.
    pub fn discard(&self) {
        let (lock, drained) = &*self.shared;
        let mut state = lock.lock().expect("unable to lock channel queue");
        state.queue.clear();
        state.discarded = true;
        drained.notify_all();
    }

    /// The number of queued events.
    pub fn len(&self) -> usize {
        let (lock, _) = &*self.shared;
        lock.lock().expect("unable to lock channel queue").queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChannelQueue {
    fn default() -> Self {
        ChannelQueue::new()
    }
}

/// The consuming side's feeding queue: blocks until the transport delivers the next
/// view, and reports exhaustion once every sending handle has dropped.
impl ViewProvider for Receiver<View> {
    fn get(&mut self) -> Option<View> {
        self.recv().ok()
    }
}

/// Forwards views onward; tolerates a receiver that has already shut down, as views
/// in flight during teardown have nowhere left to go.
impl ViewSink for Sender<View> {
    fn put(&mut self, view: View) {
        let _ = self.send(view);
    }
}

#[cfg(test)]
mod tests {

    use crate::events::{ChannelHeader, TransportEvent};
    use crate::gate::TaskId;
    use crate::pool::ViewPool;
    use super::ChannelQueue;

    fn data_event(pool: &std::sync::Arc<ViewPool>) -> TransportEvent {
        let header = ChannelHeader {
            channel: 0,
            source: TaskId::fresh(),
            target: TaskId::fresh(),
            length: 0,
            seqno: 0,
        };
        TransportEvent::Data(header, pool.acquire().unwrap())
    }

    #[test]
    fn data_events_are_stamped_fifo() {
        let pool = ViewPool::new(3, 64);
        let queue = ChannelQueue::new();
        for _ in 0 .. 3 {
            queue.push(data_event(&pool));
        }
        let mut staged = Vec::new();
        queue.drain_into(&mut staged);
        let seqnos: Vec<usize> = staged
            .iter()
            .map(|event| match event {
                TransportEvent::Data(header, _) => header.seqno,
                TransportEvent::Control(_) => unreachable!(),
            })
            .collect();
        assert_eq!(seqnos, vec![0, 1, 2]);
    }

    #[test]
    fn discard_refuses_later_pushes() {
        let pool = ViewPool::new(2, 64);
        let queue = ChannelQueue::new();
        queue.push(data_event(&pool));
        queue.discard();
        queue.push(data_event(&pool));
        assert!(queue.is_empty());
    }
}
