//! Output gates: the logical output edges of a task.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exchange::ChannelQueue;

/// Identity of a task instance, stable for the lifetime of the job.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {

    /// Mints a fresh random identity.
    pub fn fresh() -> TaskId {
        TaskId(Uuid::new_v4())
    }

    /// Reconstructs an identity from its integer form.
    pub fn from_u128(bits: u128) -> TaskId {
        TaskId(Uuid::from_u128(bits))
    }

    /// The integer form, as written into channel headers.
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

/// Where one channel's traffic should go: the downstream task's identity, and the
/// rendezvous over which the transport receives a handle to the channel's queue.
pub struct ChannelTarget {
    /// Identity of the downstream task instance.
    pub task: TaskId,
    /// Fulfilled with the channel's queue at bind time, so the transport thread
    /// serving this target can start draining it.
    pub promise: Sender<ChannelQueue>,
}

/// One parallel-instance-specific sub-edge of a gate.
pub struct Channel {
    pub(crate) task: TaskId,
    pub(crate) queue: ChannelQueue,
}

/// A logical output edge of a task: an ordered list of channels, one per parallel
/// instance of the downstream task bound to the edge.
pub struct OutputGate {
    index: usize,
    channels: Vec<Channel>,
}

impl OutputGate {

    /// Builds the gate's channels and fulfills each target's queue promise.
    pub(crate) fn new(index: usize, targets: Vec<ChannelTarget>) -> OutputGate {
        let channels = targets
            .into_iter()
            .map(|target| {
                let queue = ChannelQueue::new();
                // The serving transport thread may already be gone during teardown.
                let _ = target.promise.send(queue.clone());
                Channel { task: target.task, queue }
            })
            .collect();
        OutputGate { index, channels }
    }

    /// The gate's index among the task's output edges.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The number of channels on this gate.
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// The downstream task bound to `channel`.
    pub fn task(&self, channel: usize) -> Option<TaskId> {
        self.channels.get(channel).map(|c| c.task)
    }

    /// The channel index bound to `task`, if any.
    pub fn channel_of(&self, task: &TaskId) -> Option<usize> {
        self.channels.iter().position(|c| c.task == *task)
    }

    pub(crate) fn channel(&self, channel: usize) -> Option<&Channel> {
        self.channels.get(channel)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }
}
