//! The per-task data producer: owns the task's output gates and allocator.

use std::sync::Arc;

use strom_bytes::view::View;

use crate::errors::ShuffleError;
use crate::events::{ChannelHeader, DataEvent, TransportEvent};
use crate::exchange::ChannelQueue;
use crate::gate::{ChannelTarget, OutputGate, TaskId};
use crate::logging::{GateEvent, MessageEvent, ShuffleLogger, StateEvent};
use crate::pool::ViewPool;
use crate::ViewSink;

use serde::{Deserialize, Serialize};

/// Lifecycle of a data producer.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ProducerState {
    /// Constructed; no topology bound yet.
    Unbound,
    /// Topology and allocator bound; nothing emitted yet.
    Bound,
    /// At least one view or event has been emitted.
    Active,
    /// Graceful shutdown in progress, draining channel queues.
    Closing,
    /// Shut down; all gate operations fail.
    Shutdown,
}

/// Owns all of a task's output gates plus the pool filling its outgoing views.
///
/// Constructed when the task starts with the expected topology shape, bound exactly
/// once with the resolved downstream targets and an allocator, used for the task's
/// active lifetime, and shut down when the task finishes or is cancelled.
pub struct DataProducer {
    task: TaskId,
    shape: Vec<usize>,
    state: ProducerState,
    gates: Vec<OutputGate>,
    allocator: Option<Arc<ViewPool>>,
    logger: Option<ShuffleLogger>,
}

impl DataProducer {

    /// Creates an unbound producer for `task`, expecting `shape[g]` channels on
    /// gate `g`.
    pub fn new(task: TaskId, shape: Vec<usize>, logger: Option<ShuffleLogger>) -> DataProducer {
        DataProducer {
            task,
            shape,
            state: ProducerState::Unbound,
            gates: Vec::new(),
            allocator: None,
            logger,
        }
    }

    /// The producer's current lifecycle state.
    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// The identity of the producing task.
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// The bound allocator, once `bind` has succeeded.
    pub fn allocator(&self) -> Option<&Arc<ViewPool>> {
        self.allocator.as_ref()
    }

    /// The bound output gates.
    pub fn gates(&self) -> &[OutputGate] {
        &self.gates
    }

    /// Binds the resolved downstream topology and the allocator.
    ///
    /// The binding must match the shape the producer was constructed with, gate for
    /// gate and channel for channel; mismatches fail here, at deployment time, not
    /// lazily during emission. Binding twice is an illegal state.
    pub fn bind(
        &mut self,
        binding: Vec<Vec<ChannelTarget>>,
        allocator: Arc<ViewPool>,
    ) -> Result<(), ShuffleError> {

        if self.state != ProducerState::Unbound {
            return Err(ShuffleError::IllegalState { operation: "bind", state: self.state });
        }

        if binding.len() != self.shape.len() {
            return Err(ShuffleError::Binding(format!(
                "expected {} gates, binding has {}",
                self.shape.len(),
                binding.len(),
            )));
        }
        for (gate, (targets, expected)) in binding.iter().zip(self.shape.iter()).enumerate() {
            if targets.is_empty() {
                return Err(ShuffleError::Binding(format!("gate {} has no channels", gate)));
            }
            if targets.len() != *expected {
                return Err(ShuffleError::Binding(format!(
                    "gate {} expected {} channels, binding has {}",
                    gate,
                    expected,
                    targets.len(),
                )));
            }
            for (index, target) in targets.iter().enumerate() {
                if targets[.. index].iter().any(|other| other.task == target.task) {
                    return Err(ShuffleError::Binding(format!(
                        "gate {} binds task {:?} twice",
                        gate, target.task,
                    )));
                }
            }
        }

        self.gates = binding
            .into_iter()
            .enumerate()
            .map(|(index, targets)| OutputGate::new(index, targets))
            .collect();

        // Announce each live channel to its downstream peer.
        for gate in &self.gates {
            for channel in gate.iter() {
                channel.queue.push(TransportEvent::Control(DataEvent::GateOpen { gate: gate.index() }));
            }
            self.logger.as_ref().map(|l| l.log(GateEvent {
                gate: gate.index(),
                channels: gate.channels(),
                bound: true,
            }));
        }

        self.allocator = Some(allocator);
        self.transition(ProducerState::Bound);
        Ok(())
    }

    /// Routes one pre-built control event to exactly one channel.
    pub fn emit_event(
        &mut self,
        gate: usize,
        channel: usize,
        event: DataEvent,
    ) -> Result<(), ShuffleError> {
        self.ready("emit_event")?;
        let queue = self.queue(gate, channel)?.clone();
        queue.push(TransportEvent::Control(event));
        Ok(())
    }

    /// Routes one filled view to exactly one channel's outbound queue.
    ///
    /// This is the hot path, invoked by an output stream's flush.
    pub fn emit(&mut self, gate: usize, channel: usize, view: View) -> Result<(), ShuffleError> {
        self.ready("emit")?;
        let target = self.gates.get(gate)
            .and_then(|g| g.channel(channel))
            .ok_or(ShuffleError::UnknownChannel { gate, channel })?;
        let header = self.header(channel, target.task, &view);
        self.logger.as_ref().map(|l| l.log(MessageEvent { broadcast: false, header }));
        target.queue.push(TransportEvent::Data(header, view));
        Ok(())
    }

    /// Replicates a view's contents to every channel of a gate.
    ///
    /// Downstream channels must not share a mutable view and need not drain at the
    /// same rate, so every channel but the last receives a fresh pool view with the
    /// payload copied; the last receives the original by move.
    pub fn broadcast(&mut self, gate: usize, view: View) -> Result<(), ShuffleError> {
        self.ready("broadcast")?;
        if gate >= self.gates.len() {
            return Err(ShuffleError::UnknownChannel { gate, channel: 0 });
        }
        let allocator = self.allocator.clone().expect("bound producer has an allocator");
        let channels = self.gates[gate].channels();

        for channel in 0 .. channels - 1 {
            let mut copy = allocator.acquire().ok_or(ShuffleError::Terminated)?;
            let bytes = view.capacity().min(copy.capacity());
            copy[.. bytes].copy_from_slice(&view[.. bytes]);
            let target = self.gates[gate].channel(channel).expect("channel in bounds");
            let header = self.header(channel, target.task, &copy);
            self.logger.as_ref().map(|l| l.log(MessageEvent { broadcast: true, header }));
            target.queue.push(TransportEvent::Data(header, copy));
        }

        let channel = channels - 1;
        let target = self.gates[gate].channel(channel).expect("channel in bounds");
        let header = self.header(channel, target.task, &view);
        self.logger.as_ref().map(|l| l.log(MessageEvent { broadcast: true, header }));
        target.queue.push(TransportEvent::Data(header, view));
        Ok(())
    }

    /// Signals that no further data will be emitted on `gate`.
    ///
    /// Every channel of the gate receives the terminal event corresponding to the
    /// `ITERATION_END` marker, so the matching input streams terminate cleanly.
    pub fn done(&mut self, gate: usize) -> Result<(), ShuffleError> {
        self.ready("done")?;
        if gate >= self.gates.len() {
            return Err(ShuffleError::UnknownChannel { gate, channel: 0 });
        }
        for channel in self.gates[gate].iter() {
            channel.queue.push(TransportEvent::Control(DataEvent::Exhausted { gate }));
        }
        self.logger.as_ref().map(|l| l.log(GateEvent {
            gate,
            channels: self.gates[gate].channels(),
            bound: false,
        }));
        Ok(())
    }

    /// Shuts the producer down.
    ///
    /// With `await_exhaustion` the call blocks until every view handed to a channel
    /// has been dequeued by the transport; without it, in-flight events are
    /// discarded and any thread blocked acquiring a view is released immediately.
    /// Either way the allocator is closed and the producer ends in `Shutdown`.
    pub fn shutdown(&mut self, await_exhaustion: bool) {
        if self.state == ProducerState::Shutdown {
            return;
        }
        if await_exhaustion {
            self.transition(ProducerState::Closing);
            for gate in &self.gates {
                for channel in gate.iter() {
                    channel.queue.await_drained();
                }
            }
        } else {
            for gate in &self.gates {
                for channel in gate.iter() {
                    channel.queue.discard();
                }
            }
        }
        if let Some(allocator) = &self.allocator {
            allocator.close();
        }
        self.transition(ProducerState::Shutdown);
    }

    /// The downstream task bound to `(gate, channel)`.
    pub fn task_from_channel(&self, gate: usize, channel: usize) -> Option<TaskId> {
        self.gates.get(gate).and_then(|g| g.task(channel))
    }

    /// The gate whose channels include `task`.
    pub fn gate_from_task(&self, task: &TaskId) -> Option<usize> {
        self.gates
            .iter()
            .find(|gate| gate.channel_of(task).is_some())
            .map(|gate| gate.index())
    }

    /// The channel index bound to `task` within its gate.
    pub fn channel_from_task(&self, task: &TaskId) -> Option<usize> {
        self.gates.iter().find_map(|gate| gate.channel_of(task))
    }

    /// A [`ViewSink`] routing flushed views straight into one channel's queue, for
    /// wiring an output stream to the channel.
    pub fn view_sink(&self, gate: usize, channel: usize) -> Result<ChannelSink, ShuffleError> {
        if self.state == ProducerState::Unbound || self.state == ProducerState::Shutdown {
            return Err(ShuffleError::IllegalState { operation: "view_sink", state: self.state });
        }
        let target = self.gates.get(gate)
            .and_then(|g| g.channel(channel))
            .ok_or(ShuffleError::UnknownChannel { gate, channel })?;
        Ok(ChannelSink {
            queue: target.queue.clone(),
            channel,
            source: self.task,
            target: target.task,
        })
    }

    /// Fails unless emission is currently legal; activates a bound producer.
    fn ready(&mut self, operation: &'static str) -> Result<(), ShuffleError> {
        match self.state {
            ProducerState::Bound => {
                self.transition(ProducerState::Active);
                Ok(())
            }
            ProducerState::Active => Ok(()),
            state => Err(ShuffleError::IllegalState { operation, state }),
        }
    }

    fn queue(&self, gate: usize, channel: usize) -> Result<&ChannelQueue, ShuffleError> {
        self.gates
            .get(gate)
            .and_then(|g| g.channel(channel))
            .map(|c| &c.queue)
            .ok_or(ShuffleError::UnknownChannel { gate, channel })
    }

    fn header(&self, channel: usize, target: TaskId, view: &View) -> ChannelHeader {
        ChannelHeader {
            channel,
            source: self.task,
            target,
            length: view.size(),
            // Stamped by the queue at enqueue.
            seqno: 0,
        }
    }

    fn transition(&mut self, to: ProducerState) {
        let from = std::mem::replace(&mut self.state, to);
        self.logger.as_ref().map(|l| l.log(StateEvent { task: self.task, from, to }));
    }
}

/// A `ViewSink` that enqueues flushed views to one channel.
pub struct ChannelSink {
    queue: ChannelQueue,
    channel: usize,
    source: TaskId,
    target: TaskId,
}

impl ViewSink for ChannelSink {
    fn put(&mut self, view: View) {
        let header = ChannelHeader {
            channel: self.channel,
            source: self.source,
            target: self.target,
            length: view.size(),
            seqno: 0,
        };
        self.queue.push(TransportEvent::Data(header, view));
    }
}
