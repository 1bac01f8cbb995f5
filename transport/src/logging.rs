//! Typed log events for the shuffle layer.

use serde::{Deserialize, Serialize};

use crate::events::ChannelHeader;
use crate::gate::TaskId;
use crate::producer::ProducerState;

/// A logger handle for shuffle events.
pub type ShuffleLogger = strom_logging::Logger<ShuffleEvent>;

/// A producer changed lifecycle state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StateEvent {
    /// The task whose producer transitioned.
    pub task: TaskId,
    /// State before the transition.
    pub from: ProducerState,
    /// State after the transition.
    pub to: ProducerState,
}

/// A gate was bound or declared done.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GateEvent {
    /// Gate index.
    pub gate: usize,
    /// Number of channels on the gate.
    pub channels: usize,
    /// True at bind, false at `done`.
    pub bound: bool,
}

/// A view was enqueued to a channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// True when replicated by a broadcast, false for a point-to-point emit.
    pub broadcast: bool,
    /// The header accompanying the view.
    pub header: ChannelHeader,
}

/// Any shuffle event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ShuffleEvent {
    /// Producer lifecycle transition.
    State(StateEvent),
    /// Gate bind or completion.
    Gate(GateEvent),
    /// View enqueued to a channel.
    Message(MessageEvent),
}

impl From<StateEvent> for ShuffleEvent {
    fn from(event: StateEvent) -> Self { ShuffleEvent::State(event) }
}

impl From<GateEvent> for ShuffleEvent {
    fn from(event: GateEvent) -> Self { ShuffleEvent::Gate(event) }
}

impl From<MessageEvent> for ShuffleEvent {
    fn from(event: MessageEvent) -> Self { ShuffleEvent::Message(event) }
}
