//! # Event Sink Capability
//!
//! Every reactor that fires events implements [`Eventable`]. The node wires
//! the bus into each one at construction time, so a component cannot be
//! registered without explicitly accepting a sink.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::ChainEvent;
use crate::publisher::EventPublisher;

/// Shared handle reactors publish through.
pub type EventSink = Arc<dyn EventPublisher>;

/// Capability: "accepts an event sink".
pub trait Eventable: Send + Sync {
    /// Attach the sink this component fires events into.
    fn set_event_sink(&self, sink: EventSink);
}

/// Attach one sink to many components.
pub fn wire_event_sink(sink: &EventSink, components: &[&dyn Eventable]) {
    for component in components {
        component.set_event_sink(Arc::clone(sink));
    }
}

/// Slot holding an optional sink, for components that fire before or
/// without being wired.
#[derive(Default)]
pub struct EventSinkSlot {
    sink: RwLock<Option<EventSink>>,
}

impl EventSinkSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sink.
    pub fn set(&self, sink: EventSink) {
        *self.sink.write() = Some(sink);
    }

    /// Whether a sink has been attached.
    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Fire an event; a no-op returning 0 while unwired.
    pub fn fire(&self, event: ChainEvent) -> usize {
        match self.sink.read().as_ref() {
            Some(sink) => sink.publish(event),
            None => 0,
        }
    }
}
