//! # Reactors
//!
//! A reactor is an independently scheduled subsystem attached to the switch
//! (peer exchange, block sync, mempool, consensus). Every reactor accepts an
//! event sink through the [`Eventable`] supertrait.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shared_bus::{ChainEvent, EventSink, EventSinkSlot, Eventable};
use tracing::{debug, info};

use crate::error::P2pError;
use crate::peer::Peer;

/// A subsystem driven by the switch.
#[async_trait]
pub trait Reactor: Eventable {
    /// Registration name, e.g. `"CONSENSUS"`.
    fn name(&self) -> &str;

    /// Start background work. Called once by [`crate::Switch::start`].
    async fn start(&self) -> Result<(), P2pError>;

    /// Stop background work. Must tolerate repeated calls.
    async fn stop(&self);

    fn is_running(&self) -> bool;

    /// A peer joined the switch.
    fn add_peer(&self, _peer: &Peer) {}

    /// A peer left the switch.
    fn remove_peer(&self, _peer: &Peer) {}
}

/// Lifecycle flag and event sink shared by the concrete reactors.
pub struct BaseReactor {
    name: &'static str,
    running: AtomicBool,
    events: EventSinkSlot,
}

impl BaseReactor {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: AtomicBool::new(false),
            events: EventSinkSlot::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Mark running. Returns `false` if it already was.
    pub fn start(&self) -> bool {
        let started = !self.running.swap(true, Ordering::SeqCst);
        if started {
            info!(reactor = self.name, "Reactor started");
        } else {
            debug!(reactor = self.name, "Reactor already running");
        }
        started
    }

    /// Mark stopped. Returns `false` if it already was.
    pub fn stop(&self) -> bool {
        let stopped = self.running.swap(false, Ordering::SeqCst);
        if stopped {
            info!(reactor = self.name, "Reactor stopped");
        }
        stopped
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_event_sink(&self, sink: EventSink) {
        self.events.set(sink);
    }

    #[must_use]
    pub fn has_event_sink(&self) -> bool {
        self.events.is_wired()
    }

    /// Publish through the wired sink, if any.
    pub fn fire(&self, event: ChainEvent) -> usize {
        self.events.fire(event)
    }
}

impl Eventable for BaseReactor {
    fn set_event_sink(&self, sink: EventSink) {
        BaseReactor::set_event_sink(self, sink);
    }
}
