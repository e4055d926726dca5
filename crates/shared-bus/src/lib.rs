//! # Shared Bus - Process-wide Event Bus
//!
//! Producers (consensus, mempool, switch, block sync) post typed
//! [`ChainEvent`]s; consumers subscribe with an [`EventFilter`] and receive a
//! single ordered stream.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────────┐
//! │   Reactor    │    publish()       │  Filter manager  │
//! │ (Eventable)  │ ──────┐            │  RPC /events     │
//! └──────────────┘       │            └──────────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod sink;
pub mod subscriber;

// Re-export main types
pub use events::{ChainEvent, EventFilter, EventKind};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use sink::{wire_event_sink, EventSink, EventSinkSlot, Eventable};
pub use subscriber::{EventStream, QueuedSubscription, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
