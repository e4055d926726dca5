//! # Event Publisher
//!
//! Sending side of the bus, with its start/stop gate.

use crate::events::{ChainEvent, EventFilter};
use crate::subscriber::{EventStream, QueuedSubscription, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

/// Where reactors send their events. Handed out as an
/// [`crate::EventSink`].
pub trait EventPublisher: Send + Sync {
    /// Returns how many subscribers the event reached.
    fn publish(&self, event: ChainEvent) -> usize;

    /// Events accepted since creation.
    fn events_published(&self) -> u64;
}

/// Process-local bus over a `tokio::sync::broadcast` channel.
///
/// Publishing never blocks. A [`Subscription`] that falls more than
/// `capacity` events behind loses the oldest ones. A [`QueuedSubscription`]
/// never loses events; its queue grows instead. Every subscriber observes
/// events in publication order.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<ChainEvent>,
    /// Live subscriptions keyed by their kind filter, for diagnostics.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    queued: RwLock<Vec<QueuedSender>>,
    running: AtomicBool,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new, not yet started, event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new, not yet started, event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            queued: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Start accepting events. Returns `false` if already running.
    pub fn start(&self) -> bool {
        let started = !self.running.swap(true, Ordering::SeqCst);
        if started {
            info!(capacity = self.capacity, "Event bus started");
        }
        started
    }

    /// Stop accepting events. Safe to call repeatedly.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(
                published = self.events_published(),
                "Event bus stopped"
            );
        }
    }

    /// Whether the bus currently accepts events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to events matching a filter.
    ///
    /// Events published before this call are not delivered.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = format!("{:?}", filter.kinds);

        *self.subscriptions.write().entry(key.clone()).or_insert(0) += 1;

        debug!(kinds = ?filter.kinds, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), key)
    }

    /// Subscribe with a private unbounded queue filled at publish time.
    ///
    /// Unlike [`Self::subscribe`], a slow consumer never misses events; they
    /// wait in its queue until it catches up.
    #[must_use]
    pub fn subscribe_queued(&self, filter: EventFilter) -> QueuedSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(kinds = ?filter.kinds, "New queued subscription created");
        self.queued.write().push(QueuedSender {
            filter: filter.clone(),
            sender,
        });
        QueuedSubscription::new(receiver, filter)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let queued = self
            .queued
            .read()
            .iter()
            .filter(|q| !q.sender.is_closed())
            .count();
        self.sender.receiver_count() + queued
    }

    /// Push `event` to every live queued subscriber it matches, dropping
    /// queues whose receiver is gone.
    fn push_queued(&self, event: &ChainEvent) -> usize {
        let mut queues = self.queued.write();
        queues.retain(|q| !q.sender.is_closed());
        queues
            .iter()
            .filter(|q| q.filter.matches(event))
            .filter(|q| q.sender.send(event.clone()).is_ok())
            .count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct QueuedSender {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<ChainEvent>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: ChainEvent) -> usize {
        let kind = event.kind();
        if !self.is_running() {
            warn!(?kind, "Bus not running, event dropped");
            return 0;
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
        let queued = self.push_queued(&event);
        // send only fails when nobody is subscribed
        let reached = self.sender.send(event).unwrap_or(0) + queued;
        trace!(?kind, reached, "Event published");
        reached
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
