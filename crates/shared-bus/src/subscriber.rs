//! # Event Subscriber
//!
//! Receiving side of the bus. Each handle filters by kind locally; the
//! broadcast channel itself carries every event.

use crate::events::{ChainEvent, EventFilter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

fn report_lag(skipped: u64) {
    warn!(skipped, "Subscriber lagged, events dropped");
}

/// Decrements the per-filter subscription count when dropped.
struct SubscriptionGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    key: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let mut subs = self.subscriptions.write();
        if let Some(count) = subs.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.key);
            }
        }
        debug!(kinds = %self.key, "Subscription dropped");
    }
}

/// A subscription handle for receiving events.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<ChainEvent>,
    filter: EventFilter,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<ChainEvent>,
        filter: EventFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            guard: SubscriptionGuard { subscriptions, key },
        }
    }

    /// Next event matching the filter, in publication order.
    ///
    /// Returns `None` once the bus is dropped. Events lost to lag are
    /// logged and skipped.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        use broadcast::error::RecvError;
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => report_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking [`Self::recv`]. `Ok(None)` means nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<ChainEvent>, SubscriptionError> {
        use broadcast::error::TryRecvError;
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => report_lag(skipped),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Kinds this subscription accepts.
    #[must_use]
    pub fn event_filter(&self) -> &EventFilter {
        &self.filter
    }
}

/// A lossless subscription created by
/// [`crate::InMemoryEventBus::subscribe_queued`].
///
/// The bus filters by kind before queueing, so every received event
/// matches. Dropping the handle unsubscribes at the next publish.
pub struct QueuedSubscription {
    receiver: mpsc::UnboundedReceiver<ChainEvent>,
    filter: EventFilter,
}

impl QueuedSubscription {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<ChainEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Next queued event. `None` once the bus is dropped and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking [`Self::recv`]. `Ok(None)` means the queue is empty.
    pub fn try_recv(&mut self) -> Result<Option<ChainEvent>, SubscriptionError> {
        use mpsc::error::TryRecvError;
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    #[must_use]
    pub fn event_filter(&self) -> &EventFilter {
        &self.filter
    }
}

/// A [`Subscription`] consumed as a `Stream`.
pub struct EventStream {
    inner: BroadcastStream<ChainEvent>,
    filter: EventFilter,
    _guard: SubscriptionGuard,
}

impl EventStream {
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            receiver,
            filter,
            guard,
        } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            _guard: guard,
        }
    }

    /// Kinds this stream yields. Named apart from `StreamExt::filter`.
    #[must_use]
    pub fn event_filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = ChainEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let next = match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(next) => next,
            };
            match next {
                Some(Ok(event)) if self.filter.matches(&event) => return Poll::Ready(Some(event)),
                Some(Ok(_)) => {}
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => report_lag(skipped),
                None => return Poll::Ready(None),
            }
        }
    }
}
