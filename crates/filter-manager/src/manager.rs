//! # Filter Manager
//!
//! Thread-safe registry of [`Filter`]s plus the dispatch loop that feeds them
//! from the event bus.
//!
//! ## Dispatch
//!
//! The loop runs on its own tokio task and consumes exactly three event
//! kinds: finalized blocks, pending blocks and log batches. For every event
//! it takes the registry read lock once and visits each filter:
//!
//! - `NewBlock` invokes `block_callback`
//! - `PendingBlock` invokes `pending_callback`
//! - `Logs` invokes `logs_callback` with the matched subset, only if non-empty
//!
//! Callbacks run synchronously on the dispatch task. A slow callback delays
//! the remaining filters and every later event. The manager reads from a
//! queued bus subscription, so delayed events wait in its queue rather than
//! being dropped; the queue is unbounded and grows while callbacks lag
//! behind publishers. Callbacks must not install or uninstall filters on
//! the manager that is calling them.
//!
//! A panicking callback is isolated: the panic is caught, logged with the
//! filter id, counted in [`FilterStats::callback_faults`], and dispatch
//! continues.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared_bus::{ChainEvent, EventFilter, EventKind, InMemoryEventBus, QueuedSubscription};
use shared_types::{Block, LogRecord};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::FilterManagerError;
use crate::filter::{Filter, FilterId};

/// The event kinds the dispatcher consumes, as a closed set.
#[derive(Debug, Clone)]
pub enum FilterEvent {
    /// A finalized block.
    NewBlock(Arc<Block>),
    /// A proposed block that is not final yet.
    PendingBlock(Arc<Block>),
    /// Ordered logs from one block.
    Logs(Arc<Vec<LogRecord>>),
}

impl FilterEvent {
    /// Bus kinds the dispatcher subscribes to.
    pub const KINDS: [EventKind; 3] = [EventKind::NewBlock, EventKind::PendingBlock, EventKind::Logs];

    /// Narrow a bus event to a dispatchable one.
    #[must_use]
    pub fn from_chain_event(event: ChainEvent) -> Option<Self> {
        match event {
            ChainEvent::NewBlock(block) => Some(Self::NewBlock(block)),
            ChainEvent::PendingBlock(block) => Some(Self::PendingBlock(block)),
            ChainEvent::Logs(logs) => Some(Self::Logs(logs)),
            ChainEvent::TxAdded { .. }
            | ChainEvent::PeerConnected { .. }
            | ChainEvent::PeerDisconnected { .. }
            | ChainEvent::SyncStatusChanged { .. } => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => "block",
            Self::PendingBlock(_) => "pending",
            Self::Logs(_) => "logs",
        }
    }
}

/// Lifecycle of a [`FilterManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterManagerState {
    Idle,
    Running,
    Stopped,
}

/// Dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    /// Bus events handed to the registry.
    pub events_dispatched: u64,
    /// Callback invocations, including faulted ones.
    pub callbacks_invoked: u64,
    /// Callback invocations that panicked.
    pub callback_faults: u64,
}

#[derive(Default)]
struct Registry {
    filters: HashMap<FilterId, Arc<Filter>>,
    next_id: u64,
}

#[derive(Default)]
struct Counters {
    events_dispatched: AtomicU64,
    callbacks_invoked: AtomicU64,
    callback_faults: AtomicU64,
}

/// State shared between the manager handle and the dispatch task.
struct Shared {
    registry: RwLock<Registry>,
    stopped: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn dispatch(&self, event: &FilterEvent) {
        let registry = self.registry.read();
        self.counters.events_dispatched.fetch_add(1, Ordering::Relaxed);
        trace!(kind = event.label(), filters = registry.filters.len(), "Dispatching event");

        match event {
            FilterEvent::NewBlock(block) => {
                for (id, filter) in &registry.filters {
                    if let Some(callback) = filter.block_callback() {
                        self.invoke(*id, "block", || callback(Arc::clone(block)));
                    }
                }
            }
            FilterEvent::PendingBlock(block) => {
                for (id, filter) in &registry.filters {
                    if let Some(callback) = filter.pending_callback() {
                        self.invoke(*id, "pending", || callback(Arc::clone(block)));
                    }
                }
            }
            FilterEvent::Logs(logs) => {
                for (id, filter) in &registry.filters {
                    let Some(callback) = filter.logs_callback() else {
                        continue;
                    };
                    let matched = filter.match_logs(logs);
                    if matched.is_empty() {
                        continue;
                    }
                    self.invoke(*id, "logs", || callback(matched));
                }
            }
        }
    }

    fn invoke(&self, id: FilterId, kind: &'static str, callback: impl FnOnce()) {
        self.counters.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
            self.counters.callback_faults.fetch_add(1, Ordering::Relaxed);
            error!(
                filter = %id,
                kind,
                reason = panic_message(payload.as_ref()),
                "Filter callback panicked, continuing dispatch"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Registry of installed filters and owner of the dispatch task.
pub struct FilterManager {
    bus: Arc<InMemoryEventBus>,
    shared: Arc<Shared>,
    state: Mutex<FilterManagerState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FilterManager {
    /// Create an idle manager over `bus`.
    #[must_use]
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            bus,
            shared: Arc::new(Shared {
                registry: RwLock::new(Registry::default()),
                stopped: AtomicBool::new(false),
                counters: Counters::default(),
            }),
            state: Mutex::new(FilterManagerState::Idle),
            shutdown,
            task: Mutex::new(None),
        }
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    /// Register a filter and return its id.
    ///
    /// Ids start at 0 and increase by one per install; they are never reused.
    pub fn install(&self, filter: Filter) -> FilterId {
        let mut registry = self.shared.registry.write();
        let id = FilterId(registry.next_id);
        registry.next_id += 1;
        registry.filters.insert(id, Arc::new(filter));
        debug!(filter = %id, "Filter installed");
        id
    }

    /// Remove a filter. Unknown ids are ignored.
    pub fn uninstall(&self, id: FilterId) {
        if self.shared.registry.write().filters.remove(&id).is_some() {
            debug!(filter = %id, "Filter uninstalled");
        }
    }

    /// Look up an installed filter.
    #[must_use]
    pub fn get(&self, id: FilterId) -> Option<Arc<Filter>> {
        self.shared.registry.read().filters.get(&id).cloned()
    }

    /// Number of installed filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.registry.read().filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Installed ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<FilterId> {
        let mut ids: Vec<FilterId> = self.shared.registry.read().filters.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Subscribe to the bus and spawn the dispatch loop.
    ///
    /// Must be called from within a tokio runtime. The subscription exists
    /// when this returns, so events published afterwards are dispatched.
    pub fn start(&self) -> Result<(), FilterManagerError> {
        let mut state = self.state.lock();
        match *state {
            FilterManagerState::Running => return Err(FilterManagerError::AlreadyStarted),
            FilterManagerState::Stopped => return Err(FilterManagerError::Stopped),
            FilterManagerState::Idle => {}
        }

        let subscription = self.bus.subscribe_queued(EventFilter::kinds(FilterEvent::KINDS));
        let handle = tokio::spawn(dispatch_loop(
            Arc::clone(&self.shared),
            subscription,
            self.shutdown.subscribe(),
        ));
        *self.task.lock() = Some(handle);
        *state = FilterManagerState::Running;

        info!("[FilterManager] Dispatch loop started");
        Ok(())
    }

    /// Stop dispatching. Safe to call any number of times.
    ///
    /// Once this returns, no event published afterwards reaches a callback.
    /// Installed filters stay in the registry.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == FilterManagerState::Stopped {
            debug!("[FilterManager] Already stopped");
            return;
        }

        self.shared.stopped.store(true, Ordering::SeqCst);
        // receivers may already be gone if the task exited on bus close
        let _ = self.shutdown.send(true);
        *state = FilterManagerState::Stopped;

        info!(filters = self.len(), "[FilterManager] Stopped");
    }

    /// Wait for the dispatch task to exit.
    ///
    /// Returns immediately if the manager was never started or was already
    /// joined.
    pub async fn join(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "[FilterManager] Dispatch task failed");
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> FilterManagerState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == FilterManagerState::Running
    }

    /// Snapshot of the dispatch counters.
    #[must_use]
    pub fn stats(&self) -> FilterStats {
        let counters = &self.shared.counters;
        FilterStats {
            events_dispatched: counters.events_dispatched.load(Ordering::Relaxed),
            callbacks_invoked: counters.callbacks_invoked.load(Ordering::Relaxed),
            callback_faults: counters.callback_faults.load(Ordering::Relaxed),
        }
    }
}

async fn dispatch_loop(
    shared: Arc<Shared>,
    mut subscription: QueuedSubscription,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            event = subscription.recv() => {
                let Some(event) = event else {
                    warn!("[FilterManager] Event bus closed, dispatch loop exiting");
                    break;
                };
                if shared.stopped.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(event) = FilterEvent::from_chain_event(event) {
                    shared.dispatch(&event);
                }
            }
        }
    }

    // unsubscribe before reporting exit
    drop(subscription);
    debug!("[FilterManager] Dispatch loop exited");
}
