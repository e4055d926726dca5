//! # Address Book
//!
//! Cache of peer addresses learned from seeds, peer exchange and inbound
//! connections. The book is persisted through an [`AddrBookStore`]: on a timer
//! while running, and once more on [`AddrBook::stop`].
//!
//! Our own listener addresses are remembered separately and never enter the
//! book.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use shared_types::NetAddress;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AddrBookError;

/// Default period between background saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(120);

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// One address book entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAddress {
    pub addr: NetAddress,
    /// Who told us about `addr`.
    pub src: NetAddress,
    pub attempts: u32,
    pub last_attempt: Option<u64>,
    pub last_success: Option<u64>,
}

impl KnownAddress {
    fn new(addr: NetAddress, src: NetAddress) -> Self {
        Self {
            addr,
            src,
            attempts: 0,
            last_attempt: None,
            last_success: None,
        }
    }
}

// =============================================================================
// STORES
// =============================================================================

/// Persistence backend for the address book.
pub trait AddrBookStore: Send + Sync {
    /// Load every saved entry. A store that was never written is empty.
    fn load(&self) -> Result<Vec<KnownAddress>, AddrBookError>;

    /// Replace the saved entries.
    fn save(&self, entries: &[KnownAddress]) -> Result<(), AddrBookError>;
}

/// JSON file store. The file and its parent directory are created on the
/// first save.
#[derive(Debug, Clone)]
pub struct FileAddrBookStore {
    path: PathBuf,
}

impl FileAddrBookStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AddrBookStore for FileAddrBookStore {
    fn load(&self) -> Result<Vec<KnownAddress>, AddrBookError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &[KnownAddress]) -> Result<(), AddrBookError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // write-then-rename so a crash never leaves a truncated book
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryAddrBookStore {
    entries: Mutex<Vec<KnownAddress>>,
    saves: Mutex<usize>,
}

impl MemoryAddrBookStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl AddrBookStore for MemoryAddrBookStore {
    fn load(&self) -> Result<Vec<KnownAddress>, AddrBookError> {
        Ok(self.entries.lock().clone())
    }

    fn save(&self, entries: &[KnownAddress]) -> Result<(), AddrBookError> {
        *self.entries.lock() = entries.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

// =============================================================================
// ADDRESS BOOK
// =============================================================================

#[derive(Default)]
struct Book {
    addrs: HashMap<NetAddress, KnownAddress>,
    ours: HashSet<NetAddress>,
}

/// Peer address cache with periodic persistence.
pub struct AddrBook {
    store: Arc<dyn AddrBookStore>,
    book: RwLock<Book>,
    running: AtomicBool,
    stopped: AtomicBool,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AddrBook {
    /// Build a book from whatever `store` holds (empty if never saved).
    pub fn load(store: Arc<dyn AddrBookStore>) -> Result<Self, AddrBookError> {
        let entries = store.load()?;
        let addrs: HashMap<NetAddress, KnownAddress> = entries
            .into_iter()
            .map(|entry| (entry.addr.clone(), entry))
            .collect();
        info!(addresses = addrs.len(), "Address book loaded");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            store,
            book: RwLock::new(Book {
                addrs,
                ours: HashSet::new(),
            }),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown,
            task: Mutex::new(None),
        })
    }

    /// Remember one of our own listener addresses.
    pub fn add_our_address(&self, addr: NetAddress) {
        let mut book = self.book.write();
        book.addrs.remove(&addr);
        info!(addr = %addr, "Added our address to the address book");
        book.ours.insert(addr);
    }

    #[must_use]
    pub fn is_our_address(&self, addr: &NetAddress) -> bool {
        self.book.read().ours.contains(addr)
    }

    /// Add a peer address learned from `src`.
    ///
    /// Returns `false` for our own or unroutable addresses and for addresses
    /// already known.
    pub fn add_address(&self, addr: NetAddress, src: NetAddress) -> bool {
        if !addr.is_routable() {
            debug!(addr = %addr, "Ignoring unroutable address");
            return false;
        }
        let mut book = self.book.write();
        if book.ours.contains(&addr) || book.addrs.contains_key(&addr) {
            return false;
        }
        debug!(addr = %addr, src = %src, "New address");
        book.addrs.insert(addr.clone(), KnownAddress::new(addr, src));
        true
    }

    /// Record a connection attempt.
    pub fn mark_attempt(&self, addr: &NetAddress) {
        if let Some(entry) = self.book.write().addrs.get_mut(addr) {
            entry.attempts = entry.attempts.saturating_add(1);
            entry.last_attempt = Some(unix_now());
        }
    }

    /// Record a successful connection and reset the attempt counter.
    pub fn mark_good(&self, addr: &NetAddress) {
        if let Some(entry) = self.book.write().addrs.get_mut(addr) {
            entry.attempts = 0;
            entry.last_success = Some(unix_now());
        }
    }

    #[must_use]
    pub fn get(&self, addr: &NetAddress) -> Option<KnownAddress> {
        self.book.read().addrs.get(addr).cloned()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.book.read().addrs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Up to `n` distinct addresses chosen uniformly at random.
    #[must_use]
    pub fn pick_random(&self, n: usize) -> Vec<NetAddress> {
        let book = self.book.read();
        let all: Vec<&NetAddress> = book.addrs.keys().collect();
        all.choose_multiple(&mut rand::thread_rng(), n)
            .map(|addr| (*addr).clone())
            .collect()
    }

    /// Every entry, sorted by address.
    #[must_use]
    pub fn entries(&self) -> Vec<KnownAddress> {
        let mut entries: Vec<KnownAddress> = self.book.read().addrs.values().cloned().collect();
        entries.sort_by(|a, b| a.addr.cmp(&b.addr));
        entries
    }

    /// Persist the current contents.
    pub fn save(&self) -> Result<(), AddrBookError> {
        let entries = self.entries();
        self.store.save(&entries)?;
        debug!(addresses = entries.len(), "Address book saved");
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Spawn periodic persistence. Returns `false` if already running or
    /// stopped.
    pub fn start(self: &Arc<Self>, interval: Duration) -> bool {
        if self.stopped.load(Ordering::SeqCst) || self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let book = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = book.save() {
                            warn!(error = %e, "Periodic address book save failed");
                        }
                    }
                }
            }
        });
        *self.task.lock() = Some(handle);

        info!(interval_secs = interval.as_secs(), "Address book persistence started");
        true
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop periodic persistence and save once. Later calls are no-ops.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Address book already stopped");
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }

        match self.save() {
            Ok(()) => info!(addresses = self.size(), "Address book stopped"),
            Err(e) => warn!(error = %e, "Final address book save failed"),
        }
    }
}
