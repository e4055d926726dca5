//! # Switch
//!
//! Owns the listeners, the connected peers and the registered reactors.
//!
//! ## Lifecycle
//!
//! - `start()`: reactors start in registration order, then one accept loop is
//!   spawned per listener.
//! - `stop()`: accept loops end, every peer is dropped without a goodbye,
//!   then reactors stop in registration order.
//!
//! A peer whose remote hangs up is removed as if `stop_peer` had been called,
//! unless a newer connection has taken its address in the meantime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use shared_bus::{ChainEvent, EventSink, EventSinkSlot, Eventable};
use shared_types::{NetAddress, NodeInfo};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::P2pError;
use crate::peer::{Connection, Peer};
use crate::reactor::Reactor;
use crate::transport::{Dialer, Listener};

/// Back-off after a failed `accept`.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Transport hub shared by every reactor.
pub struct Switch {
    dialer: Arc<dyn Dialer>,
    reactors: RwLock<Vec<(String, Arc<dyn Reactor>)>>,
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
    peers: RwLock<HashMap<NetAddress, Arc<Peer>>>,
    node_info: RwLock<Option<NodeInfo>>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    accept_tasks: Mutex<Vec<JoinHandle<()>>>,
    events: EventSinkSlot,
}

impl Switch {
    #[must_use]
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            dialer,
            reactors: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            peers: RwLock::new(HashMap::new()),
            node_info: RwLock::new(None),
            running: AtomicBool::new(false),
            shutdown,
            accept_tasks: Mutex::new(Vec::new()),
            events: EventSinkSlot::new(),
        }
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register a reactor under `name`. A later registration with the same
    /// name replaces the earlier one in place.
    pub fn add_reactor(&self, name: impl Into<String>, reactor: Arc<dyn Reactor>) {
        let name = name.into();
        let mut reactors = self.reactors.write();
        if let Some(slot) = reactors.iter_mut().find(|(n, _)| *n == name) {
            warn!(reactor = %name, "Replacing registered reactor");
            slot.1 = reactor;
        } else {
            debug!(reactor = %name, "Reactor registered");
            reactors.push((name, reactor));
        }
    }

    #[must_use]
    pub fn reactor(&self, name: &str) -> Option<Arc<dyn Reactor>> {
        self.reactors
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| Arc::clone(r))
    }

    /// Registered reactor names in registration order.
    #[must_use]
    pub fn reactor_names(&self) -> Vec<String> {
        self.reactors.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        info!(addr = %listener.external_address(), "Listener added to switch");
        self.listeners.write().push(listener);
    }

    #[must_use]
    pub fn listeners(&self) -> Vec<Arc<dyn Listener>> {
        self.listeners.read().clone()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        !self.listeners.read().is_empty()
    }

    pub fn set_node_info(&self, info: NodeInfo) {
        *self.node_info.write() = Some(info);
    }

    #[must_use]
    pub fn node_info(&self) -> Option<NodeInfo> {
        self.node_info.read().clone()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start reactors, then the listeners' accept loops.
    pub async fn start(self: &Arc<Self>) -> Result<(), P2pError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(P2pError::AlreadyStarted);
        }

        let reactors = self.reactors.read().clone();
        for (name, reactor) in &reactors {
            info!("[Switch] Starting reactor {}", name);
            reactor.start().await?;
        }

        let mut tasks = self.accept_tasks.lock();
        for listener in self.listeners() {
            tasks.push(tokio::spawn(accept_loop(
                Arc::clone(self),
                listener,
                self.shutdown.subscribe(),
            )));
        }

        info!(
            reactors = reactors.len(),
            listeners = tasks.len(),
            "[Switch] Started"
        );
        Ok(())
    }

    /// Stop accepting, drop every peer, stop reactors. Repeated calls are
    /// no-ops.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("[Switch] Not running");
            return;
        }

        let _ = self.shutdown.send(true);
        for task in self.accept_tasks.lock().drain(..) {
            task.abort();
        }

        let peers: Vec<Arc<Peer>> = self.peers.write().drain().map(|(_, p)| p).collect();
        for peer in &peers {
            self.disconnected(peer);
        }

        let reactors = self.reactors.read().clone();
        for (name, reactor) in &reactors {
            info!("[Switch] Stopping reactor {}", name);
            reactor.stop().await;
        }
        info!(peers = peers.len(), "[Switch] Stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // =========================================================================
    // PEERS
    // =========================================================================

    /// Dial `addr` and register the resulting outbound peer.
    ///
    /// Dialing an already connected address returns the existing peer.
    pub async fn dial_peer_with_address(
        self: &Arc<Self>,
        addr: &NetAddress,
    ) -> Result<Arc<Peer>, P2pError> {
        if self.is_own_address(addr) {
            return Err(P2pError::SelfDial(addr.clone()));
        }
        let existing = self.peers.read().get(addr).cloned();
        if let Some(peer) = existing {
            return Ok(peer);
        }

        debug!(peer = %addr, "Dialing peer");
        let connection = self.dialer.dial(addr).await?;
        Ok(self.add_peer(connection, true))
    }

    /// Drop a peer without a goodbye. Unknown addresses are ignored.
    pub fn stop_peer(&self, addr: &NetAddress) {
        let removed = self.peers.write().remove(addr);
        if let Some(peer) = removed {
            self.disconnected(&peer);
        }
    }

    #[must_use]
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    #[must_use]
    pub fn num_peers(&self) -> usize {
        self.peers.read().len()
    }

    fn is_own_address(&self, addr: &NetAddress) -> bool {
        self.listeners
            .read()
            .iter()
            .any(|l| l.external_address() == *addr || l.internal_address() == *addr)
    }

    fn add_peer(self: &Arc<Self>, connection: Connection, outbound: bool) -> Arc<Peer> {
        let peer = Arc::new(Peer::new(connection, outbound));
        let address = peer.address().clone();

        if let Some(previous) = self.peers.write().insert(address.clone(), Arc::clone(&peer)) {
            previous.close();
        }

        let switch: Weak<Switch> = Arc::downgrade(self);
        peer.spawn_reader(move |peer| {
            if let Some(switch) = switch.upgrade() {
                switch.remove_hung_up(&peer);
            }
        });

        for (_, reactor) in self.reactors.read().iter() {
            reactor.add_peer(&peer);
        }
        self.events.fire(ChainEvent::PeerConnected {
            address: address.clone(),
            outbound,
        });
        info!(peer = %address, outbound, "Peer connected");
        peer
    }

    /// Drop `peer` after its remote closed, if it still owns its address.
    fn remove_hung_up(&self, peer: &Arc<Peer>) {
        let removed = {
            let mut peers = self.peers.write();
            let current = peers
                .get(peer.address())
                .is_some_and(|registered| Arc::ptr_eq(registered, peer));
            if current {
                peers.remove(peer.address())
            } else {
                None
            }
        };
        if let Some(peer) = removed {
            info!(peer = %peer.address(), "Peer hung up");
            self.disconnected(&peer);
        }
    }

    fn disconnected(&self, peer: &Arc<Peer>) {
        peer.close();
        for (_, reactor) in self.reactors.read().iter() {
            reactor.remove_peer(peer);
        }
        self.events.fire(ChainEvent::PeerDisconnected {
            address: peer.address().clone(),
        });
        debug!(peer = %peer.address(), "Peer disconnected");
    }
}

impl Eventable for Switch {
    fn set_event_sink(&self, sink: EventSink) {
        self.events.set(sink);
    }
}

async fn accept_loop(
    switch: Arc<Switch>,
    listener: Arc<dyn Listener>,
    mut shutdown: watch::Receiver<bool>,
) {
    let local = listener.internal_address();
    info!(addr = %local, "Accepting inbound peers");
    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            accepted = listener.accept() => match accepted {
                Ok(connection) => {
                    switch.add_peer(connection, false);
                }
                Err(e) => {
                    warn!(addr = %local, error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
    debug!(addr = %local, "Accept loop exited");
}
