//! # Node
//!
//! Assembles storage, the event bus, the address book, the reactors and the
//! switch into one node and drives its lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Node::new ──→ add_listener* ──→ start ──→ dial_seeds ──→ start_rpc
//!                                                              │
//!                                   stop ←── shutdown signal ←─┘
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use p2p_switch::{
    AddrBook, DefaultListener, Dialer, Listener, PexReactor, Switch, TcpDialer, PEX_REACTOR_NAME,
};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use shared_bus::{wire_event_sink, EventSink, InMemoryEventBus};
use shared_types::{NetAddress, NodeInfo, PublicKey};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::reactors::{
    BlockchainReactor, ConsensusReactor, ConsensusState, Mempool, MempoolReactor,
    BLOCKCHAIN_REACTOR_NAME, CONSENSUS_REACTOR_NAME, DEFAULT_MEMPOOL_CAPACITY,
    MEMPOOL_REACTOR_NAME,
};
use crate::rpc::{self, RpcContext, RpcServerHandle};
use crate::storage::{
    credential, load_or_generate, load_or_genesis, BlockStore, ChainState, GenesisDoc,
    KvStateStore, NodeStores, StateStore,
};

/// Protocol version advertised in [`NodeInfo`].
pub const NODE_VERSION: &str = "0.2.0";

/// Outcome of [`Node::dial_seeds`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedDialReport {
    /// Seeds tried, including unparsable ones.
    pub attempted: usize,
    /// Seeds that connected, in dial order.
    pub connected: Vec<NetAddress>,
    /// Seeds that failed, as configured.
    pub failed: Vec<String>,
}

pub struct Node {
    config: NodeConfig,
    bus: Arc<InMemoryEventBus>,
    switch: Arc<Switch>,
    addr_book: Arc<AddrBook>,
    block_store: Arc<BlockStore>,
    chain_state: Arc<RwLock<ChainState>>,
    pex: Arc<PexReactor>,
    mempool: Arc<MempoolReactor>,
    blockchain: Arc<BlockchainReactor>,
    consensus: Arc<ConsensusReactor>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Node {
    /// Build a node that dials peers over TCP.
    pub fn new(config: NodeConfig, stores: NodeStores) -> Result<Self, NodeError> {
        let dialer = Arc::new(TcpDialer::new(config.dial_timeout()));
        Self::with_dialer(config, stores, dialer)
    }

    /// Build a node around an explicit dialer.
    pub fn with_dialer(
        config: NodeConfig,
        stores: NodeStores,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self, NodeError> {
        info!(moniker = %config.moniker, network = %config.network, "Creating node");

        let block_store = Arc::new(BlockStore::new(Arc::clone(&stores.block_db)));

        let validator = if config.validator.enabled {
            Some(load_or_generate(stores.credentials.as_ref())?)
        } else {
            info!("Validator disabled, running as observer");
            None
        };

        let state_store = Arc::new(KvStateStore::new(Arc::clone(&stores.state_db)));
        let genesis_path = config.genesis_path();
        if state_store.load()?.is_none() && !genesis_path.exists() {
            let Some(pv) = validator.as_ref() else {
                return Err(NodeError::Genesis(format!(
                    "genesis file {} not found",
                    genesis_path.display()
                )));
            };
            let genesis = GenesisDoc {
                chain_id: config.network.clone(),
                genesis_time: unix_now(),
                validators: vec![pv.to_validator(credential::DEFAULT_VOTING_POWER)],
                app_hash: [0; 32],
            };
            genesis.save(&genesis_path)?;
        }
        let state = load_or_genesis(state_store.as_ref(), &genesis_path)?;

        let bus = Arc::new(InMemoryEventBus::new());
        bus.start();

        let addr_book = Arc::new(AddrBook::load(Arc::clone(&stores.addr_book))?);

        let chain_state = Arc::new(RwLock::new(state.clone()));
        let pex = Arc::new(PexReactor::new(Arc::clone(&addr_book)));
        let blockchain = Arc::new(BlockchainReactor::new(
            Arc::clone(&chain_state),
            Arc::clone(&block_store),
            config.fast_sync,
        ));
        let mempool = Arc::new(MempoolReactor::new(Mempool::new(
            &state,
            DEFAULT_MEMPOOL_CAPACITY,
        )));
        let consensus_state = Arc::new(ConsensusState::new(
            Arc::clone(&chain_state),
            state_store,
            Arc::clone(&block_store),
            Arc::clone(&mempool),
        ));
        let consensus = Arc::new(ConsensusReactor::new(
            consensus_state,
            validator,
            config.fast_sync,
        ));

        let switch = Arc::new(Switch::new(dialer));
        switch.add_reactor(PEX_REACTOR_NAME, pex.clone());
        switch.add_reactor(MEMPOOL_REACTOR_NAME, mempool.clone());
        switch.add_reactor(BLOCKCHAIN_REACTOR_NAME, blockchain.clone());
        switch.add_reactor(CONSENSUS_REACTOR_NAME, consensus.clone());

        let sink: EventSink = bus.clone();
        wire_event_sink(
            &sink,
            &[&*switch, &*pex, &*mempool, &*blockchain, &*consensus],
        );

        info!(
            height = state.last_block_height,
            chain_id = %state.chain_id,
            known_peers = addr_book.size(),
            "Node created"
        );

        Ok(Self {
            config,
            bus,
            switch,
            addr_book,
            block_store,
            chain_state,
            pex,
            mempool,
            blockchain,
            consensus,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Attach a listener and remember its external address as ours.
    pub fn add_listener(&mut self, listener: Arc<dyn Listener>) -> Result<(), NodeError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }
        self.addr_book.add_our_address(listener.external_address());
        self.switch.add_listener(listener);
        Ok(())
    }

    /// Derive the identity, start address book persistence, then the switch.
    ///
    /// An unparsable RPC port fails here, before any reactor starts. A node
    /// is single use: starting it after [`Self::stop`] is an error.
    pub async fn start(&self) -> Result<(), NodeError> {
        let info = self.node_info()?;
        if self.stopped.load(Ordering::SeqCst) {
            return Err(NodeError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }

        self.addr_book.start(self.config.addrbook_save_interval());
        info!(
            moniker = %info.moniker,
            host = ?info.host,
            p2p_port = ?info.p2p_port,
            rpc_port = ?info.rpc_port,
            "Starting node"
        );
        self.switch.set_node_info(info);
        self.switch.start().await?;
        Ok(())
    }

    /// Stop the switch, then persist the address book. Repeated calls are
    /// no-ops.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Node already stopped");
            return;
        }
        info!("Stopping node");
        self.switch.stop().await;
        self.addr_book.stop();
        info!("Node stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }

    /// Dial the configured seeds.
    ///
    /// A priority seed is dialed alone. Otherwise every seed of the list is
    /// dialed once, in random order. Failures are logged and skipped.
    pub async fn dial_seeds(&self) -> SeedDialReport {
        let seeds: Vec<String> = match self.config.priority_seed() {
            Some(seed) => vec![seed.to_string()],
            None => {
                let mut seeds = self.config.p2p.seed_nodes.clone();
                seeds.shuffle(&mut rand::thread_rng());
                seeds
            }
        };

        let mut report = SeedDialReport::default();
        for raw in seeds {
            report.attempted += 1;
            let addr = match parse_seed(&raw) {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(seed = %raw, error = %e, "Skipping invalid seed address");
                    report.failed.push(raw);
                    continue;
                }
            };

            // the entry must exist before the attempt can be counted
            self.addr_book.add_address(addr.clone(), addr.clone());
            self.addr_book.mark_attempt(&addr);
            match self.switch.dial_peer_with_address(&addr).await {
                Ok(_) => {
                    info!(seed = %addr, "Connected to seed");
                    report.connected.push(addr);
                }
                Err(e) => {
                    warn!(seed = %addr, error = %e, "Error dialing seed");
                    report.failed.push(raw);
                }
            }
        }

        info!(
            attempted = report.attempted,
            connected = report.connected.len(),
            "Seed dialing finished"
        );
        report
    }

    /// Serve JSON-RPC when an RPC address is configured.
    ///
    /// Returns once the socket is bound.
    pub async fn start_rpc(&self) -> Result<Option<RpcServerHandle>, NodeError> {
        let Some(addr) = self.config.rpc_listen_addr()? else {
            debug!("RPC disabled");
            return Ok(None);
        };
        let context = RpcContext {
            block_store: Arc::clone(&self.block_store),
            consensus_state: Arc::clone(self.consensus.consensus_state()),
            consensus: Arc::clone(&self.consensus),
            mempool: Arc::clone(&self.mempool),
            switch: Arc::clone(&self.switch),
            bus: Arc::clone(&self.bus),
        };
        let handle = rpc::serve(&addr, context).await?;
        Ok(Some(handle))
    }

    /// Leave fast sync and let consensus take over.
    pub fn switch_to_consensus(&self) {
        self.blockchain.switch_to_consensus();
        self.consensus.switch_to_consensus();
    }

    // =========================================================================
    // IDENTITY & ACCESSORS
    // =========================================================================

    /// Identity advertised to peers. Host and ports stay empty until a
    /// listener is attached.
    pub fn node_info(&self) -> Result<NodeInfo, NodeError> {
        let rpc_port = self.config.rpc_port()?;
        let primary = self
            .switch
            .listeners()
            .first()
            .map(|l| l.external_address());

        Ok(NodeInfo {
            moniker: self.config.moniker.clone(),
            network: self.config.network.clone(),
            version: NODE_VERSION.to_string(),
            rpc_port: primary.as_ref().and(rpc_port),
            host: primary.as_ref().map(|a| a.host.clone()),
            p2p_port: primary.map(|a| a.port),
        })
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    #[must_use]
    pub fn switch(&self) -> &Arc<Switch> {
        &self.switch
    }

    #[must_use]
    pub fn addr_book(&self) -> &Arc<AddrBook> {
        &self.addr_book
    }

    #[must_use]
    pub fn block_store(&self) -> &Arc<BlockStore> {
        &self.block_store
    }

    #[must_use]
    pub fn pex(&self) -> &Arc<PexReactor> {
        &self.pex
    }

    #[must_use]
    pub fn mempool(&self) -> &Arc<MempoolReactor> {
        &self.mempool
    }

    #[must_use]
    pub fn blockchain(&self) -> &Arc<BlockchainReactor> {
        &self.blockchain
    }

    #[must_use]
    pub fn consensus(&self) -> &Arc<ConsensusReactor> {
        &self.consensus
    }

    #[must_use]
    pub fn chain_state(&self) -> ChainState {
        self.chain_state.read().clone()
    }

    #[must_use]
    pub fn validator_public_key(&self) -> Option<PublicKey> {
        self.consensus.validator_public_key()
    }
}

fn parse_seed(raw: &str) -> Result<NetAddress, shared_types::AddressParseError> {
    let raw = raw.trim();
    raw.strip_prefix("tcp://").unwrap_or(raw).parse()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Run a node from configuration until Ctrl-C or SIGTERM.
pub async fn run_node(config: NodeConfig) -> Result<(), NodeError> {
    config.validate()?;
    let stores = NodeStores::open(&config)?;
    run_node_until(config, stores, shutdown_signal()).await
}

/// Run a node until `shutdown` resolves.
///
/// Configuration is validated before any socket is bound.
pub async fn run_node_until<F>(config: NodeConfig, stores: NodeStores, shutdown: F) -> Result<(), NodeError>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let listen_addr = config.p2p_listen_addr()?;

    let mut node = Node::new(config, stores)?;
    let listener = DefaultListener::bind(&listen_addr).await?;
    node.add_listener(Arc::new(listener))?;
    node.start().await?;

    if node.config().has_seeds() {
        node.dial_seeds().await;
    }

    let rpc = match node.start_rpc().await {
        Ok(rpc) => rpc,
        Err(e) => {
            node.stop().await;
            return Err(e);
        }
    };

    info!("Node is running");
    shutdown.await;
    info!("Shutdown signal received");

    if let Some(rpc) = rpc {
        rpc.shutdown().await;
    }
    node.stop().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use async_trait::async_trait;
    use p2p_switch::{Connection, P2pError, Reactor};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Records every dial; fails for the configured addresses.
    #[derive(Default)]
    struct RecordingDialer {
        dialed: Mutex<Vec<NetAddress>>,
        fail: HashSet<NetAddress>,
    }

    impl RecordingDialer {
        fn failing(addrs: &[&str]) -> Self {
            Self {
                dialed: Mutex::new(Vec::new()),
                fail: addrs.iter().map(|a| a.parse().unwrap()).collect(),
            }
        }

        fn dialed(&self) -> Vec<NetAddress> {
            self.dialed.lock().clone()
        }
    }

    #[async_trait]
    impl Dialer for RecordingDialer {
        async fn dial(&self, addr: &NetAddress) -> Result<Connection, P2pError> {
            self.dialed.lock().push(addr.clone());
            if self.fail.contains(addr) {
                return Err(P2pError::DialFailed {
                    addr: addr.clone(),
                    reason: "connection refused".into(),
                });
            }
            Ok(Connection::detached(addr.clone()))
        }
    }

    fn test_config(root: &std::path::Path) -> NodeConfig {
        NodeConfig {
            root_dir: root.to_path_buf(),
            network: "meridian-test".into(),
            fast_sync: false,
            ..NodeConfig::default()
        }
    }

    fn node_with(config: NodeConfig, dialer: Arc<RecordingDialer>) -> Node {
        Node::with_dialer(config, NodeStores::in_memory(), dialer).unwrap()
    }

    fn addr(s: &str) -> NetAddress {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_construct_registers_reactors_and_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with(test_config(dir.path()), Arc::default());

        assert_eq!(
            node.switch().reactor_names(),
            vec!["PEX", "MEMPOOL", "BLOCKCHAIN", "CONSENSUS"]
        );
        assert!(dir.path().join("genesis.json").exists());
        let state = node.chain_state();
        assert_eq!(state.chain_id, "meridian-test");
        assert_eq!(state.validators.len(), 1);
        assert_eq!(
            Some(state.validators[0].public_key),
            node.validator_public_key()
        );
        assert!(node.bus().is_running());
    }

    #[tokio::test]
    async fn test_observer_without_genesis_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.validator.enabled = false;

        let result = Node::with_dialer(config, NodeStores::in_memory(), Arc::new(RecordingDialer::default()));
        assert!(matches!(result, Err(NodeError::Genesis(_))));
    }

    #[tokio::test]
    async fn test_priority_seed_dialed_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.p2p.seed_node = Some("10.0.0.1:26656".into());
        config.p2p.seed_nodes = vec!["10.0.0.2:26656".into(), "10.0.0.3:26656".into()];

        let dialer = Arc::new(RecordingDialer::default());
        let node = node_with(config, dialer.clone());
        node.start().await.unwrap();

        let report = node.dial_seeds().await;
        assert_eq!(dialer.dialed(), vec![addr("10.0.0.1:26656")]);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.connected, vec![addr("10.0.0.1:26656")]);
        assert!(node.addr_book().get(&addr("10.0.0.1:26656")).is_some());
        node.stop().await;
    }

    #[tokio::test]
    async fn test_seed_list_dialed_once_each_despite_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        let seeds = ["10.0.0.1:26656", "10.0.0.2:26656", "10.0.0.3:26656"];
        config.p2p.seed_nodes = seeds.iter().map(|s| s.to_string()).collect();

        let dialer = Arc::new(RecordingDialer::failing(&["10.0.0.2:26656"]));
        let node = node_with(config, dialer.clone());
        node.start().await.unwrap();

        let report = node.dial_seeds().await;
        let mut dialed = dialer.dialed();
        dialed.sort();
        assert_eq!(dialed, seeds.iter().map(|s| addr(s)).collect::<Vec<_>>());
        assert_eq!(report.attempted, 3);
        assert_eq!(report.connected.len(), 2);
        assert_eq!(report.failed, vec!["10.0.0.2:26656".to_string()]);
        assert_eq!(node.switch().num_peers(), 2);

        // the failed seed keeps its attempt; connected seeds are reset by PEX
        let failed = node.addr_book().get(&addr("10.0.0.2:26656")).unwrap();
        assert_eq!(failed.attempts, 1);
        assert!(failed.last_attempt.is_some());
        assert!(failed.last_success.is_none());
        let good = node.addr_book().get(&addr("10.0.0.1:26656")).unwrap();
        assert_eq!(good.attempts, 0);
        assert!(good.last_attempt.is_some());
        assert!(good.last_success.is_some());
        node.stop().await;
    }

    #[tokio::test]
    async fn test_unparsable_seed_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.p2p.seed_nodes = vec!["not-an-address".into(), "10.0.0.9:26656".into()];

        let dialer = Arc::new(RecordingDialer::default());
        let node = node_with(config, dialer.clone());
        let report = node.dial_seeds().await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.connected, vec![addr("10.0.0.9:26656")]);
        assert_eq!(report.failed, vec!["not-an-address".to_string()]);
        assert_eq!(dialer.dialed().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_rpc_port_fails_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.rpc.listen_addr = Some("127.0.0.1:http".into());

        let node = node_with(config, Arc::default());
        let err = node.start().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Config(ConfigError::InvalidRpcPort { .. })
        ));
        assert!(!node.switch().is_running());
        assert!(!node.addr_book().is_running());
        assert!(matches!(
            node.start_rpc().await,
            Err(NodeError::Config(ConfigError::InvalidRpcPort { .. }))
        ));
    }

    #[tokio::test]
    async fn test_node_info_follows_listener() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.rpc.listen_addr = Some("127.0.0.1:26657".into());

        let mut node = node_with(config, Arc::default());
        let info = node.node_info().unwrap();
        assert!(!info.is_listening());
        assert_eq!(info.rpc_port, None);

        let listener = DefaultListener::bind(&addr("127.0.0.1:0")).await.unwrap();
        let external = listener.external_address();
        node.add_listener(Arc::new(listener)).unwrap();

        let info = node.node_info().unwrap();
        assert_eq!(info.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(info.p2p_port, Some(external.port));
        assert_eq!(info.rpc_port, Some(26657));
        assert_eq!(info.version, NODE_VERSION);
        assert!(node.addr_book().is_our_address(&external));
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = node_with(test_config(dir.path()), Arc::default());
        let listener = DefaultListener::bind(&addr("127.0.0.1:0")).await.unwrap();
        node.add_listener(Arc::new(listener)).unwrap();

        node.start().await.unwrap();
        assert!(node.is_running());
        assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
        assert!(node.consensus().is_running());
        assert_eq!(node.switch().node_info().unwrap().moniker, "anonymous");

        node.stop().await;
        node.stop().await;
        assert!(!node.is_running());
        assert!(!node.consensus().is_running());
        assert!(!node.addr_book().is_running());
    }

    #[tokio::test]
    async fn test_start_after_stop_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with(test_config(dir.path()), Arc::default());
        node.start().await.unwrap();
        node.stop().await;

        assert!(matches!(node.start().await, Err(NodeError::Stopped)));
        assert!(!node.is_running());
        assert!(!node.switch().is_running());

        // stopping an unstarted node also retires it
        let dir = tempfile::tempdir().unwrap();
        let node = node_with(test_config(dir.path()), Arc::default());
        node.stop().await;
        assert!(matches!(node.start().await, Err(NodeError::Stopped)));
    }

    #[tokio::test]
    async fn test_listener_after_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = node_with(test_config(dir.path()), Arc::default());
        node.start().await.unwrap();

        let listener = DefaultListener::bind(&addr("127.0.0.1:0")).await.unwrap();
        assert!(matches!(
            node.add_listener(Arc::new(listener)),
            Err(NodeError::AlreadyStarted)
        ));
        node.stop().await;
    }

    #[tokio::test]
    async fn test_run_node_rejects_bad_rpc_port_before_bind() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.rpc.listen_addr = Some("127.0.0.1:99999".into());

        let result = run_node_until(config, NodeStores::in_memory(), async {}).await;
        assert!(matches!(
            result,
            Err(NodeError::Config(ConfigError::InvalidRpcPort { .. }))
        ));
        // nothing was constructed, so no genesis was written
        assert!(!dir.path().join("genesis.json").exists());
    }

    #[tokio::test]
    async fn test_run_node_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.p2p.listen_addr = "127.0.0.1:0".into();
        config.rpc.listen_addr = Some("127.0.0.1:0".into());

        run_node_until(config, NodeStores::in_memory(), async {})
            .await
            .unwrap();
        assert!(dir.path().join("genesis.json").exists());
    }
}
