//! # Blockchain Reactor
//!
//! Tracks whether the node is fast-syncing blocks from peers or has caught up
//! and handed over to consensus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use p2p_switch::{BaseReactor, P2pError, Reactor};
use parking_lot::RwLock;
use shared_bus::{ChainEvent, EventSink, Eventable};
use tracing::info;

use crate::storage::{BlockStore, ChainState};

pub const BLOCKCHAIN_REACTOR_NAME: &str = "BLOCKCHAIN";

pub struct BlockchainReactor {
    base: BaseReactor,
    state: Arc<RwLock<ChainState>>,
    block_store: Arc<BlockStore>,
    fast_sync: AtomicBool,
}

impl BlockchainReactor {
    #[must_use]
    pub fn new(state: Arc<RwLock<ChainState>>, block_store: Arc<BlockStore>, fast_sync: bool) -> Self {
        Self {
            base: BaseReactor::new(BLOCKCHAIN_REACTOR_NAME),
            state,
            block_store,
            fast_sync: AtomicBool::new(fast_sync),
        }
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.fast_sync.load(Ordering::SeqCst)
    }

    /// Height of the last committed block.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.state.read().last_block_height
    }

    #[must_use]
    pub fn block_store(&self) -> &Arc<BlockStore> {
        &self.block_store
    }

    /// Leave fast sync. Returns `false` if sync had already ended.
    pub fn switch_to_consensus(&self) -> bool {
        if !self.fast_sync.swap(false, Ordering::SeqCst) {
            return false;
        }
        let height = self.height();
        info!(height, "Fast sync complete, switching to consensus");
        self.base.fire(ChainEvent::SyncStatusChanged {
            syncing: false,
            height,
        });
        true
    }
}

impl Eventable for BlockchainReactor {
    fn set_event_sink(&self, sink: EventSink) {
        self.base.set_event_sink(sink);
    }
}

#[async_trait]
impl Reactor for BlockchainReactor {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self) -> Result<(), P2pError> {
        if self.base.start() {
            let syncing = self.is_syncing();
            let height = self.height();
            info!(syncing, height, "Block sync status");
            self.base.fire(ChainEvent::SyncStatusChanged { syncing, height });
        }
        Ok(())
    }

    async fn stop(&self) {
        self.base.stop();
    }

    fn is_running(&self) -> bool {
        self.base.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GenesisDoc, InMemoryKVStore};
    use shared_bus::{EventFilter, EventKind, InMemoryEventBus};

    fn reactor(fast_sync: bool) -> BlockchainReactor {
        let genesis = GenesisDoc {
            chain_id: "test".into(),
            genesis_time: 0,
            validators: vec![],
            app_hash: [0; 32],
        };
        BlockchainReactor::new(
            Arc::new(RwLock::new(ChainState::from_genesis(&genesis))),
            Arc::new(BlockStore::new(InMemoryKVStore::shared())),
            fast_sync,
        )
    }

    #[tokio::test]
    async fn test_start_reports_sync_status() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.start();
        let mut sub = bus.subscribe(EventFilter::kinds(vec![EventKind::SyncStatusChanged]));

        let reactor = reactor(true);
        reactor.set_event_sink(bus.clone());
        reactor.start().await.unwrap();
        reactor.start().await.unwrap();

        assert!(matches!(
            sub.try_recv().unwrap(),
            Some(ChainEvent::SyncStatusChanged {
                syncing: true,
                height: 0
            })
        ));
        assert!(sub.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_switch_to_consensus_once() {
        let reactor = reactor(true);
        assert!(reactor.is_syncing());
        assert!(reactor.switch_to_consensus());
        assert!(!reactor.switch_to_consensus());
        assert!(!reactor.is_syncing());
    }
}
