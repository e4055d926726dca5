//! # Mempool Reactor
//!
//! Pending transactions waiting for a block. Admission dedups by hash and
//! publishes [`ChainEvent::TxAdded`].

use std::collections::HashSet;

use async_trait::async_trait;
use p2p_switch::{BaseReactor, P2pError, Reactor};
use parking_lot::Mutex;
use shared_bus::{ChainEvent, EventSink, Eventable};
use shared_types::{short_hex, Block, Hash, Transaction};
use thiserror::Error;
use tracing::{debug, trace};

use crate::storage::ChainState;

pub const MEMPOOL_REACTOR_NAME: &str = "MEMPOOL";

/// Maximum transactions held at once.
pub const DEFAULT_MEMPOOL_CAPACITY: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("transaction {} already in mempool", hex::encode(.0))]
    Duplicate(Hash),

    #[error("mempool is full (capacity {capacity})")]
    Full { capacity: usize },
}

/// Ordered pool of pending transactions.
pub struct Mempool {
    /// Height of the last block the pool was updated against.
    height: u64,
    capacity: usize,
    txs: Vec<(Hash, Transaction)>,
    hashes: HashSet<Hash>,
}

impl Mempool {
    #[must_use]
    pub fn new(state: &ChainState, capacity: usize) -> Self {
        Self {
            height: state.last_block_height,
            capacity,
            txs: Vec::new(),
            hashes: HashSet::new(),
        }
    }

    /// Admit `tx`, returning its hash.
    pub fn check_tx(&mut self, tx: Transaction) -> Result<Hash, MempoolError> {
        let hash = tx.hash();
        if self.hashes.contains(&hash) {
            return Err(MempoolError::Duplicate(hash));
        }
        if self.txs.len() >= self.capacity {
            return Err(MempoolError::Full {
                capacity: self.capacity,
            });
        }
        self.hashes.insert(hash);
        self.txs.push((hash, tx));
        Ok(hash)
    }

    /// Up to `max` transactions in admission order, left in the pool.
    #[must_use]
    pub fn reap(&self, max: usize) -> Vec<Transaction> {
        self.txs.iter().take(max).map(|(_, tx)| tx.clone()).collect()
    }

    /// Drop the transactions included in a committed block.
    pub fn update(&mut self, block: &Block) -> usize {
        let included: HashSet<Hash> = block.transactions.iter().map(Transaction::hash).collect();
        let before = self.txs.len();
        self.txs.retain(|(hash, _)| !included.contains(hash));
        self.hashes.retain(|hash| !included.contains(hash));
        self.height = block.height();
        before - self.txs.len()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.txs.len()
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.height
    }
}

pub struct MempoolReactor {
    base: BaseReactor,
    mempool: Mutex<Mempool>,
}

impl MempoolReactor {
    #[must_use]
    pub fn new(mempool: Mempool) -> Self {
        Self {
            base: BaseReactor::new(MEMPOOL_REACTOR_NAME),
            mempool: Mutex::new(mempool),
        }
    }

    /// Admit a transaction and announce it on the bus.
    pub fn check_tx(&self, tx: Transaction) -> Result<Hash, MempoolError> {
        let hash = self.mempool.lock().check_tx(tx)?;
        trace!(tx = %short_hex(&hash), "Transaction admitted");
        self.base.fire(ChainEvent::TxAdded { tx_hash: hash });
        Ok(hash)
    }

    #[must_use]
    pub fn reap(&self, max: usize) -> Vec<Transaction> {
        self.mempool.lock().reap(max)
    }

    pub fn update(&self, block: &Block) {
        let removed = self.mempool.lock().update(block);
        debug!(height = block.height(), removed, "Mempool updated");
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.mempool.lock().size()
    }
}

impl Eventable for MempoolReactor {
    fn set_event_sink(&self, sink: EventSink) {
        self.base.set_event_sink(sink);
    }
}

#[async_trait]
impl Reactor for MempoolReactor {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self) -> Result<(), P2pError> {
        self.base.start();
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
pub(crate) mod tests {
    use super::*;
    use shared_types::BlockHeader;

    pub(crate) fn tx(nonce: u64) -> Transaction {
        Transaction {
            from: [1; 20],
            to: Some([2; 20]),
            value: 5,
            nonce,
            data: vec![],
        }
    }

    fn pool(capacity: usize) -> Mempool {
        let state = ChainState {
            chain_id: "test".into(),
            genesis_time: 0,
            last_block_height: 0,
            last_block_hash: [0; 32],
            last_block_time: 0,
            validators: vec![],
            app_hash: [0; 32],
        };
        Mempool::new(&state, capacity)
    }

    #[test]
    fn test_check_tx_rejects_duplicates() {
        let mut pool = pool(10);
        let hash = pool.check_tx(tx(1)).unwrap();
        assert_eq!(pool.check_tx(tx(1)), Err(MempoolError::Duplicate(hash)));
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_check_tx_rejects_when_full() {
        let mut pool = pool(2);
        pool.check_tx(tx(1)).unwrap();
        pool.check_tx(tx(2)).unwrap();
        assert_eq!(
            pool.check_tx(tx(3)),
            Err(MempoolError::Full { capacity: 2 })
        );
    }

    #[test]
    fn test_update_removes_included() {
        let mut pool = pool(10);
        for nonce in 0..4 {
            pool.check_tx(tx(nonce)).unwrap();
        }
        let block = Block::new(
            BlockHeader {
                height: 1,
                ..BlockHeader::default()
            },
            vec![tx(0), tx(2)],
        );
        assert_eq!(pool.update(&block), 2);
        assert_eq!(pool.reap(10), vec![tx(1), tx(3)]);
        assert_eq!(pool.height(), 1);

        // an included tx may be admitted again later
        assert!(pool.check_tx(tx(0)).is_ok());
    }

    #[test]
    fn test_reactor_publishes_tx_added() {
        use shared_bus::{EventFilter, EventKind, InMemoryEventBus};
        use std::sync::Arc;

        let bus = Arc::new(InMemoryEventBus::new());
        bus.start();
        let mut sub = bus.subscribe(EventFilter::kinds(vec![EventKind::TxAdded]));
        let reactor = MempoolReactor::new(pool(10));
        reactor.set_event_sink(bus.clone());

        let hash = reactor.check_tx(tx(7)).unwrap();
        match sub.try_recv().unwrap() {
            Some(ChainEvent::TxAdded { tx_hash }) => assert_eq!(tx_hash, hash),
            other => panic!("unexpected {other:?}"),
        }
    }
}
