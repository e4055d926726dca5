//! # Consensus
//!
//! [`ConsensusState`] validates proposals and commits blocks: it persists the
//! block, advances [`ChainState`], prunes the mempool and publishes the
//! block-level events the filter dispatcher consumes.
//!
//! ## Event order per committed block
//!
//! 1. `NewBlock(block)`
//! 2. `Logs(records)` when the block produced any

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use p2p_switch::{BaseReactor, P2pError, Reactor};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared_bus::{ChainEvent, EventSink, EventSinkSlot, Eventable};
use shared_types::{short_hex, Block, BlockHeader, LogRecord, PublicKey, Validator};
use thiserror::Error;
use tracing::{debug, info};

use super::mempool::MempoolReactor;
use crate::storage::{BlockStore, ChainState, PrivValidator, SignError, StateStore, StorageError};

pub const CONSENSUS_REACTOR_NAME: &str = "CONSENSUS";

/// Transactions taken from the mempool for one proposal.
pub const MAX_BLOCK_TXS: usize = 1_000;

/// Signing step for a block commit.
const STEP_COMMIT: u8 = 3;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("wrong chain: expected {expected}, got {got}")]
    WrongChain { expected: String, got: String },

    #[error("invalid height: expected {expected}, got {got}")]
    InvalidHeight { expected: u64, got: u64 },

    #[error("parent hash mismatch at height {height}")]
    InvalidParent { height: u64 },

    #[error("node is not a validator")]
    NotValidator,

    #[error("block sync in progress")]
    Syncing,

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Read-only view served by `dump_consensus_state`.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusDump {
    pub chain_id: String,
    pub height: u64,
    pub last_block_hash: String,
    pub last_block_time: u64,
    pub validators: usize,
    pub total_voting_power: u64,
}

pub struct ConsensusState {
    state: Arc<RwLock<ChainState>>,
    state_store: Arc<dyn StateStore>,
    block_store: Arc<BlockStore>,
    mempool: Arc<MempoolReactor>,
    events: EventSinkSlot,
}

impl ConsensusState {
    #[must_use]
    pub fn new(
        state: Arc<RwLock<ChainState>>,
        state_store: Arc<dyn StateStore>,
        block_store: Arc<BlockStore>,
        mempool: Arc<MempoolReactor>,
    ) -> Self {
        Self {
            state,
            state_store,
            block_store,
            mempool,
            events: EventSinkSlot::new(),
        }
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.state.read().last_block_height
    }

    #[must_use]
    pub fn chain_state(&self) -> ChainState {
        self.state.read().clone()
    }

    #[must_use]
    pub fn validators(&self) -> Vec<Validator> {
        self.state.read().validators.clone()
    }

    #[must_use]
    pub fn block_store(&self) -> &Arc<BlockStore> {
        &self.block_store
    }

    /// Next block on top of the current state, filled from the mempool.
    #[must_use]
    pub fn create_proposal_block(&self, proposer: PublicKey, max_txs: usize) -> Block {
        let (chain_id, height, parent_hash, last_time) = {
            let state = self.state.read();
            (
                state.chain_id.clone(),
                state.next_height(),
                state.last_block_hash,
                state.last_block_time,
            )
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let header = BlockHeader {
            chain_id,
            height,
            parent_hash,
            // block time never goes backwards
            timestamp: now.max(last_time),
            proposer,
            tx_root: [0; 32],
        };
        Block::new(header, self.mempool.reap(max_txs))
    }

    fn validate(&self, block: &Block) -> Result<(), ConsensusError> {
        let state = self.state.read();
        if block.header.chain_id != state.chain_id {
            return Err(ConsensusError::WrongChain {
                expected: state.chain_id.clone(),
                got: block.header.chain_id.clone(),
            });
        }
        if block.height() != state.next_height() {
            return Err(ConsensusError::InvalidHeight {
                expected: state.next_height(),
                got: block.height(),
            });
        }
        if block.header.parent_hash != state.last_block_hash {
            return Err(ConsensusError::InvalidParent {
                height: block.height(),
            });
        }
        Ok(())
    }

    /// Announce a proposed, not yet final, block.
    pub fn propose(&self, block: Block) -> Result<Arc<Block>, ConsensusError> {
        self.validate(&block)?;
        let block = Arc::new(block);
        debug!(height = block.height(), hash = %short_hex(&block.hash()), "Block proposed");
        self.events.fire(ChainEvent::PendingBlock(Arc::clone(&block)));
        Ok(block)
    }

    /// Finalize `block` and the logs its execution produced.
    pub fn commit(&self, block: Block, logs: Vec<LogRecord>) -> Result<Arc<Block>, ConsensusError> {
        self.validate(&block)?;
        self.block_store.save_block(&block)?;

        let snapshot = {
            let mut state = self.state.write();
            state.advance(&block);
            state.clone()
        };
        self.state_store.save(&snapshot)?;
        self.mempool.update(&block);

        let block = Arc::new(block);
        info!(
            height = block.height(),
            hash = %short_hex(&block.hash()),
            txs = block.transactions.len(),
            logs = logs.len(),
            "Block committed"
        );
        self.events.fire(ChainEvent::NewBlock(Arc::clone(&block)));
        if !logs.is_empty() {
            self.events.fire(ChainEvent::Logs(Arc::new(logs)));
        }
        Ok(block)
    }

    #[must_use]
    pub fn dump(&self) -> ConsensusDump {
        let state = self.state.read();
        ConsensusDump {
            chain_id: state.chain_id.clone(),
            height: state.last_block_height,
            last_block_hash: hex::encode(state.last_block_hash),
            last_block_time: state.last_block_time,
            validators: state.validators.len(),
            total_voting_power: state.total_voting_power(),
        }
    }
}

impl Eventable for ConsensusState {
    fn set_event_sink(&self, sink: EventSink) {
        self.events.set(sink);
    }
}

pub struct ConsensusReactor {
    base: BaseReactor,
    state: Arc<ConsensusState>,
    validator: Option<Arc<Mutex<PrivValidator>>>,
    syncing: AtomicBool,
}

impl ConsensusReactor {
    #[must_use]
    pub fn new(state: Arc<ConsensusState>, validator: Option<PrivValidator>, syncing: bool) -> Self {
        Self {
            base: BaseReactor::new(CONSENSUS_REACTOR_NAME),
            state,
            validator: validator.map(|v| Arc::new(Mutex::new(v))),
            syncing: AtomicBool::new(syncing),
        }
    }

    #[must_use]
    pub fn consensus_state(&self) -> &Arc<ConsensusState> {
        &self.state
    }

    #[must_use]
    pub fn is_validator(&self) -> bool {
        self.validator.is_some()
    }

    #[must_use]
    pub fn validator_public_key(&self) -> Option<PublicKey> {
        self.validator.as_ref().map(|v| v.lock().public_key())
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Start participating in consensus after block sync.
    pub fn switch_to_consensus(&self) {
        if self.syncing.swap(false, Ordering::SeqCst) {
            info!(height = self.state.height(), "Consensus enabled");
        }
    }

    /// Propose, sign and commit the next block as the local validator.
    ///
    /// Drives a single-validator chain; `logs` stands in for execution output.
    pub fn commit_next_block(&self, logs: Vec<LogRecord>) -> Result<Arc<Block>, ConsensusError> {
        if self.is_syncing() {
            return Err(ConsensusError::Syncing);
        }
        let validator = self.validator.as_ref().ok_or(ConsensusError::NotValidator)?;

        let proposer = validator.lock().public_key();
        let block = self.state.create_proposal_block(proposer, MAX_BLOCK_TXS);
        let hash = block.hash();
        validator.lock().sign(block.height(), 0, STEP_COMMIT, &hash)?;

        let proposed = self.state.propose(block)?;
        self.state.commit(Block::clone(&proposed), logs)
    }
}

impl Eventable for ConsensusReactor {
    fn set_event_sink(&self, sink: EventSink) {
        self.base.set_event_sink(Arc::clone(&sink));
        self.state.set_event_sink(sink);
    }
}

#[async_trait]
impl Reactor for ConsensusReactor {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self) -> Result<(), P2pError> {
        if self.base.start() {
            info!(
                height = self.state.height(),
                validator = self.is_validator(),
                syncing = self.is_syncing(),
                "Consensus reactor running"
            );
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
