//! Handles the RPC routes read from, passed in explicitly at startup.

use std::sync::Arc;

use p2p_switch::Switch;
use shared_bus::InMemoryEventBus;

use crate::reactors::{ConsensusReactor, ConsensusState, MempoolReactor};
use crate::storage::BlockStore;

#[derive(Clone)]
pub struct RpcContext {
    pub block_store: Arc<BlockStore>,
    pub consensus_state: Arc<ConsensusState>,
    pub consensus: Arc<ConsensusReactor>,
    pub mempool: Arc<MempoolReactor>,
    pub switch: Arc<Switch>,
    pub bus: Arc<InMemoryEventBus>,
}
