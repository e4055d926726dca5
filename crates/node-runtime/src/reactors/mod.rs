//! # Reactors
//!
//! Node subsystems registered with the switch. Peer exchange lives in
//! `p2p-switch`; the chain-facing reactors live here.

pub mod blockchain;
pub mod consensus;
pub mod mempool;

pub use blockchain::{BlockchainReactor, BLOCKCHAIN_REACTOR_NAME};
pub use consensus::{
    ConsensusDump, ConsensusError, ConsensusReactor, ConsensusState, CONSENSUS_REACTOR_NAME,
    MAX_BLOCK_TXS,
};
pub use mempool::{Mempool, MempoolError, MempoolReactor, DEFAULT_MEMPOOL_CAPACITY, MEMPOOL_REACTOR_NAME};
