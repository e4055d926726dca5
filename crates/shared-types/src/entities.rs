//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `Transaction`
//! - **Consensus**: `Validator`
//! - **Execution output**: `LogRecord`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Hash a serializable value with SHA-256 over its bincode encoding.
fn hash_encoded<T: Serialize>(value: &T) -> Hash {
    // bincode cannot fail for plain data structs without maps keyed by non-strings
    let bytes = bincode::serialize(value).unwrap_or_default();
    Sha256::digest(&bytes).into()
}

/// Render the first bytes of a hash for log output.
#[must_use]
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Chain this block belongs to.
    pub chain_id: String,
    /// Block height in the chain.
    pub height: u64,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Unix timestamp (seconds) when the block was proposed.
    pub timestamp: u64,
    /// The validator who proposed this block.
    pub proposer: PublicKey,
    /// Hash over the ordered transaction hashes.
    pub tx_root: Hash,
}

/// A block: header plus ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions included in this block.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block, deriving `tx_root` from the transactions.
    #[must_use]
    pub fn new(mut header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        header.tx_root = Self::compute_tx_root(&transactions);
        Self {
            header,
            transactions,
        }
    }

    /// The block hash (SHA-256 of the encoded header).
    #[must_use]
    pub fn hash(&self) -> Hash {
        hash_encoded(&self.header)
    }

    /// Block height shortcut.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.header.height
    }

    fn compute_tx_root(transactions: &[Transaction]) -> Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }
}

/// A raw transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender address.
    pub from: Address,
    /// Recipient address (`None` for contract creation).
    pub to: Option<Address>,
    /// Amount in base units.
    pub value: u64,
    /// Sender nonce.
    pub nonce: u64,
    /// Call data.
    pub data: Vec<u8>,
}

impl Transaction {
    /// Compute the transaction hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        hash_encoded(self)
    }
}

// =============================================================================
// CLUSTER B: CONSENSUS
// =============================================================================

/// A validator in the consensus protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// The validator's public key (identity).
    pub public_key: PublicKey,
    /// Voting power.
    pub voting_power: u64,
}

// =============================================================================
// CLUSTER C: EXECUTION OUTPUT
// =============================================================================

/// A structured log record emitted while executing a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Address of the emitting account.
    pub address: Address,
    /// Indexed topics, position-significant.
    pub topics: Vec<Hash>,
    /// Opaque payload.
    pub data: Vec<u8>,
    /// Height of the block that produced this record.
    pub block_number: u64,
    /// Hash of the producing transaction.
    pub tx_hash: Hash,
    /// Position of the record within its block.
    pub log_index: u32,
}
