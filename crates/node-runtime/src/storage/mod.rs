//! # Storage
//!
//! Block store, chain state, signing credential and the key-value port they
//! sit on. [`NodeStores`] bundles the handles a node is constructed from.

pub mod block_store;
pub mod credential;
pub mod kv;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;
pub mod state;

use std::sync::Arc;

use p2p_switch::{AddrBookStore, FileAddrBookStore, MemoryAddrBookStore};
use thiserror::Error;
use tracing::info;

use crate::config::NodeConfig;

pub use block_store::BlockStore;
pub use credential::{
    load_or_generate, CredentialStore, FileCredentialStore, MemoryCredentialStore, PrivValidator,
    SignError,
};
pub use kv::{BatchOperation, InMemoryKVStore, KVStoreError, KeyValueStore, SharedKvStore};
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
pub use state::{load_or_genesis, ChainState, GenesisDoc, KvStateStore, StateStore};

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Kv(#[from] KVStoreError),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block height {got} does not follow stored height (expected {expected})")]
    NonContiguousHeight { expected: u64, got: u64 },

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Persistence handles a node is built from.
#[derive(Clone)]
pub struct NodeStores {
    pub block_db: SharedKvStore,
    pub state_db: SharedKvStore,
    pub credentials: Arc<dyn CredentialStore>,
    pub addr_book: Arc<dyn AddrBookStore>,
}

impl NodeStores {
    /// Everything in memory. Nothing survives the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            block_db: InMemoryKVStore::shared(),
            state_db: InMemoryKVStore::shared(),
            credentials: Arc::new(MemoryCredentialStore::new()),
            addr_book: Arc::new(MemoryAddrBookStore::new()),
        }
    }

    /// File-backed credential and address book under `root_dir`. Block and
    /// state databases use RocksDB when the `rocksdb` feature is enabled and
    /// memory otherwise.
    pub fn open(config: &NodeConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.root_dir)?;
        let (block_db, state_db) = open_databases(config)?;
        info!(root = %config.root_dir.display(), "Opened node stores");
        Ok(Self {
            block_db,
            state_db,
            credentials: Arc::new(FileCredentialStore::new(config.priv_validator_path())),
            addr_book: Arc::new(FileAddrBookStore::new(config.addrbook_path())),
        })
    }
}

#[cfg(feature = "rocksdb")]
fn open_databases(config: &NodeConfig) -> Result<(SharedKvStore, SharedKvStore), StorageError> {
    use parking_lot::RwLock;

    let data = config.root_dir.join("data");
    let blocks = RocksDbStore::open(&RocksDbConfig::new(data.join("blockstore.db")))?;
    let state = RocksDbStore::open(&RocksDbConfig::new(data.join("state.db")))?;
    Ok((Arc::new(RwLock::new(blocks)), Arc::new(RwLock::new(state))))
}

#[cfg(not(feature = "rocksdb"))]
fn open_databases(_config: &NodeConfig) -> Result<(SharedKvStore, SharedKvStore), StorageError> {
    tracing::warn!("Built without the rocksdb feature; chain data is kept in memory");
    Ok((InMemoryKVStore::shared(), InMemoryKVStore::shared()))
}
