//! # Chain State
//!
//! Consensus state snapshot plus the genesis description it starts from.

use std::path::Path;

use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash, Validator};
use tracing::info;

use super::kv::SharedKvStore;
use super::StorageError;

const STATE_KEY: &[u8] = b"chainState";

/// Genesis description, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    /// Unix seconds.
    pub genesis_time: u64,
    pub validators: Vec<Validator>,
    #[serde(default)]
    pub app_hash: Hash,
}

impl GenesisDoc {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        info!(path = %path.display(), chain_id = %self.chain_id, "Genesis written");
        Ok(())
    }
}

/// Snapshot of consensus state after the last committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: String,
    pub genesis_time: u64,
    pub last_block_height: u64,
    pub last_block_hash: Hash,
    pub last_block_time: u64,
    pub validators: Vec<Validator>,
    pub app_hash: Hash,
}

impl ChainState {
    #[must_use]
    pub fn from_genesis(genesis: &GenesisDoc) -> Self {
        Self {
            chain_id: genesis.chain_id.clone(),
            genesis_time: genesis.genesis_time,
            last_block_height: 0,
            last_block_hash: [0; 32],
            last_block_time: genesis.genesis_time,
            validators: genesis.validators.clone(),
            app_hash: genesis.app_hash,
        }
    }

    /// Height the next block must have.
    #[must_use]
    pub fn next_height(&self) -> u64 {
        self.last_block_height + 1
    }

    /// Move past a committed block.
    pub fn advance(&mut self, block: &Block) {
        self.last_block_height = block.height();
        self.last_block_hash = block.hash();
        self.last_block_time = block.header.timestamp;
    }

    /// Sum of validator voting power.
    #[must_use]
    pub fn total_voting_power(&self) -> u64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }
}

/// Persistence for [`ChainState`].
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<ChainState>, StorageError>;
    fn save(&self, state: &ChainState) -> Result<(), StorageError>;
}

/// [`StateStore`] over a key-value backend.
pub struct KvStateStore {
    db: SharedKvStore,
}

impl KvStateStore {
    #[must_use]
    pub fn new(db: SharedKvStore) -> Self {
        Self { db }
    }
}

impl StateStore for KvStateStore {
    fn load(&self) -> Result<Option<ChainState>, StorageError> {
        match self.db.read().get(STATE_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &ChainState) -> Result<(), StorageError> {
        let bytes = bincode::serialize(state)?;
        self.db.write().put(STATE_KEY, &bytes)?;
        Ok(())
    }
}

/// Load the persisted state, or build it from the genesis file and persist
/// it.
pub fn load_or_genesis(store: &dyn StateStore, genesis_path: &Path) -> Result<ChainState, StorageError> {
    if let Some(state) = store.load()? {
        info!(
            height = state.last_block_height,
            chain_id = %state.chain_id,
            "Loaded persisted chain state"
        );
        return Ok(state);
    }
    let genesis = GenesisDoc::load(genesis_path)?;
    let state = ChainState::from_genesis(&genesis);
    store.save(&state)?;
    info!(chain_id = %state.chain_id, "Chain state initialized from genesis");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKVStore;
    use shared_types::BlockHeader;

    fn genesis() -> GenesisDoc {
        GenesisDoc {
            chain_id: "meridian-test".into(),
            genesis_time: 1_700_000_000,
            validators: vec![Validator {
                public_key: [1; 32],
                voting_power: 10,
            }],
            app_hash: [0; 32],
        }
    }

    #[test]
    fn test_advance() {
        let mut state = ChainState::from_genesis(&genesis());
        assert_eq!(state.next_height(), 1);

        let block = Block::new(
            BlockHeader {
                height: 1,
                timestamp: 1_700_000_005,
                ..BlockHeader::default()
            },
            vec![],
        );
        state.advance(&block);
        assert_eq!(state.last_block_height, 1);
        assert_eq!(state.last_block_hash, block.hash());
        assert_eq!(state.last_block_time, 1_700_000_005);
        assert_eq!(state.total_voting_power(), 10);
    }

    #[test]
    fn test_load_or_genesis_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        genesis().save(&path).unwrap();

        let store = KvStateStore::new(InMemoryKVStore::shared());
        let state = load_or_genesis(&store, &path).unwrap();
        assert_eq!(state.chain_id, "meridian-test");

        // the genesis file is not consulted once state exists
        std::fs::remove_file(&path).unwrap();
        assert_eq!(load_or_genesis(&store, &path).unwrap(), state);
    }

    #[test]
    fn test_missing_genesis_is_an_error() {
        let store = KvStateStore::new(InMemoryKVStore::shared());
        let result = load_or_genesis(&store, Path::new("/nowhere/genesis.json"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
