//! # Block Store
//!
//! Append-only block storage over a [`SharedKvStore`].
//!
//! ## Key layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `H:` + height (big endian) | bincode block |
//! | `P:` + block hash | height (big endian) |
//! | `meta:height` | latest height (big endian) |
//!
//! Heights are contiguous starting at 1.

use shared_types::{Block, Hash};
use tracing::debug;

use super::kv::{BatchOperation, SharedKvStore};
use super::StorageError;

const HEIGHT_PREFIX: &[u8] = b"H:";
const HASH_PREFIX: &[u8] = b"P:";
const META_HEIGHT: &[u8] = b"meta:height";

fn height_key(height: u64) -> Vec<u8> {
    let mut key = HEIGHT_PREFIX.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

fn hash_key(hash: &Hash) -> Vec<u8> {
    let mut key = HASH_PREFIX.to_vec();
    key.extend_from_slice(hash);
    key
}

fn decode_height(bytes: &[u8]) -> Result<u64, StorageError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corrupt(format!("height record of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Persistent chain of committed blocks.
pub struct BlockStore {
    db: SharedKvStore,
}

impl BlockStore {
    #[must_use]
    pub fn new(db: SharedKvStore) -> Self {
        Self { db }
    }

    /// Height of the latest stored block, 0 when empty.
    pub fn height(&self) -> Result<u64, StorageError> {
        match self.db.read().get(META_HEIGHT)? {
            Some(bytes) => decode_height(&bytes),
            None => Ok(0),
        }
    }

    /// Append `block`. Its height must be exactly one above [`Self::height`].
    pub fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        let mut db = self.db.write();
        let current = match db.get(META_HEIGHT)? {
            Some(bytes) => decode_height(&bytes)?,
            None => 0,
        };
        let height = block.height();
        if height != current + 1 {
            return Err(StorageError::NonContiguousHeight {
                expected: current + 1,
                got: height,
            });
        }

        let encoded = bincode::serialize(block)?;
        db.atomic_batch_write(vec![
            BatchOperation::put(height_key(height), encoded),
            BatchOperation::put(hash_key(&block.hash()), height.to_be_bytes().to_vec()),
            BatchOperation::put(META_HEIGHT.to_vec(), height.to_be_bytes().to_vec()),
        ])?;
        debug!(height, "Block saved");
        Ok(())
    }

    pub fn load_block(&self, height: u64) -> Result<Option<Block>, StorageError> {
        match self.db.read().get(&height_key(height))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        let height = match self.db.read().get(&hash_key(hash))? {
            Some(bytes) => decode_height(&bytes)?,
            None => return Ok(None),
        };
        self.load_block(height)
    }

    /// Blocks in `[min, max]`, clamped to what is stored, newest first.
    pub fn load_range(&self, min: u64, max: u64) -> Result<Vec<Block>, StorageError> {
        let top = max.min(self.height()?);
        let mut blocks = Vec::new();
        for height in (min.max(1)..=top).rev() {
            if let Some(block) = self.load_block(height)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKVStore;
    use shared_types::BlockHeader;

    fn block(height: u64, parent: Hash) -> Block {
        Block::new(
            BlockHeader {
                chain_id: "test".into(),
                height,
                parent_hash: parent,
                ..BlockHeader::default()
            },
            vec![],
        )
    }

    #[test]
    fn test_save_and_load() {
        let store = BlockStore::new(InMemoryKVStore::shared());
        assert_eq!(store.height().unwrap(), 0);

        let b1 = block(1, [0; 32]);
        let b2 = block(2, b1.hash());
        store.save_block(&b1).unwrap();
        store.save_block(&b2).unwrap();

        assert_eq!(store.height().unwrap(), 2);
        assert_eq!(store.load_block(1).unwrap(), Some(b1.clone()));
        assert_eq!(store.load_block_by_hash(&b2.hash()).unwrap(), Some(b2));
        assert_eq!(store.load_block(3).unwrap(), None);
        assert_eq!(store.load_block_by_hash(&[9; 32]).unwrap(), None);
    }

    #[test]
    fn test_rejects_gaps() {
        let store = BlockStore::new(InMemoryKVStore::shared());
        let err = store.save_block(&block(2, [0; 32])).unwrap_err();
        assert!(matches!(
            err,
            StorageError::NonContiguousHeight { expected: 1, got: 2 }
        ));
    }

    #[test]
    fn test_load_range_newest_first() {
        let store = BlockStore::new(InMemoryKVStore::shared());
        let mut parent = [0; 32];
        for h in 1..=4 {
            let b = block(h, parent);
            parent = b.hash();
            store.save_block(&b).unwrap();
        }
        let heights: Vec<u64> = store
            .load_range(2, 10)
            .unwrap()
            .iter()
            .map(Block::height)
            .collect();
        assert_eq!(heights, vec![4, 3, 2]);
    }
}
