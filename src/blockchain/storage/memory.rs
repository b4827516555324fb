use std::sync::RwLock;

use super::{next_index, BlockStore, StorageError};
use crate::blockchain::block::Block;

/// In-process block store backed by a vector indexed by position
///
/// Nothing is durable; the chain lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<Vec<Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn last_position(blocks: &[Block]) -> Option<u64> {
    blocks.len().checked_sub(1).map(|index| index as u64)
}

impl BlockStore for MemoryStore {
    fn get(&self, index: u64) -> Result<Block, StorageError> {
        let blocks = self.blocks.read().map_err(|_| StorageError::LockPoisoned)?;

        usize::try_from(index)
            .ok()
            .and_then(|position| blocks.get(position))
            .cloned()
            .ok_or(StorageError::BlockNotFound(index))
    }

    fn put(&self, block: &Block) -> Result<(), StorageError> {
        let mut blocks = self.blocks.write().map_err(|_| StorageError::LockPoisoned)?;

        let expected = next_index(last_position(&blocks));
        if block.index != expected {
            return Err(StorageError::IndexConflict {
                expected,
                got: block.index,
            });
        }

        blocks.push(block.clone());
        Ok(())
    }

    fn last_index(&self) -> Result<Option<u64>, StorageError> {
        let blocks = self.blocks.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(last_position(&blocks))
    }
}
