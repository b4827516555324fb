//! Block persistence
//!
//! [`BlockStore`] is the only way the ledger reads or writes blocks. Two
//! strategies are provided and selected at construction time:
//! [`MemoryStore`] for a single process and [`SledStore`] for a key-value
//! database.

use std::thread;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use super::block::Block;

pub mod kv;
pub mod memory;

pub use kv::{SledPool, SledStore};
pub use memory::MemoryStore;

/// Attempts made for an operation failing with a transient error
pub const RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first retry, doubled on each further attempt
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(25);

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Block not found at index {0}")]
    BlockNotFound(u64),

    #[error("Index conflict: expected block {expected}, got {got}")]
    IndexConflict { expected: u64, got: u64 },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::DatabaseError(sled::Error::Io(_)))
    }
}

/// Persistence for sealed blocks, keyed by index
///
/// `put` only accepts the block that directly follows the current last
/// index, so a write racing another writer fails instead of overwriting.
pub trait BlockStore: Send + Sync {
    /// Returns the block stored at `index`
    fn get(&self, index: u64) -> Result<Block, StorageError>;

    /// Persists a sealed block at `block.index`
    fn put(&self, block: &Block) -> Result<(), StorageError>;

    /// Returns the highest persisted index, or `None` when empty
    fn last_index(&self) -> Result<Option<u64>, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.last_index()?.is_none())
    }
}

/// Index the next `put` must carry, given the current last index
pub(crate) fn next_index(last_index: Option<u64>) -> u64 {
    last_index.map_or(0, |index| index + 1)
}

/// Runs `op`, retrying transient failures with exponential backoff
pub(crate) fn with_retry<T, F>(name: &str, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Result<T, StorageError>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;

    loop {
        match op() {
            Err(err) if err.is_transient() && attempt < RETRY_ATTEMPTS => {
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    name, attempt, RETRY_ATTEMPTS, err, delay
                );
                thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}
