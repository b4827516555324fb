use std::fmt;
use std::path::Path;

use log::debug;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::Db;

use super::{next_index, with_retry, BlockStore, StorageError};
use crate::blockchain::block::Block;
use crate::blockchain::pool::TransactionPool;
use crate::blockchain::transaction::Transaction;

/// Key holding the index of the last persisted block
pub const LAST_BLOCK_KEY: &str = "last_block";

/// Key holding the list of pending transactions
pub const PENDING_TRANSACTIONS_KEY: &str = "pending_transactions";

/// Block store backed by a sled key-value database
///
/// Block `i` lives under the key `"i"` as a JSON record and
/// [`LAST_BLOCK_KEY`] points at the highest index. Records are decoded with
/// serde, so a malformed record is an error rather than executable input.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl fmt::Debug for SledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Opens (or creates) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Ok(Self::new(sled::open(path)?))
    }

    /// Wraps an already opened database
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The underlying database, for sharing with a [`SledPool`]
    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn block_key(index: u64) -> String {
    index.to_string()
}

fn encode_pointer(index: u64) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(&index).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn decode_pointer(bytes: &[u8]) -> Result<u64, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::DeserializationError(e.to_string()))
}

fn decode_block(index: u64, bytes: &[u8]) -> Result<Block, StorageError> {
    let block: Block = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::DeserializationError(format!("block {}: {}", index, e)))?;

    if block.index != index {
        return Err(StorageError::DeserializationError(format!(
            "record under key {} holds block {}",
            index, block.index
        )));
    }

    Ok(block)
}

impl BlockStore for SledStore {
    fn get(&self, index: u64) -> Result<Block, StorageError> {
        let key = block_key(index);
        let value = with_retry("get block", || Ok(self.db.get(key.as_bytes())?))?;

        match value {
            Some(bytes) => decode_block(index, &bytes),
            None => Err(StorageError::BlockNotFound(index)),
        }
    }

    fn put(&self, block: &Block) -> Result<(), StorageError> {
        let record = serde_json::to_vec(block)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let pointer = encode_pointer(block.index)?;
        let key = block_key(block.index);

        with_retry("put block", || {
            // Record and pointer move together, and only on top of the
            // expected previous index.
            let outcome: TransactionResult<(), StorageError> = self.db.transaction(|tx| {
                let last_index = match tx.get(LAST_BLOCK_KEY.as_bytes())? {
                    Some(bytes) => {
                        Some(decode_pointer(&bytes).map_err(ConflictableTransactionError::Abort)?)
                    }
                    None => None,
                };

                let expected = next_index(last_index);
                if block.index != expected {
                    return Err(ConflictableTransactionError::Abort(
                        StorageError::IndexConflict {
                            expected,
                            got: block.index,
                        },
                    ));
                }

                tx.insert(key.as_bytes(), record.as_slice())?;
                tx.insert(LAST_BLOCK_KEY.as_bytes(), pointer.as_slice())?;
                Ok(())
            });

            match outcome {
                Ok(()) => Ok(()),
                Err(TransactionError::Abort(err)) => Err(err),
                Err(TransactionError::Storage(err)) => Err(err.into()),
            }
        })?;

        self.db.flush()?;
        debug!("Stored block {} under key {}", block.index, key);
        Ok(())
    }

    fn last_index(&self) -> Result<Option<u64>, StorageError> {
        let value = with_retry("read last block", || {
            Ok(self.db.get(LAST_BLOCK_KEY.as_bytes())?)
        })?;

        value.map(|bytes| decode_pointer(&bytes)).transpose()
    }
}

/// Transaction pool kept in the same sled database as the blocks
///
/// The whole pool is one JSON list under [`PENDING_TRANSACTIONS_KEY`];
/// every change is a compare-and-swap of that list, so a drain never
/// observes half of a concurrent push. Each submission rewrites the full
/// list, so a push costs O(pending) and the pool has no size bound; fine
/// while the pool is drained every block.
#[derive(Clone)]
pub struct SledPool {
    db: Db,
}

impl fmt::Debug for SledPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledPool").finish()
    }
}

impl SledPool {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn decode(bytes: Option<&[u8]>) -> Result<Vec<Transaction>, StorageError> {
        match bytes {
            Some(bytes) => serde_json::from_slice(bytes)
                .map_err(|e| StorageError::DeserializationError(format!("pending list: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the list with `f(current)` atomically, returning the old list
    fn update<F>(&self, name: &str, mut f: F) -> Result<Vec<Transaction>, StorageError>
    where
        F: FnMut(Vec<Transaction>) -> Vec<Transaction>,
    {
        with_retry(name, || loop {
            let current = self.db.get(PENDING_TRANSACTIONS_KEY.as_bytes())?;
            let previous = Self::decode(current.as_deref())?;

            let next = f(previous.clone());
            let encoded = if next.is_empty() {
                None
            } else {
                Some(
                    serde_json::to_vec(&next)
                        .map_err(|e| StorageError::SerializationError(e.to_string()))?,
                )
            };

            match self
                .db
                .compare_and_swap(PENDING_TRANSACTIONS_KEY.as_bytes(), current, encoded)?
            {
                Ok(()) => return Ok(previous),
                // Another writer changed the list in between
                Err(_) => continue,
            }
        })
    }
}

impl TransactionPool for SledPool {
    fn submit(&self, transaction: Transaction) -> Result<(), StorageError> {
        self.update("submit transaction", |mut pending| {
            pending.push(transaction.clone());
            pending
        })?;
        Ok(())
    }

    fn snapshot_and_clear(&self) -> Result<Vec<Transaction>, StorageError> {
        self.update("drain pending transactions", |_| Vec::new())
    }

    fn requeue(&self, transactions: Vec<Transaction>) -> Result<(), StorageError> {
        self.update("requeue transactions", |newer| {
            let mut restored = transactions.clone();
            restored.extend(newer);
            restored
        })?;
        Ok(())
    }

    fn pending(&self) -> Result<Vec<Transaction>, StorageError> {
        let current = with_retry("read pending transactions", || {
            Ok(self.db.get(PENDING_TRANSACTIONS_KEY.as_bytes())?)
        })?;
        Self::decode(current.as_deref())
    }
}
