use std::sync::Mutex;

use super::storage::StorageError;
use super::transaction::Transaction;

/// Staging area for transactions awaiting inclusion in a block
///
/// Implementations keep submission order and never reject a transaction
/// because of its content.
pub trait TransactionPool: Send + Sync {
    /// Appends a transaction to the tail of the pool
    fn submit(&self, transaction: Transaction) -> Result<(), StorageError>;

    /// Returns every pending transaction and empties the pool in one step
    fn snapshot_and_clear(&self) -> Result<Vec<Transaction>, StorageError>;

    /// Puts a drained batch back at the head of the pool
    ///
    /// Transactions submitted after the drain stay behind the batch.
    fn requeue(&self, transactions: Vec<Transaction>) -> Result<(), StorageError>;

    /// Lists pending transactions without removing them
    fn pending(&self) -> Result<Vec<Transaction>, StorageError>;

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.pending()?.len())
    }

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

/// Pool held in process memory
#[derive(Debug, Default)]
pub struct InMemoryPool {
    transactions: Mutex<Vec<Transaction>>,
}

impl InMemoryPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionPool for InMemoryPool {
    fn submit(&self, transaction: Transaction) -> Result<(), StorageError> {
        self.transactions
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .push(transaction);
        Ok(())
    }

    fn snapshot_and_clear(&self) -> Result<Vec<Transaction>, StorageError> {
        let mut transactions = self.transactions.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(std::mem::take(&mut *transactions))
    }

    fn requeue(&self, transactions: Vec<Transaction>) -> Result<(), StorageError> {
        let mut pending = self.transactions.lock().map_err(|_| StorageError::LockPoisoned)?;
        let newer = std::mem::replace(&mut *pending, transactions);
        pending.extend(newer);
        Ok(())
    }

    fn pending(&self) -> Result<Vec<Transaction>, StorageError> {
        let transactions = self.transactions.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(transactions.clone())
    }

    fn len(&self) -> Result<usize, StorageError> {
        let transactions = self.transactions.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(transactions.len())
    }
}
