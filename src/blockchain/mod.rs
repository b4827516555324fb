// Blockchain module
//
// This module contains the ledger implementation including:
// - Block and transaction structures
// - Canonical block hashing
// - Transaction pool
// - Block storage (in-memory and sled)
// - Proof of work and chain validation

pub mod block;
pub mod chain;
pub mod hash;
pub mod mining;
pub mod pool;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Ledger, LedgerError};
pub use pool::{InMemoryPool, TransactionPool};
pub use storage::{BlockStore, MemoryStore, SledPool, SledStore};
pub use transaction::Transaction;
