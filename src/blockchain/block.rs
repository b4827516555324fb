use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::hash::{self, GENESIS_PREVIOUS_HASH};
use super::transaction::Transaction;

/// Represents a block in the ledger
///
/// A block is a draft until the proof-of-work search assigns `hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Hash of the previous block, `"0"` for genesis
    pub previous_hash: String,

    /// Hash of this block, `None` while it is a draft
    pub hash: Option<String>,

    /// Transactions included in this block, in submission order
    pub transactions: Vec<Transaction>,

    /// Counter varied by the proof-of-work search
    pub nonce: u64,
}

impl Block {
    /// Creates a new draft block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `previous_hash` - The hash of the previous block
    /// * `transactions` - The transactions to include in the block
    pub fn draft(index: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Block {
            index,
            timestamp: Utc::now(),
            previous_hash,
            hash: None,
            transactions,
            nonce: 0,
        }
    }

    /// Creates the draft of the genesis block
    pub fn genesis() -> Self {
        Block::draft(0, GENESIS_PREVIOUS_HASH.to_string(), Vec::new())
    }

    /// Calculates the canonical hash of the block content
    pub fn calculate_hash(&self) -> Result<String, serde_json::Error> {
        hash::digest(self)
    }

    /// Assigns the hash found by the proof-of-work search
    pub fn seal(&mut self, hash: String) {
        self.hash = Some(hash);
    }

    /// Whether the block carries its hash
    pub fn is_sealed(&self) -> bool {
        self.hash.is_some()
    }

    /// The sealed hash, or an empty string for a draft
    pub fn hash_str(&self) -> &str {
        self.hash.as_deref().unwrap_or_default()
    }
}
