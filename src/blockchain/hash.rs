use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::block::Block;
use super::transaction::Transaction;

/// Sentinel previous hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// The hashed view of a block: every field except `hash`.
///
/// Fields are declared in alphabetical order and serialized in declaration
/// order, so the encoding does not depend on how the block was built.
#[derive(Serialize)]
struct BlockContent<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: &'a DateTime<Utc>,
    transactions: &'a [Transaction],
}

impl<'a> From<&'a Block> for BlockContent<'a> {
    fn from(block: &'a Block) -> Self {
        BlockContent {
            index: block.index,
            nonce: block.nonce,
            previous_hash: &block.previous_hash,
            timestamp: &block.timestamp,
            transactions: &block.transactions,
        }
    }
}

/// Computes the canonical hash of a block's content
///
/// The content is encoded as JSON and streamed straight into the hasher.
///
/// # Returns
///
/// The SHA-256 digest as a lowercase hexadecimal string
pub fn digest(block: &Block) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut hasher, &BlockContent::from(block))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Counts the leading `'0'` characters of a hex hash
pub fn leading_zeros(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// Checks the difficulty predicate
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    leading_zeros(hash) >= difficulty
}
