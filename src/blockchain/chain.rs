use std::sync::Mutex;
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;

use super::block::Block;
use super::hash::{self, GENESIS_PREVIOUS_HASH};
use super::mining::{CancelToken, Interruption, MiningBudget, CHECK_INTERVAL};
use super::pool::TransactionPool;
use super::storage::{BlockStore, StorageError};
use super::transaction::Transaction;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unable to create genesis block as chain is not empty")]
    ChainNotEmpty,

    #[error("New block does not extend the last block: expected previous hash {expected}, got {got}")]
    HashMismatch { expected: String, got: String },

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("There is no pending transaction")]
    EmptyPool,

    #[error("Block not found at index {0}")]
    BlockNotFound(u64),

    #[error("Store error: {0}")]
    StoreIoError(StorageError),

    #[error("Mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("Mining timed out after {attempts} attempts")]
    MiningTimedOut { attempts: u64 },

    #[error("Encoding error: {0}")]
    EncodingError(#[from] serde_json::Error),

    #[error("System error: {0}")]
    SystemError(String),
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BlockNotFound(index) => LedgerError::BlockNotFound(index),
            other => LedgerError::StoreIoError(other),
        }
    }
}

impl LedgerError {
    /// Whether the error is a permanent failure caused by the caller
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::ChainNotEmpty
                | LedgerError::HashMismatch { .. }
                | LedgerError::InvalidProof(_)
                | LedgerError::EmptyPool
        )
    }

    /// Whether the error means a proof-of-work search was abandoned
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            LedgerError::MiningCancelled { .. } | LedgerError::MiningTimedOut { .. }
        )
    }
}

/// The ledger: one chain of blocks sealed by proof of work
///
/// Blocks and pending transactions live in the injected [`BlockStore`] and
/// [`TransactionPool`]. Writes (`create_genesis`, `add_block`, `mine`) are
/// serialized by a single writer lock; submissions and reads do not take it.
pub struct Ledger {
    /// Name of the ledger
    name: String,

    /// Required number of leading zero hex characters in a block hash
    difficulty: usize,

    /// Time limit applied to each proof-of-work search
    mining_timeout: Option<Duration>,

    /// Persistent block storage
    store: Box<dyn BlockStore>,

    /// Transactions waiting for the next block
    pool: Box<dyn TransactionPool>,

    /// Serializes everything that appends to the chain
    writer: Mutex<()>,

    /// Token of the search currently running, if any
    active_search: Mutex<Option<CancelToken>>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("name", &self.name)
            .field("difficulty", &self.difficulty)
            .field("mining_timeout", &self.mining_timeout)
            .finish()
    }
}

impl Ledger {
    /// Creates a ledger over the given store and pool
    ///
    /// The ledger is uninitialized until [`Ledger::create_genesis`] runs,
    /// unless the store already holds a chain.
    pub fn new(
        name: impl Into<String>,
        difficulty: usize,
        store: Box<dyn BlockStore>,
        pool: Box<dyn TransactionPool>,
    ) -> Self {
        Ledger {
            name: name.into(),
            difficulty,
            mining_timeout: None,
            store,
            pool,
            writer: Mutex::new(()),
            active_search: Mutex::new(None),
        }
    }

    /// Bounds every proof-of-work search started by this ledger
    pub fn with_mining_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.mining_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// A fresh budget honouring the configured mining timeout
    pub fn default_budget(&self) -> MiningBudget {
        MiningBudget::from_timeout(self.mining_timeout)
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, ()>, LedgerError> {
        self.writer
            .lock()
            .map_err(|_| LedgerError::SystemError("writer lock poisoned".to_string()))
    }

    /// Creates and persists the genesis block
    ///
    /// The genesis block goes through the same proof-of-work search as any
    /// other block but skips linkage validation.
    ///
    /// # Returns
    ///
    /// The sealed genesis block
    pub fn create_genesis(&self) -> Result<Block, LedgerError> {
        let _writer = self.lock_writer()?;

        if !self.store.is_empty()? {
            return Err(LedgerError::ChainNotEmpty);
        }

        let mut genesis = Block::genesis();
        let proof = self.run_search(&mut genesis, &self.default_budget())?;
        genesis.seal(proof);
        self.store.put(&genesis)?;

        info!(
            "Created genesis block for '{}' with hash {}",
            self.name,
            genesis.hash_str()
        );
        Ok(genesis)
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Result<Block, LedgerError> {
        match self.store.last_index()? {
            Some(index) => Ok(self.store.get(index)?),
            None => Err(LedgerError::BlockNotFound(0)),
        }
    }

    /// Gets the block at `index`
    pub fn block(&self, index: u64) -> Result<Block, LedgerError> {
        Ok(self.store.get(index)?)
    }

    /// Performs proof of work on a draft block
    ///
    /// Starting from nonce 0, increments the nonce until the content hash
    /// has at least `difficulty` leading zeros. The search gives up when
    /// `budget` is cancelled or expires; the nonce reached is left on the
    /// draft.
    ///
    /// # Returns
    ///
    /// The qualifying hash
    pub fn proof_of_work(
        &self,
        draft: &mut Block,
        budget: &MiningBudget,
    ) -> Result<String, LedgerError> {
        draft.nonce = 0;
        let mut attempts: u64 = 0;

        loop {
            let proof = draft.calculate_hash()?;
            attempts += 1;

            if hash::meets_difficulty(&proof, self.difficulty) {
                debug!(
                    "Found proof for block {} after {} attempts",
                    draft.index, attempts
                );
                return Ok(proof);
            }

            if attempts % CHECK_INTERVAL == 0 {
                match budget.check() {
                    Some(Interruption::Cancelled) => {
                        return Err(LedgerError::MiningCancelled { attempts })
                    }
                    Some(Interruption::TimedOut) => {
                        return Err(LedgerError::MiningTimedOut { attempts })
                    }
                    None => {}
                }
            }

            draft.nonce += 1;
        }
    }

    /// Runs a search that [`Ledger::cancel_mining`] can interrupt
    ///
    /// A proof found after `cancel_mining` took the token is discarded, so a
    /// reported cancellation always means no block gets appended.
    fn run_search(&self, draft: &mut Block, budget: &MiningBudget) -> Result<String, LedgerError> {
        self.set_active_search(Some(budget.token().clone()));
        let result = self.proof_of_work(draft, budget);
        self.finish_search(result, draft)
    }

    fn finish_search(
        &self,
        result: Result<String, LedgerError>,
        draft: &Block,
    ) -> Result<String, LedgerError> {
        let still_active = self.set_active_search(None).is_some();

        match result {
            Ok(_) if !still_active => Err(LedgerError::MiningCancelled {
                attempts: draft.nonce + 1,
            }),
            result => result,
        }
    }

    /// Replaces the active token, returning the previous one
    fn set_active_search(&self, token: Option<CancelToken>) -> Option<CancelToken> {
        match self.active_search.lock() {
            Ok(mut active) => std::mem::replace(&mut *active, token),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), token),
        }
    }

    /// Cancels the proof-of-work search in progress
    ///
    /// # Returns
    ///
    /// `true` if a search was running
    pub fn cancel_mining(&self) -> bool {
        let token = match self.active_search.lock() {
            Ok(mut active) => active.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match token {
            Some(token) => {
                token.cancel();
                info!("Cancelled the running proof-of-work search");
                true
            }
            None => false,
        }
    }

    /// Validates a draft block and appends it to the chain
    ///
    /// # Arguments
    ///
    /// * `draft` - The block to add
    /// * `proof` - The hash found by the proof-of-work search
    ///
    /// # Returns
    ///
    /// The index of the added block
    pub fn add_block(&self, draft: Block, proof: &str) -> Result<u64, LedgerError> {
        let _writer = self.lock_writer()?;
        self.append_block(draft, proof)
    }

    /// `add_block` without taking the writer lock
    fn append_block(&self, mut draft: Block, proof: &str) -> Result<u64, LedgerError> {
        let last_block = self.last_block()?;

        if draft.previous_hash != last_block.hash_str() {
            return Err(LedgerError::HashMismatch {
                expected: last_block.hash_str().to_string(),
                got: draft.previous_hash,
            });
        }

        if !hash::meets_difficulty(proof, self.difficulty) {
            return Err(LedgerError::InvalidProof(format!(
                "{} has fewer than {} leading zeros",
                proof, self.difficulty
            )));
        }

        if proof != draft.calculate_hash()? {
            return Err(LedgerError::InvalidProof(format!(
                "{} is not the hash of block {}",
                proof, draft.index
            )));
        }

        draft.seal(proof.to_string());
        self.store.put(&draft)?;

        info!("Appended block {} with hash {}", draft.index, proof);
        Ok(draft.index)
    }

    /// Adds a new transaction to the pending transactions
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<Transaction, LedgerError> {
        self.pool.submit(transaction.clone())?;
        debug!(
            "Queued transaction {} -> {} ({})",
            transaction.sender, transaction.receiver, transaction.amount
        );
        Ok(transaction)
    }

    /// Mines a block with the pending transactions
    ///
    /// Uses the configured mining timeout.
    ///
    /// # Returns
    ///
    /// The index of the new block
    pub fn mine(&self) -> Result<u64, LedgerError> {
        self.mine_with(&self.default_budget())
    }

    /// Mines a block within the given budget
    ///
    /// If anything fails after the pool was drained, the drained
    /// transactions are put back at the head of the pool.
    pub fn mine_with(&self, budget: &MiningBudget) -> Result<u64, LedgerError> {
        let _writer = self.lock_writer()?;

        if self.pool.is_empty()? {
            return Err(LedgerError::EmptyPool);
        }

        let last_block = self.last_block()?;
        let transactions = self.pool.snapshot_and_clear()?;
        if transactions.is_empty() {
            return Err(LedgerError::EmptyPool);
        }

        let mut draft = Block::draft(
            last_block.index + 1,
            last_block.hash_str().to_string(),
            transactions,
        );

        let result = self
            .run_search(&mut draft, budget)
            .and_then(|proof| self.append_block(draft.clone(), &proof));

        if let Err(err) = &result {
            warn!(
                "Mining block {} failed: {}; re-queueing {} transactions",
                draft.index,
                err,
                draft.transactions.len()
            );
            if let Err(requeue_err) = self.pool.requeue(draft.transactions) {
                error!("Failed to re-queue drained transactions: {}", requeue_err);
            }
        }

        result
    }

    /// Gets every block in the chain, in index order
    pub fn chain(&self) -> Result<Vec<Block>, LedgerError> {
        match self.store.last_index()? {
            Some(last) => (0..=last)
                .map(|index| self.block(index))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Gets the transactions of every block, in chain order
    pub fn transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .chain()?
            .into_iter()
            .flat_map(|block| block.transactions)
            .collect())
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.pool.pending()?)
    }

    /// Picks up a stored chain, or creates genesis on an empty store
    ///
    /// A stored chain is checked for linkage and hash integrity only: its
    /// blocks were sealed under whatever difficulty was configured then.
    ///
    /// # Returns
    ///
    /// The last block of the chain
    pub fn resume_or_create(&self) -> Result<Block, LedgerError> {
        match self.last_block() {
            Ok(last) => {
                self.check_chain(0)?;
                info!("Resuming '{}' at block {}", self.name, last.index);
                Ok(last)
            }
            Err(LedgerError::BlockNotFound(_)) => self.create_genesis(),
            Err(err) => Err(err),
        }
    }

    /// Validates the whole chain
    ///
    /// Checks the genesis sentinel, index continuity, hash linkage, that every
    /// hash is the hash of its block and that it meets the difficulty.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        self.check_chain(self.difficulty)
    }

    fn check_chain(&self, difficulty: usize) -> Result<(), LedgerError> {
        let chain = self.chain()?;
        let mut previous: Option<&Block> = None;

        for (position, block) in chain.iter().enumerate() {
            if block.index != position as u64 {
                return Err(LedgerError::BlockNotFound(position as u64));
            }

            let expected_previous = previous.map_or(GENESIS_PREVIOUS_HASH, |b| b.hash_str());
            if block.previous_hash != expected_previous {
                return Err(LedgerError::HashMismatch {
                    expected: expected_previous.to_string(),
                    got: block.previous_hash.clone(),
                });
            }

            if !block.is_sealed() {
                return Err(LedgerError::InvalidProof(format!(
                    "block {} is not sealed",
                    block.index
                )));
            }

            let recomputed = block.calculate_hash()?;
            if block.hash.as_deref() != Some(recomputed.as_str()) {
                return Err(LedgerError::InvalidProof(format!(
                    "block {} carries {} but hashes to {}",
                    block.index,
                    block.hash_str(),
                    recomputed
                )));
            }

            if !hash::meets_difficulty(&recomputed, difficulty) {
                return Err(LedgerError::InvalidProof(format!(
                    "block {} hash {} does not meet difficulty {}",
                    block.index, recomputed, difficulty
                )));
            }

            previous = Some(block);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::pool::InMemoryPool;
    use crate::blockchain::storage::{MemoryStore, SledPool, SledStore};
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;

    fn memory_ledger(difficulty: usize) -> Ledger {
        Ledger::new(
            "Transaction Blockchain",
            difficulty,
            Box::new(MemoryStore::new()),
            Box::new(InMemoryPool::new()),
        )
    }

    fn sled_ledger(difficulty: usize) -> Ledger {
        let db = sled::Config::new().temporary(true).open().unwrap();
        Ledger::new(
            "Transaction Blockchain",
            difficulty,
            Box::new(SledStore::new(db.clone())),
            Box::new(SledPool::new(db)),
        )
    }

    fn transfer(sender: &str, receiver: &str, amount: f64) -> Transaction {
        Transaction::new(Utc::now(), sender, receiver, amount)
    }

    fn next_draft(ledger: &Ledger) -> Block {
        let last = ledger.last_block().unwrap();
        Block::draft(
            last.index + 1,
            last.hash_str().to_string(),
            vec![transfer("A", "B", 1.0)],
        )
    }

    #[test]
    fn test_genesis_block() {
        let ledger = memory_ledger(1);
        let genesis = ledger.create_genesis().unwrap();

        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert!(genesis.hash_str().starts_with('0'));
        assert_eq!(ledger.last_block().unwrap(), genesis);
    }

    #[test]
    fn test_genesis_on_non_empty_store_fails() {
        let ledger = memory_ledger(1);
        let genesis = ledger.create_genesis().unwrap();

        assert!(matches!(
            ledger.create_genesis(),
            Err(LedgerError::ChainNotEmpty)
        ));
        assert_eq!(ledger.chain().unwrap(), vec![genesis]);
    }

    #[test]
    fn test_last_block_on_empty_store() {
        let ledger = memory_ledger(1);
        assert!(matches!(
            ledger.last_block(),
            Err(LedgerError::BlockNotFound(_))
        ));
    }

    #[test]
    fn test_mine_two_transactions() {
        let ledger = memory_ledger(2);
        let genesis = ledger.create_genesis().unwrap();

        let first = transfer("A", "B", 10.0);
        let second = transfer("B", "C", 5.0);
        ledger.submit_transaction(first.clone()).unwrap();
        ledger.submit_transaction(second.clone()).unwrap();

        let index = ledger.mine().unwrap();
        assert_eq!(index, 1);

        let block = ledger.block(1).unwrap();
        assert_eq!(block.transactions, vec![first, second]);
        assert_eq!(block.previous_hash, genesis.hash_str());
        assert!(block.hash_str().starts_with("00"));
        assert_eq!(block.calculate_hash().unwrap(), block.hash_str());
        assert!(ledger.pending_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_mine_twice_with_one_transaction() {
        let ledger = memory_ledger(1);
        ledger.create_genesis().unwrap();
        ledger.submit_transaction(transfer("A", "B", 1.0)).unwrap();

        assert_eq!(ledger.mine().unwrap(), 1);
        assert!(matches!(ledger.mine(), Err(LedgerError::EmptyPool)));
    }

    #[test]
    fn test_mine_empty_pool_leaves_store_unchanged() {
        let ledger = memory_ledger(1);
        ledger.create_genesis().unwrap();
        let before = ledger.chain().unwrap();

        assert!(matches!(ledger.mine(), Err(LedgerError::EmptyPool)));
        assert_eq!(ledger.chain().unwrap(), before);
    }

    #[test]
    fn test_add_block_with_flipped_proof() {
        let ledger = memory_ledger(1);
        ledger.create_genesis().unwrap();

        let mut draft = next_draft(&ledger);
        let proof = ledger
            .proof_of_work(&mut draft, &MiningBudget::unbounded())
            .unwrap();

        let mut flipped = proof.clone();
        let last = flipped.pop().unwrap();
        flipped.push(if last == 'a' { 'b' } else { 'a' });

        assert!(matches!(
            ledger.add_block(draft.clone(), &flipped),
            Err(LedgerError::InvalidProof(_))
        ));
        assert_eq!(ledger.add_block(draft, &proof).unwrap(), 1);
    }

    #[test]
    fn test_add_block_with_insufficient_difficulty() {
        let ledger = memory_ledger(3);
        ledger.create_genesis().unwrap();

        let mut draft = next_draft(&ledger);
        let mut proof = draft.calculate_hash().unwrap();
        while hash::meets_difficulty(&proof, 1) {
            draft.nonce += 1;
            proof = draft.calculate_hash().unwrap();
        }

        assert!(matches!(
            ledger.add_block(draft, &proof),
            Err(LedgerError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_add_block_with_unrelated_previous_hash() {
        let ledger = memory_ledger(1);
        ledger.create_genesis().unwrap();

        let mut draft = next_draft(&ledger);
        draft.previous_hash = "deadbeef".to_string();
        let proof = ledger
            .proof_of_work(&mut draft, &MiningBudget::unbounded())
            .unwrap();

        assert!(matches!(
            ledger.add_block(draft, &proof),
            Err(LedgerError::HashMismatch { .. })
        ));
        assert_eq!(ledger.chain().unwrap().len(), 1);
    }

    #[test]
    fn test_difficulty_zero_accepts_first_nonce() {
        let ledger = memory_ledger(0);
        ledger.create_genesis().unwrap();
        ledger.submit_transaction(transfer("A", "B", 1.0)).unwrap();

        ledger.mine().unwrap();
        assert_eq!(ledger.block(1).unwrap().nonce, 0);
    }

    #[test]
    fn test_chain_linkage_and_transactions() {
        let ledger = memory_ledger(1);
        ledger.create_genesis().unwrap();

        for round in 0..3 {
            ledger
                .submit_transaction(transfer("A", "B", round as f64))
                .unwrap();
            ledger.mine().unwrap();
        }

        let chain = ledger.chain().unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0].previous_hash, "0");
        for i in 1..chain.len() {
            assert_eq!(chain[i].previous_hash, chain[i - 1].hash_str());
            assert!(hash::meets_difficulty(chain[i].hash_str(), 1));
        }

        let amounts: Vec<f64> = ledger
            .transactions()
            .unwrap()
            .iter()
            .map(|t| t.amount)
            .collect();
        assert_eq!(amounts, vec![0.0, 1.0, 2.0]);
        assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn test_cancelled_mining_requeues_transactions() {
        // 64 leading zeros is never reached
        let ledger = memory_ledger(64);
        let mut genesis = Block::genesis();
        genesis.seal(genesis.calculate_hash().unwrap());
        ledger.store.put(&genesis).unwrap();

        let first = transfer("A", "B", 1.0);
        ledger.submit_transaction(first.clone()).unwrap();

        let budget = MiningBudget::unbounded();
        budget.token().cancel();

        assert!(matches!(
            ledger.mine_with(&budget),
            Err(LedgerError::MiningCancelled { .. })
        ));
        assert_eq!(ledger.pending_transactions().unwrap(), vec![first]);
        assert_eq!(ledger.chain().unwrap().len(), 1);
    }

    #[test]
    fn test_mining_timeout() {
        let ledger = memory_ledger(64).with_mining_timeout(Some(Duration::from_millis(50)));
        let mut genesis = Block::genesis();
        genesis.seal(genesis.calculate_hash().unwrap());
        ledger.store.put(&genesis).unwrap();
        ledger.submit_transaction(transfer("A", "B", 1.0)).unwrap();

        let err = ledger.mine().unwrap_err();
        assert!(matches!(err, LedgerError::MiningTimedOut { .. }));
        assert!(err.is_interrupted());
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_mining_from_another_thread() {
        let ledger = Arc::new(memory_ledger(64));
        let mut genesis = Block::genesis();
        genesis.seal(genesis.calculate_hash().unwrap());
        ledger.store.put(&genesis).unwrap();
        ledger.submit_transaction(transfer("A", "B", 1.0)).unwrap();

        let miner = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.mine_with(&MiningBudget::unbounded()))
        };

        while !ledger.cancel_mining() {
            thread::sleep(Duration::from_millis(5));
        }

        let result = miner.join().unwrap();
        assert!(matches!(result, Err(LedgerError::MiningCancelled { .. })));
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
        assert!(!ledger.cancel_mining());
    }

    #[test]
    fn test_cancel_after_proof_found_discards_proof() {
        let ledger = memory_ledger(0);
        let draft = Block::genesis();
        let proof = draft.calculate_hash().unwrap();

        ledger.set_active_search(Some(CancelToken::new()));
        assert!(ledger.cancel_mining());

        assert!(matches!(
            ledger.finish_search(Ok(proof.clone()), &draft),
            Err(LedgerError::MiningCancelled { attempts: 1 })
        ));

        ledger.set_active_search(Some(CancelToken::new()));
        assert_eq!(ledger.finish_search(Ok(proof.clone()), &draft).unwrap(), proof);
        assert!(!ledger.cancel_mining());
    }

    #[test]
    fn test_concurrent_mining_keeps_chain_linear() {
        let ledger = Arc::new(memory_ledger(1));
        ledger.create_genesis().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for i in 0..5 {
                        ledger
                            .submit_transaction(transfer(&worker.to_string(), "B", i as f64))
                            .unwrap();
                        let _ = ledger.mine();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        while !ledger.pending_transactions().unwrap().is_empty() {
            ledger.mine().unwrap();
        }

        assert!(ledger.verify_chain().is_ok());
        assert_eq!(ledger.transactions().unwrap().len(), 20);
    }

    #[test]
    fn test_verify_chain_detects_tampering() {
        let store = MemoryStore::new();
        let mut genesis = Block::genesis();
        genesis.seal(genesis.calculate_hash().unwrap());
        store.put(&genesis).unwrap();

        let mut tampered = Block::draft(1, genesis.hash_str().to_string(), Vec::new());
        tampered.seal("0".repeat(64));
        store.put(&tampered).unwrap();

        let ledger = Ledger::new("tampered", 0, Box::new(store), Box::new(InMemoryPool::new()));
        assert!(matches!(
            ledger.verify_chain(),
            Err(LedgerError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_verify_chain_rejects_unsealed_block() {
        let store = MemoryStore::new();
        let mut genesis = Block::genesis();
        genesis.seal(genesis.calculate_hash().unwrap());
        store.put(&genesis).unwrap();
        store
            .put(&Block::draft(1, genesis.hash_str().to_string(), Vec::new()))
            .unwrap();

        let ledger = Ledger::new("unsealed", 0, Box::new(store), Box::new(InMemoryPool::new()));
        match ledger.verify_chain() {
            Err(LedgerError::InvalidProof(message)) => assert!(message.contains("not sealed")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    fn open_sled_ledger(path: &std::path::Path, difficulty: usize) -> Ledger {
        let store = SledStore::open(path).unwrap();
        let pool = SledPool::new(store.db().clone());
        Ledger::new("Transaction Blockchain", difficulty, Box::new(store), Box::new(pool))
    }

    #[test]
    fn test_reopened_sled_database_resumes_chain() {
        let dir = tempfile::tempdir().unwrap();

        let mined = {
            let ledger = open_sled_ledger(dir.path(), 1);
            let genesis = ledger.resume_or_create().unwrap();
            assert_eq!(genesis.index, 0);

            ledger.submit_transaction(transfer("A", "B", 212.91890726713459)).unwrap();
            ledger.submit_transaction(transfer("B", "C", 5.0)).unwrap();
            assert_eq!(ledger.mine().unwrap(), 1);
            ledger.submit_transaction(transfer("C", "D", 1.0)).unwrap();
            ledger.block(1).unwrap()
        };

        let ledger = open_sled_ledger(dir.path(), 1);
        let last = ledger.resume_or_create().unwrap();

        assert_eq!(last.index, 1);
        assert_eq!(ledger.last_block().unwrap(), mined);
        assert!(ledger.verify_chain().is_ok());
        assert!(matches!(
            ledger.create_genesis(),
            Err(LedgerError::ChainNotEmpty)
        ));
        assert_eq!(ledger.pending_transactions().unwrap().len(), 1);
        assert_eq!(ledger.mine().unwrap(), 2);
    }

    #[test]
    fn test_resume_tolerates_raised_difficulty() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = open_sled_ledger(dir.path(), 1);
            ledger.resume_or_create().unwrap();
        }

        let ledger = open_sled_ledger(dir.path(), 3);
        let last = ledger.resume_or_create().unwrap();
        assert_eq!(last.index, 0);
    }

    #[test]
    fn test_sled_backend_scenario() {
        let ledger = sled_ledger(2);
        let genesis = ledger.create_genesis().unwrap();

        ledger.submit_transaction(transfer("A", "B", 10.0)).unwrap();
        ledger.submit_transaction(transfer("B", "C", 5.0)).unwrap();
        assert_eq!(ledger.mine().unwrap(), 1);

        let block = ledger.block(1).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.previous_hash, genesis.hash_str());
        assert!(block.hash_str().starts_with("00"));
        assert_eq!(block.calculate_hash().unwrap(), block.hash_str());
        assert!(ledger.pending_transactions().unwrap().is_empty());
        assert!(matches!(ledger.mine(), Err(LedgerError::EmptyPool)));
        assert!(matches!(
            ledger.create_genesis(),
            Err(LedgerError::ChainNotEmpty)
        ));
        assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn test_storage_error_mapping() {
        assert!(matches!(
            LedgerError::from(StorageError::BlockNotFound(3)),
            LedgerError::BlockNotFound(3)
        ));
        assert!(matches!(
            LedgerError::from(StorageError::LockPoisoned),
            LedgerError::StoreIoError(_)
        ));
        assert!(LedgerError::EmptyPool.is_validation());
        assert!(!LedgerError::BlockNotFound(0).is_validation());
    }
}
