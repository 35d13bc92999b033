use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

use crate::constants::NONCE_BATCH;
use crate::{Block, LedgerError};

/// Which nonce search routine the ledger runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningStrategy {
    #[default]
    Sequential,
    Parallel,
}

/// Shared flag that asks an in-flight nonce search to give up.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once triggered the token stays cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stopping predicate consulted by the nonce search. The default never stops.
#[derive(Clone, Debug, Default)]
pub struct MiningLimits {
    pub max_attempts: Option<u64>,
    pub cancel: Option<CancelToken>,
}

impl MiningLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn should_stop(&self, attempts: u64) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn remaining(&self, attempts: u64) -> u64 {
        self.max_attempts
            .map_or(u64::MAX, |max| max.saturating_sub(attempts))
    }
}

/// Number of leading `'0'` characters in a hex digest.
pub fn leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// True when the first `difficulty` characters of `hash` are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.as_bytes()[..difficulty].iter().all(|b| *b == b'0')
}

/// Mine the block by incrementing the nonce one at a time from its current
/// value until the hash meets `difficulty`, or until `limits` says stop.
pub fn mine_block(
    mut block: Block,
    difficulty: usize,
    limits: &MiningLimits,
) -> Result<Block, LedgerError> {
    let mut attempts = 0u64;
    loop {
        if limits.should_stop(attempts) {
            debug!(index = block.index, attempts, "nonce search stopped");
            return Err(LedgerError::MiningAborted { attempts });
        }
        let hash = block.hash_with_nonce(block.nonce);
        attempts += 1;
        if meets_difficulty(&hash, difficulty) {
            block.hash = hash;
            return Ok(block);
        }
        block.nonce = block
            .nonce
            .checked_add(1)
            .ok_or(LedgerError::MiningAborted { attempts })?;
    }
}

/// Same search as [`mine_block`] spread over the rayon pool.
///
/// Nonces are scanned in batches of [`NONCE_BATCH`] and each batch keeps the
/// lowest matching nonce, so the sealed block is identical to the one the
/// sequential search produces. Limits are checked between batches.
pub fn mine_block_parallel(
    mut block: Block,
    difficulty: usize,
    limits: &MiningLimits,
) -> Result<Block, LedgerError> {
    let mut start = block.nonce;
    let mut attempts = 0u64;
    loop {
        if limits.should_stop(attempts) {
            debug!(index = block.index, attempts, "parallel nonce search stopped");
            return Err(LedgerError::MiningAborted { attempts });
        }
        let span = NONCE_BATCH.min(limits.remaining(attempts));
        let end = start.saturating_add(span);
        if end == start {
            return Err(LedgerError::MiningAborted { attempts });
        }

        let candidate = &block;
        let found = (start..end)
            .into_par_iter()
            .find_first(|nonce| meets_difficulty(&candidate.hash_with_nonce(*nonce), difficulty));

        if let Some(nonce) = found {
            block.nonce = nonce;
            block.hash = block.hash_with_nonce(nonce);
            return Ok(block);
        }
        attempts += end - start;
        start = end;
    }
}

pub fn mine_with(
    strategy: MiningStrategy,
    block: Block,
    difficulty: usize,
    limits: &MiningLimits,
) -> Result<Block, LedgerError> {
    match strategy {
        MiningStrategy::Sequential => mine_block(block, difficulty, limits),
        MiningStrategy::Parallel => mine_block_parallel(block, difficulty, limits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transaction;

    fn candidate() -> Block {
        let txs = vec![
            Transaction::transfer_at("Alice", "Bob", 10, 1_600_000_000),
            Transaction::transfer_at("Bob", "Charlie", 5, 1_600_000_100),
        ];
        Block::candidate(1, 1_600_000_200, "ab", txs)
    }

    #[test]
    fn leading_zero_digit_examples() {
        assert_eq!(leading_zero_digits("abc"), 0);
        assert_eq!(leading_zero_digits("0abc"), 1);
        assert_eq!(leading_zero_digits("000f"), 3);
        assert_eq!(leading_zero_digits("0000"), 4);
    }

    #[test]
    fn meets_difficulty_examples() {
        assert!(meets_difficulty("00ab", 0));
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("00ab", 3));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn mine_block_example() {
        let mined = mine_block(candidate(), 3, &MiningLimits::unbounded()).unwrap();
        assert!(mined.hash.starts_with("000"));
        assert_eq!(mined.hash, mined.compute_hash());
    }

    #[test]
    fn mined_nonce_is_the_first_that_satisfies() {
        let mined = mine_block(candidate(), 2, &MiningLimits::unbounded()).unwrap();
        let block = candidate();
        for nonce in 0..mined.nonce {
            assert!(!meets_difficulty(&block.hash_with_nonce(nonce), 2));
        }
    }

    #[test]
    fn zero_difficulty_accepts_nonce_zero() {
        let mined = mine_block(candidate(), 0, &MiningLimits::unbounded()).unwrap();
        assert_eq!(mined.nonce, 0);
    }

    #[test]
    fn parallel_search_matches_sequential() {
        let limits = MiningLimits::unbounded();
        let seq = mine_block(candidate(), 3, &limits).unwrap();
        let par = mine_block_parallel(candidate(), 3, &limits).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn attempt_cap_aborts_search() {
        let limits = MiningLimits::unbounded().with_max_attempts(1_000);
        assert_eq!(
            mine_block(candidate(), 64, &limits),
            Err(LedgerError::MiningAborted { attempts: 1_000 })
        );
        assert_eq!(
            mine_block_parallel(candidate(), 64, &limits),
            Err(LedgerError::MiningAborted { attempts: 1_000 })
        );
    }

    #[test]
    fn cancelled_token_aborts_before_first_attempt() {
        let token = CancelToken::new();
        token.cancel();
        let limits = MiningLimits::unbounded().with_cancel(token.clone());
        assert!(token.is_cancelled());
        assert_eq!(
            mine_block(candidate(), 64, &limits),
            Err(LedgerError::MiningAborted { attempts: 0 })
        );
    }

    #[test]
    fn cancel_from_another_thread_stops_search() {
        let token = CancelToken::new();
        let limits = MiningLimits::unbounded().with_cancel(token.clone());
        let handle = std::thread::spawn(move || mine_block(candidate(), 64, &limits));
        std::thread::sleep(std::time::Duration::from_millis(50));
        token.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(LedgerError::MiningAborted { .. })));
    }
}
