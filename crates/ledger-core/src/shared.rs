use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::{
    pow::{self, MiningLimits},
    validate::validate_chain,
    Block, ChainViolation, Ledger, LedgerError, Transaction,
};

/// A [`Ledger`] shared between threads.
///
/// Every mutation of blocks or pending transactions happens under one lock.
/// Mining only takes the lock to snapshot the candidate and to append it, so
/// readers and writers are not stalled for the length of a nonce search.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A panic while holding the guard cannot leave the ledger half-updated:
        // every mutation is a single push or drain.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the ledger while holding the lock.
    pub fn read<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        f(&self.lock())
    }

    pub fn add_transaction(&self, tx: Transaction) -> Result<(), LedgerError> {
        self.lock().add_transaction(tx)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Always false since genesis is always present; pairs with [`Self::len`].
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending().len()
    }

    pub fn tip_hash(&self) -> String {
        self.lock().tip().hash.clone()
    }

    /// Copy of the sealed blocks, taken under the lock.
    pub fn snapshot(&self) -> Vec<Block> {
        self.lock().blocks().to_vec()
    }

    /// Validate a snapshot; hashing runs without holding the lock.
    pub fn validate(&self) -> Result<(), ChainViolation> {
        validate_chain(&self.snapshot())
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Optimistic mining: build the candidate under the lock, search outside
    /// it, and append only if the tip has not moved in the meantime.
    ///
    /// Transactions queued while the search runs stay pending for the next
    /// block.
    pub fn mine_pending_transactions(
        &self,
        miner_address: &str,
        limits: &MiningLimits,
    ) -> Result<Block, LedgerError> {
        let (candidate, drained, difficulty, strategy) = {
            let ledger = self.lock();
            (
                ledger.prepare_candidate(miner_address)?,
                ledger.pending().len(),
                ledger.difficulty(),
                ledger.mining_strategy(),
            )
        };
        let sealed = pow::mine_with(strategy, candidate, difficulty, limits)?;
        self.commit(sealed, drained)
    }

    fn commit(&self, sealed: Block, drained: usize) -> Result<Block, LedgerError> {
        let mut ledger = self.lock();
        let tip = &ledger.tip().hash;
        if *tip != sealed.prev_hash {
            warn!(index = sealed.index, "discarding stale candidate");
            return Err(LedgerError::StaleCandidate {
                expected_tip: sealed.prev_hash,
                actual_tip: tip.clone(),
            });
        }
        Ok(ledger.append_sealed(sealed, drained).clone())
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
