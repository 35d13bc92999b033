//! Single-writer proof-of-work ledger: hash-linked blocks, a pending
//! transaction pool, a nonce search and a full-chain integrity check.

pub mod block;
pub mod config;
pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod pow;
pub mod shared;
pub mod transaction;
pub mod validate;

pub use block::{block_hash, Block};
pub use config::LedgerConfig;
pub use error::{ChainViolation, LedgerError};
pub use ledger::Ledger;
pub use pow::{CancelToken, MiningLimits, MiningStrategy};
pub use shared::SharedLedger;
pub use transaction::{Transaction, TransactionKind};
pub use validate::validate_chain;

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. A clock set before 1970 reads as 0.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
