use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("difficulty {0} exceeds the 64 hex digits of a block hash")]
    InvalidDifficulty(usize),

    #[error("ledger has no genesis block")]
    MissingGenesis,

    #[error("miner address must not be empty")]
    EmptyMinerAddress,

    #[error("mining aborted after {attempts} attempts")]
    MiningAborted { attempts: u64 },

    #[error("candidate built on {expected_tip} but chain tip is now {actual_tip}")]
    StaleCandidate {
        expected_tip: String,
        actual_tip: String,
    },
}

/// The first integrity violation found while walking a chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    #[error("chain has no genesis block")]
    Empty,

    #[error("block {index}: stored hash does not match recomputed hash")]
    HashMismatch { index: u64 },

    #[error("block {index}: prev_hash does not link to the preceding block")]
    BrokenLink { index: u64 },

    #[error("block {index}: transaction {tx_id} does not match its content")]
    TransactionIdMismatch { index: u64, tx_id: String },
}
