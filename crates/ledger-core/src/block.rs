use serde::{Deserialize, Serialize};

use crate::constants::GENESIS_PREV_HASH;
use crate::hash::FieldHasher;
use crate::Transaction;

/// A batch of transactions sealed onto the chain.
///
/// `hash` is only meaningful once the block has been sealed: while a block is a
/// mining candidate its `nonce` and `hash` are rewritten on every attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub prev_hash: String,
    pub hash: String,
    pub nonce: u64,
}

/// Fingerprint of a block's header fields and transaction ids, in that order.
pub fn block_hash<'a, I>(
    index: u64,
    timestamp: u64,
    prev_hash: &str,
    nonce: u64,
    tx_ids: I,
) -> String
where
    I: ExactSizeIterator<Item = &'a str>,
{
    let mut h = FieldHasher::new();
    h.u64(index).u64(timestamp).str(prev_hash).u64(nonce);
    h.u64(tx_ids.len() as u64);
    for id in tx_ids {
        h.str(id);
    }
    h.finalize_hex()
}

impl Block {
    /// An unsealed candidate at nonce 0. Its `hash` is already filled in for
    /// nonce 0 so a candidate is never observed with an empty hash.
    pub fn candidate(
        index: u64,
        timestamp: u64,
        prev_hash: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            prev_hash: prev_hash.into(),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The root of trust: index 0, no transactions, sentinel prev hash and no
    /// proof-of-work.
    pub fn genesis(timestamp: u64) -> Self {
        Self::candidate(0, timestamp, GENESIS_PREV_HASH, Vec::new())
    }

    pub fn compute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        block_hash(
            self.index,
            self.timestamp,
            &self.prev_hash,
            nonce,
            self.transactions.iter().map(|tx| tx.id.as_str()),
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
