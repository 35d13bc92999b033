use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{REWARD_DATA_KEY, REWARD_DATA_VALUE, SYSTEM_ADDRESS};
use crate::hash::FieldHasher;
use crate::{unix_now, LedgerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Value moved between two caller-supplied addresses.
    Transfer,
    /// Synthesized by the miner of a block, paid from [`SYSTEM_ADDRESS`].
    MiningReward,
}

impl TransactionKind {
    fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::MiningReward => "mining_reward",
        }
    }
}

/// A transfer of `amount` base units.
///
/// `id` is content-addressed: it is the hex SHA-256 of every other field, so
/// any edit to a sealed transaction is visible as an id mismatch. Two
/// transactions with identical content share an id; the ledger does not
/// deduplicate them.
///
/// `signature` is carried opaquely and never verified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub timestamp: u64,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Transaction {
    pub fn transfer(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self::transfer_at(from, to, amount, unix_now())
    }

    pub fn transfer_at(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: u64,
        timestamp: u64,
    ) -> Self {
        Self::build(
            TransactionKind::Transfer,
            from.into(),
            to.into(),
            amount,
            timestamp,
        )
    }

    /// The block reward paid to `miner`.
    pub fn reward(miner: impl Into<String>, amount: u64, timestamp: u64) -> Self {
        let mut tx = Self {
            id: String::new(),
            kind: TransactionKind::MiningReward,
            from: SYSTEM_ADDRESS.to_string(),
            to: miner.into(),
            amount,
            timestamp,
            signature: String::new(),
            data: BTreeMap::new(),
        };
        tx.data.insert(
            REWARD_DATA_KEY.to_string(),
            Value::String(REWARD_DATA_VALUE.to_string()),
        );
        tx.id = tx.compute_id();
        tx
    }

    fn build(kind: TransactionKind, from: String, to: String, amount: u64, timestamp: u64) -> Self {
        let mut tx = Self {
            id: String::new(),
            kind,
            from,
            to,
            amount,
            timestamp,
            signature: String::new(),
            data: BTreeMap::new(),
        };
        tx.id = tx.compute_id();
        tx
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self.id = self.compute_id();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self.id = self.compute_id();
        self
    }

    /// Recompute the content address from the current field values.
    pub fn compute_id(&self) -> String {
        let mut h = FieldHasher::new();
        h.str(self.kind.as_str())
            .str(&self.from)
            .str(&self.to)
            .u64(self.amount)
            .u64(self.timestamp)
            .str(&self.signature)
            .u64(self.data.len() as u64);
        for (key, value) in &self.data {
            h.str(key).str(&value.to_string());
        }
        h.finalize_hex()
    }

    pub fn is_reward(&self) -> bool {
        self.kind == TransactionKind::MiningReward
    }

    /// Checks applied before a caller-supplied transaction enters the pool.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.id.is_empty() {
            return Err(LedgerError::InvalidTransaction("missing id".into()));
        }
        if self.from.is_empty() {
            return Err(LedgerError::InvalidTransaction("missing sender".into()));
        }
        if self.to.is_empty() {
            return Err(LedgerError::InvalidTransaction("missing recipient".into()));
        }
        let reward_marker = self
            .data
            .get(REWARD_DATA_KEY)
            .is_some_and(|v| v.as_str() == Some(REWARD_DATA_VALUE));
        if self.is_reward() || self.from == SYSTEM_ADDRESS || reward_marker {
            return Err(LedgerError::InvalidTransaction(
                "mining rewards are issued by the ledger".into(),
            ));
        }
        if self.id != self.compute_id() {
            return Err(LedgerError::InvalidTransaction(format!(
                "id {} does not match content",
                self.id
            )));
        }
        Ok(())
    }
}
