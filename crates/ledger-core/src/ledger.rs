use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    pow::{self, MiningLimits, MiningStrategy},
    unix_now,
    validate::validate_chain,
    Block, ChainViolation, LedgerConfig, LedgerError, Transaction,
};

/// Single-writer chain of sealed blocks plus the pool of transactions waiting
/// for the next one.
///
/// Invariants maintained by this type:
/// - Always contains at least the genesis block.
/// - Blocks are only appended once sealed; nothing in `blocks` is mutated.
/// - `pending` holds exactly the admitted transactions not yet sealed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "LedgerState")]
pub struct Ledger {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    difficulty: usize,
    mining_reward: u64,
    mining: MiningStrategy,
}

/// Unchecked wire form, promoted to a [`Ledger`] only if it has a genesis block,
/// a usable difficulty and a pool of admissible transactions.
#[derive(Deserialize)]
struct LedgerState {
    blocks: Vec<Block>,
    #[serde(default)]
    pending: Vec<Transaction>,
    difficulty: usize,
    mining_reward: u64,
    #[serde(default)]
    mining: MiningStrategy,
}

impl TryFrom<LedgerState> for Ledger {
    type Error = LedgerError;

    fn try_from(state: LedgerState) -> Result<Self, Self::Error> {
        LedgerConfig {
            difficulty: state.difficulty,
            mining_reward: state.mining_reward,
            mining: state.mining,
        }
        .validate()?;
        if state.blocks.is_empty() {
            return Err(LedgerError::MissingGenesis);
        }
        for tx in &state.pending {
            tx.validate()?;
        }
        Ok(Self {
            blocks: state.blocks,
            pending: state.pending,
            difficulty: state.difficulty,
            mining_reward: state.mining_reward,
            mining: state.mining,
        })
    }
}

impl Ledger {
    pub fn new(difficulty: usize, mining_reward: u64) -> Result<Self, LedgerError> {
        Self::from_config(&LedgerConfig::new(difficulty, mining_reward))
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let genesis = Block::genesis(unix_now());
        info!(hash = %genesis.hash, difficulty = config.difficulty, "ledger initialised");
        Ok(Self {
            blocks: vec![genesis],
            pending: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            mining: config.mining,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    pub fn mining_strategy(&self) -> MiningStrategy {
        self.mining
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false since genesis is always present; pairs with [`Self::len`].
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(usize::try_from(index).ok()?)
    }

    /// The most recent sealed block.
    pub fn tip(&self) -> &Block {
        // blocks is never empty: genesis is created in the constructor and
        // required when deserializing.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Admit a caller-supplied transaction into the pool.
    ///
    /// Only structural checks run here; `signature` is not verified.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), LedgerError> {
        tx.validate()?;
        debug!(id = %tx.id, from = %tx.from, to = %tx.to, amount = tx.amount, "transaction queued");
        self.pending.push(tx);
        Ok(())
    }

    /// Seal every pending transaction plus a reward for `miner_address` into a
    /// new block. Searches until a nonce is found.
    pub fn mine_pending_transactions(
        &mut self,
        miner_address: &str,
    ) -> Result<&Block, LedgerError> {
        self.mine_pending_transactions_with(miner_address, &MiningLimits::unbounded())
    }

    /// As [`Self::mine_pending_transactions`], giving up when `limits` says so.
    /// An aborted search leaves the ledger exactly as it was.
    pub fn mine_pending_transactions_with(
        &mut self,
        miner_address: &str,
        limits: &MiningLimits,
    ) -> Result<&Block, LedgerError> {
        let candidate = self.prepare_candidate(miner_address)?;
        let drained = self.pending.len();
        let sealed = pow::mine_with(self.mining, candidate, self.difficulty, limits)?;
        Ok(self.append_sealed(sealed, drained))
    }

    /// Candidate block holding a snapshot of `pending` followed by the reward.
    pub(crate) fn prepare_candidate(&self, miner_address: &str) -> Result<Block, LedgerError> {
        if miner_address.is_empty() {
            return Err(LedgerError::EmptyMinerAddress);
        }
        let now = unix_now();
        let mut transactions = self.pending.clone();
        transactions.push(Transaction::reward(miner_address, self.mining_reward, now));
        Ok(Block::candidate(
            self.blocks.len() as u64,
            now,
            self.tip().hash.clone(),
            transactions,
        ))
    }

    /// Append a sealed block and drop the first `drained` pending transactions
    /// it absorbed.
    pub(crate) fn append_sealed(&mut self, block: Block, drained: usize) -> &Block {
        info!(
            index = block.index,
            nonce = block.nonce,
            hash = %block.hash,
            txs = block.transactions.len(),
            "mined block"
        );
        self.pending.drain(..drained.min(self.pending.len()));
        self.blocks.push(block);
        self.tip()
    }

    /// True when every non-genesis block re-hashes to its stored hash and links
    /// to its predecessor.
    pub fn is_chain_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like [`Self::is_chain_valid`] but reports the first violation.
    pub fn validate(&self) -> Result<(), ChainViolation> {
        validate_chain(&self.blocks).inspect_err(|violation| {
            warn!(%violation, "chain validation failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GENESIS_PREV_HASH, SYSTEM_ADDRESS};
    use crate::pow::meets_difficulty;

    #[test]
    fn new_ledger_has_only_genesis() {
        let ledger = Ledger::new(2, 10).unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_empty());
        let genesis = ledger.tip();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.prev_hash, GENESIS_PREV_HASH);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.hash, genesis.compute_hash());
        assert!(ledger.pending().is_empty());
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn new_rejects_impossible_difficulty() {
        assert_eq!(Ledger::new(65, 10).unwrap_err(), LedgerError::InvalidDifficulty(65));
    }

    #[test]
    fn mine_one_transfer_then_tamper_amount() {
        let mut ledger = Ledger::new(2, 10).unwrap();
        ledger
            .add_transaction(Transaction::transfer("alice", "bob", 5))
            .unwrap();
        assert_eq!(ledger.pending().len(), 1);

        ledger.mine_pending_transactions("miner1").unwrap();
        assert_eq!(ledger.len(), 2);
        let block = &ledger.blocks()[1];
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].from, "alice");
        let reward = &block.transactions[1];
        assert!(reward.is_reward());
        assert_eq!(reward.from, SYSTEM_ADDRESS);
        assert_eq!(reward.to, "miner1");
        assert_eq!(reward.amount, 10);
        assert!(block.hash.starts_with("00"));
        assert!(ledger.is_chain_valid());

        ledger.blocks[1].transactions[0].amount = 6;
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn mining_drains_pool_in_order() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        let txs: Vec<_> = (1..=3)
            .map(|i| Transaction::transfer_at("alice", "bob", i, 1_600_000_000 + i))
            .collect();
        for tx in &txs {
            ledger.add_transaction(tx.clone()).unwrap();
        }
        let block = ledger.mine_pending_transactions("miner").unwrap().clone();
        assert!(ledger.pending().is_empty());
        assert_eq!(block.transactions.len(), txs.len() + 1);
        assert_eq!(&block.transactions[..3], &txs[..]);
        assert_eq!(block.index, 1);
        assert_eq!(block.prev_hash, ledger.blocks()[0].hash);
    }

    #[test]
    fn mining_empty_pool_still_pays_reward() {
        let mut ledger = Ledger::new(1, 7).unwrap();
        let block = ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].amount, 7);
    }

    #[test]
    fn every_block_meets_difficulty_and_links() {
        let mut ledger = Ledger::new(2, 10).unwrap();
        for round in 0..4 {
            ledger
                .add_transaction(Transaction::transfer("alice", "bob", round + 1))
                .unwrap();
            ledger.mine_pending_transactions("miner").unwrap();
        }
        for pair in ledger.blocks().windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].hash);
            assert_eq!(pair[1].index, pair[0].index + 1);
            assert!(meets_difficulty(&pair[1].hash, 2));
        }
    }

    #[test]
    fn aborted_mining_leaves_ledger_untouched() {
        let mut ledger = Ledger::new(64, 10).unwrap();
        ledger
            .add_transaction(Transaction::transfer("alice", "bob", 5))
            .unwrap();
        let limits = MiningLimits::unbounded().with_max_attempts(100);
        let err = ledger
            .mine_pending_transactions_with("miner", &limits)
            .unwrap_err();
        assert_eq!(err, LedgerError::MiningAborted { attempts: 100 });
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending().len(), 1);
        assert!(!ledger.pending()[0].is_reward());
    }

    #[test]
    fn empty_miner_address_is_rejected() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        assert_eq!(
            ledger.mine_pending_transactions("").unwrap_err(),
            LedgerError::EmptyMinerAddress
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn add_transaction_rejects_invalid_and_keeps_pool() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        let bad = Transaction::transfer("", "bob", 5);
        assert!(matches!(
            ledger.add_transaction(bad),
            Err(LedgerError::InvalidTransaction(_))
        ));
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn duplicate_transactions_are_not_deduplicated() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        let tx = Transaction::transfer_at("alice", "bob", 5, 1_600_000_000);
        ledger.add_transaction(tx.clone()).unwrap();
        ledger.add_transaction(tx).unwrap();
        assert_eq!(ledger.pending().len(), 2);
    }

    #[test]
    fn validation_is_idempotent_and_read_only() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();
        let before = ledger.blocks().to_vec();
        for _ in 0..5 {
            assert!(ledger.is_chain_valid());
        }
        assert_eq!(ledger.blocks(), &before[..]);
    }

    #[test]
    fn tampering_any_header_field_is_detected() {
        let mut base = Ledger::new(1, 10).unwrap();
        base.mine_pending_transactions("miner").unwrap();
        base.mine_pending_transactions("miner").unwrap();

        let tampers: [fn(&mut Block); 5] = [
            |b| b.index += 10,
            |b| b.timestamp += 1,
            |b| b.nonce += 1,
            |b| b.prev_hash = "0".into(),
            |b| b.transactions[0].to = "mallory".into(),
        ];
        for tamper in tampers {
            let mut ledger = base.clone();
            tamper(&mut ledger.blocks[1]);
            assert!(!ledger.is_chain_valid());
        }
    }

    #[test]
    fn parallel_strategy_produces_valid_chain() {
        let config = LedgerConfig {
            difficulty: 2,
            mining_reward: 10,
            mining: MiningStrategy::Parallel,
        };
        let mut ledger = Ledger::from_config(&config).unwrap();
        ledger
            .add_transaction(Transaction::transfer("alice", "bob", 5))
            .unwrap();
        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.tip().hash.starts_with("00"));
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn deserialize_requires_genesis() {
        let json = r#"{"blocks": [], "difficulty": 1, "mining_reward": 10}"#;
        let err = serde_json::from_str::<Ledger>(json).unwrap_err();
        assert!(err.to_string().contains("genesis"));
    }

    #[test]
    fn deserialize_rejects_edited_pending_transaction() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        ledger
            .add_transaction(Transaction::transfer_at("alice", "bob", 5, 1_600_000_000))
            .unwrap();
        let mut json = serde_json::to_value(&ledger).unwrap();
        json["pending"][0]["amount"] = 500.into();
        let err = serde_json::from_value::<Ledger>(json).unwrap_err();
        assert!(err.to_string().contains("does not match content"));
    }

    #[test]
    fn deserialize_rejects_forged_pending_reward() {
        let ledger = Ledger::new(1, 10).unwrap();
        let mut json = serde_json::to_value(&ledger).unwrap();
        let forged = vec![Transaction::reward("mallory", 1_000, 1)];
        json["pending"] = serde_json::to_value(forged).unwrap();
        assert!(serde_json::from_value::<Ledger>(json).is_err());
    }

    #[test]
    fn deserialized_pending_pool_mines_valid_block() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        ledger
            .add_transaction(Transaction::transfer("alice", "bob", 5))
            .unwrap();
        let json = serde_json::to_string(&ledger).unwrap();
        let mut restored: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.pending().len(), 1);
        restored.mine_pending_transactions("miner").unwrap();
        assert!(restored.is_chain_valid());
    }

    #[test]
    fn get_block_by_index() {
        let mut ledger = Ledger::new(1, 10).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.get_block(1).map(|b| b.index), Some(1));
        assert!(ledger.get_block(2).is_none());
    }
}
