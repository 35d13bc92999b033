pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_PREV_HASH: &str = "0";
pub const SYSTEM_ADDRESS: &str = "SYSTEM";
pub const REWARD_DATA_KEY: &str = "type";
pub const REWARD_DATA_VALUE: &str = "mining_reward";
pub const DEFAULT_DIFFICULTY: usize = 4;
pub const DEFAULT_MINING_REWARD: u64 = 10;
pub const NONCE_BATCH: u64 = 1 << 14;
