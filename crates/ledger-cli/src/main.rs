mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{LedgerConfig, MiningStrategy};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Drive a local proof-of-work ledger")]
struct Cli {
    /// JSON file with `difficulty`, `mining_reward` and `mining`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Leading zero hex digits required of each block hash
    #[arg(long, global = true)]
    difficulty: Option<usize>,

    /// Reward paid to the miner of each block
    #[arg(long, global = true)]
    reward: Option<u64>,

    /// Search nonces across all cores
    #[arg(long, global = true)]
    parallel: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue a transfer, mine it, validate, then tamper and validate again
    Demo,
    /// Mine blocks of random transfers
    Mine {
        #[arg(long, default_value_t = 3)]
        blocks: usize,
        /// Transfers queued before each block
        #[arg(long, default_value_t = 5)]
        txs: usize,
        #[arg(long, default_value = "miner")]
        miner: String,
        /// Give up on a block after this many hash attempts
        #[arg(long)]
        max_attempts: Option<u64>,
        /// Print the resulting ledger as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a JSON-serialized ledger
    Verify { path: PathBuf },
    /// Several miners racing on one shared ledger
    Race {
        #[arg(long, default_value_t = 3)]
        miners: usize,
        #[arg(long, default_value_t = 2)]
        rounds: usize,
        /// Cancel outstanding searches after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

impl Cli {
    /// Defaults, then the config file, then command-line overrides.
    fn ledger_config(&self) -> Result<LedgerConfig> {
        let mut config = match &self.config {
            Some(path) => LedgerConfig::from_file(path)?,
            None => LedgerConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if let Some(reward) = self.reward {
            config.mining_reward = reward;
        }
        if self.parallel {
            config.mining = MiningStrategy::Parallel;
        }
        config.validate().context("invalid ledger configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    match &cli.cmd {
        Command::Demo => commands::demo(&cli.ledger_config()?),
        Command::Mine {
            blocks,
            txs,
            miner,
            max_attempts,
            json,
        } => commands::mine(
            &cli.ledger_config()?,
            *blocks,
            *txs,
            miner,
            *max_attempts,
            *json,
        ),
        Command::Verify { path } => commands::verify(path),
        Command::Race {
            miners,
            rounds,
            timeout_secs,
        } => commands::race(&cli.ledger_config()?, *miners, *rounds, *timeout_secs).await,
    }
}
