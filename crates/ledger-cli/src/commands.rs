use anyhow::{bail, Context, Result};
use ledger_core::{
    pow::leading_zero_digits, CancelToken, Ledger, LedgerConfig, LedgerError, MiningLimits,
    SharedLedger, Transaction,
};
use rand::Rng;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Serialize)]
struct MineSummary {
    height: usize,
    tip: String,
    valid: bool,
    elapsed_ms: u128,
}

#[derive(Debug, Default)]
struct MinerTally {
    sealed: usize,
    stale: usize,
    aborted: usize,
}

fn random_transfer(rng: &mut impl Rng) -> Transaction {
    Transaction::transfer(
        format!("user-{}", rng.gen_range(0..100)),
        format!("user-{}", rng.gen_range(0..100)),
        rng.gen_range(1..1_000),
    )
}

fn limits_for(max_attempts: Option<u64>) -> MiningLimits {
    match max_attempts {
        Some(n) => MiningLimits::unbounded().with_max_attempts(n),
        None => MiningLimits::unbounded(),
    }
}

pub fn demo(config: &LedgerConfig) -> Result<()> {
    let mut ledger = Ledger::from_config(config)?;
    let genesis = ledger.tip();
    println!(
        "genesis: index={} prev_hash={} hash={}",
        genesis.index, genesis.prev_hash, genesis.hash
    );

    ledger.add_transaction(Transaction::transfer("alice", "bob", 5))?;
    println!("pending: {}", ledger.pending().len());

    let block = ledger.mine_pending_transactions("miner1")?;
    println!(
        "mined block {}: nonce={} hash={} txs={}",
        block.index,
        block.nonce,
        block.hash,
        block.transactions.len()
    );
    for tx in &block.transactions {
        println!("  {} -> {}: {} ({:?})", tx.from, tx.to, tx.amount, tx.kind);
    }
    println!("valid: {}", ledger.is_chain_valid());

    let mut json = serde_json::to_value(&ledger)?;
    json["blocks"][1]["transactions"][0]["amount"] = 6.into();
    let tampered: Ledger = serde_json::from_value(json)?;
    match tampered.validate() {
        Ok(()) => println!("after tampering: valid"),
        Err(violation) => println!("after tampering: invalid ({violation})"),
    }
    Ok(())
}

pub fn mine(
    config: &LedgerConfig,
    blocks: usize,
    txs: usize,
    miner: &str,
    max_attempts: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut ledger = Ledger::from_config(config)?;
    let limits = limits_for(max_attempts);
    let mut rng = rand::thread_rng();
    let started = Instant::now();

    for _ in 0..blocks {
        for _ in 0..txs {
            ledger.add_transaction(random_transfer(&mut rng))?;
        }
        let next = ledger.len();
        let block = ledger
            .mine_pending_transactions_with(miner, &limits)
            .with_context(|| format!("mining block {next}"))?;
        info!(
            index = block.index,
            zeros = leading_zero_digits(&block.hash),
            "block sealed"
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
    } else {
        let summary = MineSummary {
            height: ledger.len() - 1,
            tip: ledger.tip().hash.clone(),
            valid: ledger.is_chain_valid(),
            elapsed_ms: started.elapsed().as_millis(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

pub fn verify(path: &Path) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let ledger: Ledger =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))?;
    match ledger.validate() {
        Ok(()) => {
            println!("valid: {} blocks, {} pending", ledger.len(), ledger.pending().len());
            Ok(())
        }
        Err(violation) => bail!("invalid chain: {violation}"),
    }
}

pub async fn race(
    config: &LedgerConfig,
    miners: usize,
    rounds: usize,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let shared = SharedLedger::new(Ledger::from_config(config)?);
    let token = CancelToken::new();

    if let Some(secs) = timeout_secs {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("timeout reached, cancelling searches");
            token.cancel();
        });
    }

    let mut handles = Vec::with_capacity(miners);
    for m in 0..miners {
        let shared = shared.clone();
        let limits = MiningLimits::unbounded().with_cancel(token.clone());
        handles.push(tokio::task::spawn_blocking(
            move || -> Result<(String, MinerTally), LedgerError> {
                let miner = format!("miner-{m}");
                let mut rng = rand::thread_rng();
                let mut tally = MinerTally::default();
                for _ in 0..rounds {
                    shared.add_transaction(random_transfer(&mut rng))?;
                    match shared.mine_pending_transactions(&miner, &limits) {
                        Ok(_) => tally.sealed += 1,
                        Err(LedgerError::StaleCandidate { .. }) => tally.stale += 1,
                        Err(LedgerError::MiningAborted { .. }) => {
                            tally.aborted += 1;
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok((miner, tally))
            },
        ));
    }

    for handle in handles {
        let (miner, tally) = handle.await??;
        println!(
            "{miner}: sealed={} stale={} aborted={}",
            tally.sealed, tally.stale, tally.aborted
        );
    }
    println!(
        "height={} pending={} valid={}",
        shared.len() - 1,
        shared.pending_len(),
        shared.is_chain_valid()
    );
    Ok(())
}
