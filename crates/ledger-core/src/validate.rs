use crate::{Block, ChainViolation};

/// Walk `blocks` from index 1 and return the first integrity violation.
///
/// For every non-genesis block: each transaction id must match its content,
/// the stored hash must match the recomputed hash, and `prev_hash` must equal
/// the preceding block's stored hash. Genesis is the root of trust and is not
/// re-hashed.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainViolation> {
    if blocks.is_empty() {
        return Err(ChainViolation::Empty);
    }

    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);

        if let Some(tx) = block.transactions.iter().find(|tx| tx.id != tx.compute_id()) {
            return Err(ChainViolation::TransactionIdMismatch {
                index: block.index,
                tx_id: tx.id.clone(),
            });
        }
        if block.hash != block.compute_hash() {
            return Err(ChainViolation::HashMismatch { index: block.index });
        }
        if block.prev_hash != prev.hash {
            return Err(ChainViolation::BrokenLink { index: block.index });
        }
    }
    Ok(())
}
