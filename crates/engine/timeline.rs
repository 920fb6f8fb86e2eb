//! Reshapes a flat transaction history into a contiguous run of block slots.
//!
//! Pure and synchronous: the builder never talks to the chain, it only
//! regroups what the reconciler already fetched.

use std::collections::HashMap;

use chainsync_common::types::{BlockSlot, TransactionRecord};

/// Blocks shown by [`build`].
pub const DEFAULT_DISPLAY_WINDOW: u64 = 8;

/// Builds the trailing [`DEFAULT_DISPLAY_WINDOW`] slots ending at the highest
/// block present in `transactions`.
pub fn build(transactions: &[TransactionRecord]) -> Vec<BlockSlot> {
    build_window(transactions, DEFAULT_DISPLAY_WINDOW)
}

/// Emits one slot for every block in `[max(1, max_block - (window - 1)), max_block]`,
/// ascending. Blocks with no records get an empty slot. Within a slot,
/// records keep their input order; the slot timestamp is the first one seen
/// for that block.
pub fn build_window(transactions: &[TransactionRecord], window: u64) -> Vec<BlockSlot> {
    let Some(max_block) = transactions.iter().map(|tx| tx.block_number).max() else {
        return Vec::new();
    };
    if max_block < 1 || window == 0 {
        return Vec::new();
    }
    let min_block = max_block.saturating_sub(window - 1).max(1);

    let mut by_block: HashMap<u64, (Vec<TransactionRecord>, Option<u64>)> = HashMap::new();
    for tx in transactions {
        if tx.block_number < min_block {
            continue;
        }
        let (records, timestamp) = by_block.entry(tx.block_number).or_default();
        if timestamp.is_none() {
            *timestamp = tx.timestamp;
        }
        records.push(tx.clone());
    }

    (min_block..=max_block)
        .map(|number| {
            let (transactions, timestamp) = by_block.remove(&number).unwrap_or_default();
            BlockSlot {
                number,
                transactions,
                timestamp,
                is_latest: number == max_block,
            }
        })
        .collect()
}
