//! Per-transaction bundling of canonical swaps.
//!
//! Swaps arrive from mixed V2/V3 sources in no particular order. The
//! bundler groups them by transaction hash (first-seen transaction
//! order is preserved) and sorts each group by log index, which is the
//! emission order the classifier's path walk relies on.

use std::collections::HashMap;

use alloy::primitives::B256;

use crate::swap::{Swap, SwapBundle};

/// Group swaps into per-transaction bundles.
///
/// Duplicate `(transaction_hash, log_index)` pairs (the same event
/// ingested twice) are kept, not dropped, and reported with a warning:
/// the duplication is then visible in the bundle's balance changes
/// instead of being silently hidden.
pub fn bundle_swaps(swaps: Vec<Swap>) -> Vec<SwapBundle> {
    let mut indexer: HashMap<B256, usize> = HashMap::new();
    let mut bundles: Vec<SwapBundle> = Vec::new();

    for swap in swaps {
        match indexer.get(&swap.transaction_hash) {
            Some(&slot) => bundles[slot].swaps.push(swap),
            None => {
                indexer.insert(swap.transaction_hash, bundles.len());
                bundles.push(SwapBundle {
                    transaction_hash: swap.transaction_hash,
                    block_number: swap.block_number,
                    transaction_index: swap.transaction_index,
                    chain_id: swap.chain_id,
                    swaps: vec![swap],
                });
            }
        }
    }

    for bundle in &mut bundles {
        bundle.swaps.sort_by_key(|s| s.log_index);
        for pair in bundle.swaps.windows(2) {
            if pair[0].log_index == pair[1].log_index {
                tracing::warn!(
                    tx = %bundle.transaction_hash,
                    log_index = pair[0].log_index,
                    "duplicate log index within transaction, keeping both swaps"
                );
            }
        }
    }

    tracing::debug!(bundles = bundles.len(), "bundled swaps by transaction");
    bundles
}
