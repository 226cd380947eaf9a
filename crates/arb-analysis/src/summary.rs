//! Per-address aggregation over classified transactions.
//!
//! Answers "which addresses keep showing up as senders in arbitrage
//! transactions, and what do they take profit in". Consumes persisted
//! rows, so it can run long after classification without re-reading the
//! raw logs. Bytecode-length enrichment is left to the caller; this
//! module stays RPC-free.

use std::collections::{HashMap, HashSet};

use arb_data::store::{AddressSummaryRow, ArbTxRow};

/// Aggregate classified transactions into per-sender summaries, ordered
/// by descending transaction count (ties by address for determinism).
pub fn summarize_addresses(chain_id: u64, rows: &[ArbTxRow]) -> Vec<AddressSummaryRow> {
    let mut arb_counts: HashMap<&str, u64> = HashMap::new();
    let mut token_counts: HashMap<&str, HashMap<&str, u64>> = HashMap::new();

    for row in rows {
        let distinct: HashSet<&str> = row.senders.iter().map(String::as_str).collect();
        for address in distinct {
            *arb_counts.entry(address).or_insert(0) += 1;
            *token_counts
                .entry(address)
                .or_default()
                .entry(row.profit_token.as_str())
                .or_insert(0) += 1;
        }
    }

    let mut summaries: Vec<AddressSummaryRow> = arb_counts
        .into_iter()
        .map(|(address, arb_count)| {
            let (main_profit_token, main_profit_count) = token_counts[address]
                .iter()
                .map(|(token, count)| (*token, *count))
                // Highest count wins; on ties the lexicographically
                // smallest token, so reruns produce identical rows.
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
                .unwrap_or(("", 0));
            AddressSummaryRow {
                chain_id,
                address: address.to_string(),
                arb_count,
                main_profit_token: main_profit_token.to_string(),
                main_profit_count,
                bytecode_len: None,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.arb_count.cmp(&a.arb_count).then(a.address.cmp(&b.address)));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(hash: &str, profit_token: &str, senders: &[&str]) -> ArbTxRow {
        ArbTxRow {
            tx_hash: hash.to_string(),
            chain_id: 10,
            block_number: 1,
            tx_index: 0,
            profit_token: profit_token.to_string(),
            profit_token_address: "0x00".to_string(),
            profit_amount: 1.0,
            path: String::new(),
            senders: senders.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn counts_and_main_token() {
        let rows = vec![
            row("0x1", "WETH", &["0xaa", "0xbb"]),
            row("0x2", "WETH", &["0xaa"]),
            row("0x3", "USDC", &["0xaa"]),
        ];

        let summaries = summarize_addresses(10, &rows);
        assert_eq!(summaries.len(), 2);

        // 0xaa leads with three transactions, mostly WETH profit.
        assert_eq!(summaries[0].address, "0xaa");
        assert_eq!(summaries[0].arb_count, 3);
        assert_eq!(summaries[0].main_profit_token, "WETH");
        assert_eq!(summaries[0].main_profit_count, 2);

        assert_eq!(summaries[1].address, "0xbb");
        assert_eq!(summaries[1].arb_count, 1);
    }

    #[test]
    fn duplicate_sender_within_one_row_counts_once() {
        let rows = vec![row("0x1", "WETH", &["0xaa", "0xaa"])];
        let summaries = summarize_addresses(10, &rows);
        assert_eq!(summaries[0].arb_count, 1);
    }

    #[test]
    fn main_token_tie_breaks_deterministically() {
        let rows = vec![
            row("0x1", "WETH", &["0xaa"]),
            row("0x2", "USDC", &["0xaa"]),
        ];
        let summaries = summarize_addresses(10, &rows);
        assert_eq!(summaries[0].main_profit_token, "USDC");
        assert_eq!(summaries[0].main_profit_count, 1);
    }

    #[test]
    fn empty_input_empty_output() {
        assert!(summarize_addresses(10, &[]).is_empty());
    }
}
