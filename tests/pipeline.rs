//! Full pipeline test: parquet fixtures in, SQLite rows out.

use alloy::primitives::{Address, B256};
use arb_analysis::bundle::bundle_swaps;
use arb_analysis::cycle::{classify, ClassifierConfig};
use arb_analysis::normalize::{normalize_events, NormalizerConfig};
use arb_data::logs::{filter_by_block_range, read_v2_swap_logs};
use arb_data::registry::{write_pools_parquet, write_tokens_parquet, PoolRecord, TokenRecord};
use arb_data::store::{ArbTxRow, Store};
use arb_data::testutil::{write_v2_fixture, V2Row};
use arb_data::Registry;

const WETH: u8 = 1;
const USDC: u8 = 2;

fn v2_row(
    tx: u8,
    block: u64,
    log_index: u64,
    pool: u8,
    amounts_in: (f64, f64),
    amounts_out: (f64, f64),
) -> V2Row {
    V2Row {
        chain_id: 10,
        block_number: block,
        transaction_index: 7,
        transaction_hash: B256::repeat_byte(tx),
        log_index,
        pool: Address::repeat_byte(pool),
        sender: Address::repeat_byte(tx),
        recipient: Address::repeat_byte(0xf0),
        amount0_in: amounts_in.0,
        amount1_in: amounts_in.1,
        amount0_out: amounts_out.0,
        amount1_out: amounts_out.1,
    }
}

#[test]
fn parquet_to_store_round_trip() {
    let dir = tempfile::tempdir().expect("create temp dir");

    // Metadata files the way harvest writes them.
    let pools_path = dir.path().join("testnet_pools.parquet");
    let tokens_path = dir.path().join("testnet_tokens.parquet");
    write_pools_parquet(
        &pools_path,
        &[
            PoolRecord {
                address: Address::repeat_byte(0x10),
                token0: Address::repeat_byte(WETH),
                token1: Address::repeat_byte(USDC),
                is_v3: false,
            },
            PoolRecord {
                address: Address::repeat_byte(0x11),
                token0: Address::repeat_byte(WETH),
                token1: Address::repeat_byte(USDC),
                is_v3: false,
            },
        ],
    )
    .expect("write pools");
    write_tokens_parquet(
        &tokens_path,
        &[
            TokenRecord {
                address: Address::repeat_byte(WETH),
                symbol: "WETH".to_string(),
                decimals: 18,
            },
            TokenRecord {
                address: Address::repeat_byte(USDC),
                symbol: "USDC".to_string(),
                decimals: 6,
            },
        ],
    )
    .expect("write tokens");

    // Swap logs: one profitable cycle at block 1000, one ordinary swap
    // at block 1001, one out-of-range cycle at block 5000.
    let logs_path = dir.path().join("testnet__logs__v2.parquet");
    write_v2_fixture(
        &logs_path,
        &[
            v2_row(0xaa, 1000, 1, 0x10, (1e18, 0.0), (0.0, 2_000e6)),
            v2_row(0xaa, 1000, 2, 0x11, (0.0, 2_000e6), (1.05e18, 0.0)),
            v2_row(0xbb, 1001, 1, 0x10, (2e18, 0.0), (0.0, 3_999e6)),
            v2_row(0xcc, 5000, 1, 0x10, (1e18, 0.0), (0.0, 2_000e6)),
            v2_row(0xcc, 5000, 2, 0x11, (0.0, 2_000e6), (1.01e18, 0.0)),
        ],
    );

    // Ingest, bound to the scanned range, normalize, bundle, classify.
    let registry = Registry::from_parquet(&pools_path, &tokens_path).expect("load registry");
    let events = read_v2_swap_logs(&logs_path).expect("read logs");
    assert_eq!(events.len(), 5);
    let events = filter_by_block_range(events, 900, 1100);

    let swaps = normalize_events(&events, &registry, &NormalizerConfig::default());
    let bundles = bundle_swaps(swaps);
    assert_eq!(bundles.len(), 2, "two transactions in range");

    let rows: Vec<ArbTxRow> = bundles
        .iter()
        .filter_map(|bundle| classify(bundle, &ClassifierConfig::default()))
        .map(|report| ArbTxRow {
            tx_hash: format!("{:#x}", report.transaction_hash),
            chain_id: report.chain_id,
            block_number: report.block_number,
            tx_index: report.transaction_index,
            profit_token: report.profit_token.symbol.clone(),
            profit_token_address: format!("{:#x}", report.profit_token.address),
            profit_amount: report.profit_amount,
            path: report.path.clone(),
            senders: report
                .senders
                .iter()
                .map(|address| format!("{address:#x}"))
                .collect(),
        })
        .collect();
    assert_eq!(rows.len(), 1, "only the cycle classifies");

    // Persist and read back.
    let db_path = dir.path().join("arb.sqlite");
    let store = Store::new(db_path.to_str().expect("utf8 path")).expect("open store");
    store.insert_arb_rows(&rows).expect("insert rows");
    store.mark_chunk_processed(10, 900, 1100).expect("mark chunk");

    let loaded = store.get_arb_rows(10).expect("load rows");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].tx_hash, format!("{:#x}", B256::repeat_byte(0xaa)));
    assert_eq!(loaded[0].block_number, 1000);
    assert_eq!(loaded[0].profit_token, "WETH");
    assert!((loaded[0].profit_amount - 0.05).abs() < 1e-12);
    assert_eq!(loaded[0].path, "WETH->USDC->WETH");
    assert_eq!(loaded[0].senders.len(), 1, "same sender on both hops");

    assert!(store.is_chunk_processed(10, 900, 1100).expect("chunk query"));
    let stats = store.stats(10).expect("stats");
    assert_eq!(stats.arb_count, 1);
    assert_eq!(stats.min_block, 1000);
}
