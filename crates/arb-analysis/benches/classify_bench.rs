//! Benchmarks for the arb-analysis core.
//!
//! Uses synthetic bundles (no I/O, no RPC) for reproducible numbers.
//! Run with: `cargo bench --package arb-analysis`

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use arb_analysis::cycle::{classify, ClassifierConfig};
use arb_analysis::normalize::{normalize_events, NormalizerConfig};
use arb_analysis::swap::{Swap, SwapBundle};
use arb_data::registry::{PoolRecord, TokenRecord};
use arb_data::types::{Pool, RawSwapEvent, SwapPayload, Token, V2_SWAP_TOPIC0};
use arb_data::Registry;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn token(n: u8) -> Arc<Token> {
    Arc::new(Token {
        address: Address::repeat_byte(n),
        symbol: format!("TK{n}"),
        decimals: 18,
    })
}

/// Build a profitable `hops`-token ring: each hop trades 1:1 and the
/// closing hop returns 1% extra of the start token.
fn sample_cycle_bundle(hops: u8) -> SwapBundle {
    let tokens: Vec<Arc<Token>> = (1..=hops).map(token).collect();
    let swaps: Vec<Swap> = (0..hops)
        .map(|i| {
            let token0 = &tokens[i as usize];
            let token1 = &tokens[((i + 1) % hops) as usize];
            let pool = Arc::new(Pool {
                address: Address::repeat_byte(0x80 + i),
                token0: Arc::clone(token0),
                token1: Arc::clone(token1),
                is_v3: false,
            });
            let delta_t1 = if i == hops - 1 { 1.01 } else { 1.0 };
            Swap {
                chain_id: 10,
                block_number: 100,
                transaction_index: 0,
                transaction_hash: B256::repeat_byte(0xaa),
                log_index: u64::from(i),
                pool,
                topic0: V2_SWAP_TOPIC0,
                sender: Address::repeat_byte(0xee),
                recipient: Address::repeat_byte(0xef),
                pool_delta_t0: 1e18,
                pool_delta_t1: -delta_t1 * 1e18,
                user_delta_t0: -1.0,
                user_delta_t1: delta_t1,
                token0_buy: false,
                execution_price: delta_t1,
                v3: None,
            }
        })
        .collect();

    SwapBundle {
        transaction_hash: B256::repeat_byte(0xaa),
        block_number: 100,
        transaction_index: 0,
        chain_id: 10,
        swaps,
    }
}

fn sample_registry() -> Registry {
    let pools = vec![PoolRecord {
        address: Address::repeat_byte(0x80),
        token0: Address::repeat_byte(1),
        token1: Address::repeat_byte(2),
        is_v3: false,
    }];
    let tokens = vec![
        TokenRecord {
            address: Address::repeat_byte(1),
            symbol: "TK1".to_string(),
            decimals: 18,
        },
        TokenRecord {
            address: Address::repeat_byte(2),
            symbol: "TK2".to_string(),
            decimals: 6,
        },
    ];
    Registry::from_records(&pools, &tokens)
}

fn sample_events(count: u64) -> Vec<RawSwapEvent> {
    (0..count)
        .map(|i| RawSwapEvent {
            chain_id: 10,
            block_number: 100 + i / 10,
            transaction_index: i % 10,
            transaction_hash: B256::with_last_byte((i % 251) as u8),
            log_index: i,
            pool_address: Address::repeat_byte(0x80),
            topic0: V2_SWAP_TOPIC0,
            sender: Address::repeat_byte(0xee),
            recipient: Address::repeat_byte(0xef),
            payload: SwapPayload::V2 {
                amount0_in: 1e18,
                amount1_in: 0.0,
                amount0_out: 0.0,
                amount1_out: 2_000e6,
            },
        })
        .collect()
}

/// Classify a wide spread of ring sizes; the walk is linear in hops.
fn bench_classify_rings(c: &mut Criterion) {
    for hops in [2u8, 5, 20] {
        c.bench_function(&format!("classify_{hops}_hop_ring"), |b| {
            b.iter_batched(
                || sample_cycle_bundle(hops),
                |bundle| classify(black_box(&bundle), black_box(&ClassifierConfig::default())),
                criterion::BatchSize::SmallInput,
            );
        });
    }
}

/// Normalize 10k raw V2 events against a one-pool registry.
fn bench_normalize_10k_events(c: &mut Criterion) {
    let registry = sample_registry();
    let events = sample_events(10_000);
    c.bench_function("normalize_10k_events", |b| {
        b.iter(|| {
            normalize_events(
                black_box(&events),
                black_box(&registry),
                black_box(&NormalizerConfig::default()),
            )
        });
    });
}

criterion_group!(benches, bench_classify_rings, bench_normalize_10k_events);
criterion_main!(benches);
