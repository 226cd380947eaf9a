//! Swap event normalization.
//!
//! Converts raw decoded events of either pool generation into
//! [`Swap`] records with one directional-flow representation:
//!
//! - V2 pool delta per token is `amount_in - amount_out`; V3 events
//!   already carry signed per-token pool deltas.
//! - The user-side delta is the pool delta sign-flipped and divided by
//!   `10^decimals`, so `pool_delta == -user_delta * 10^decimals` holds
//!   exactly for every token.
//!
//! Events whose pool is unknown to the registry (or whose payload
//! contradicts the registry's protocol flag) are skipped with a warning;
//! partial metadata coverage must never fail a batch.

use std::sync::Arc;

use arb_data::types::{Pool, RawSwapEvent, SwapPayload};
use arb_data::Registry;

use crate::swap::{Swap, V3Details};

/// Normalizer options.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizerConfig {
    /// Decimal shift applied to the V3 spot price as `10^shift`.
    /// `None` derives `token1.decimals - token0.decimals` per pool;
    /// setting a fixed value reproduces deployments that hard-code the
    /// shift for a single dominant pair.
    pub spot_price_shift: Option<i32>,
}

/// Normalize one event against its resolved pool.
pub fn normalize_event(
    event: &RawSwapEvent,
    pool: Arc<Pool>,
    config: &NormalizerConfig,
) -> Swap {
    let (pool_delta_t0, pool_delta_t1) = match event.payload {
        SwapPayload::V2 {
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
        } => (amount0_in - amount0_out, amount1_in - amount1_out),
        SwapPayload::V3 {
            amount0, amount1, ..
        } => (amount0, amount1),
    };

    let user_delta_t0 = -pool_delta_t0 / 10f64.powi(i32::from(pool.token0.decimals));
    let user_delta_t1 = -pool_delta_t1 / 10f64.powi(i32::from(pool.token1.decimals));
    let execution_price = if user_delta_t0 != 0.0 {
        -user_delta_t1 / user_delta_t0
    } else {
        0.0
    };

    let v3 = match event.payload {
        SwapPayload::V3 {
            sqrt_price_x96,
            liquidity,
            tick,
            ..
        } => {
            let shift = config
                .spot_price_shift
                .unwrap_or(i32::from(pool.token1.decimals) - i32::from(pool.token0.decimals));
            Some(V3Details {
                sqrt_price_x96,
                liquidity,
                tick,
                spot_price: spot_price(sqrt_price_x96, shift),
            })
        }
        SwapPayload::V2 { .. } => None,
    };

    Swap {
        chain_id: event.chain_id,
        block_number: event.block_number,
        transaction_index: event.transaction_index,
        transaction_hash: event.transaction_hash,
        log_index: event.log_index,
        pool,
        topic0: event.topic0,
        sender: event.sender,
        recipient: event.recipient,
        pool_delta_t0,
        pool_delta_t1,
        user_delta_t0,
        user_delta_t1,
        token0_buy: user_delta_t0 > 0.0,
        execution_price,
        v3,
    }
}

/// Normalize a batch of events, skipping rows the registry cannot
/// resolve. Skips are logged, never fatal.
pub fn normalize_events(
    events: &[RawSwapEvent],
    registry: &Registry,
    config: &NormalizerConfig,
) -> Vec<Swap> {
    let mut swaps = Vec::with_capacity(events.len());
    let mut skipped = 0usize;
    for event in events {
        let Some(pool) = registry.resolve_pool(event.pool_address) else {
            tracing::warn!(
                pool = %event.pool_address,
                tx = %event.transaction_hash,
                "swap references unknown pool, skipping"
            );
            skipped += 1;
            continue;
        };
        if pool.is_v3 != event.is_v3() {
            tracing::warn!(
                pool = %event.pool_address,
                tx = %event.transaction_hash,
                "event protocol disagrees with pool metadata, skipping"
            );
            skipped += 1;
            continue;
        }
        swaps.push(normalize_event(event, pool.clone(), config));
    }
    if skipped > 0 {
        tracing::info!(
            total = events.len(),
            skipped,
            "normalized swap events with skips"
        );
    }
    swaps
}

/// Spot price from a post-swap square-root price:
/// `sqrtPriceX96^2 / 2^192 * 10^shift`.
fn spot_price(sqrt_price_x96: f64, shift: i32) -> f64 {
    (sqrt_price_x96 * sqrt_price_x96) / 2f64.powi(192) * 10f64.powi(shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256};
    use arb_data::registry::{PoolRecord, TokenRecord};
    use arb_data::types::Token;

    fn weth_usdc_pool(is_v3: bool) -> Arc<Pool> {
        Arc::new(Pool {
            address: Address::repeat_byte(0x10),
            token0: Arc::new(Token {
                address: Address::repeat_byte(1),
                symbol: "USDC".to_string(),
                decimals: 6,
            }),
            token1: Arc::new(Token {
                address: Address::repeat_byte(2),
                symbol: "WETH".to_string(),
                decimals: 18,
            }),
            is_v3,
        })
    }

    fn v2_event(amount0_in: f64, amount0_out: f64, amount1_in: f64, amount1_out: f64) -> RawSwapEvent {
        RawSwapEvent {
            chain_id: 10,
            block_number: 100,
            transaction_index: 0,
            transaction_hash: B256::repeat_byte(0xaa),
            log_index: 1,
            pool_address: Address::repeat_byte(0x10),
            topic0: arb_data::types::V2_SWAP_TOPIC0,
            sender: Address::repeat_byte(0x77),
            recipient: Address::repeat_byte(0x88),
            payload: SwapPayload::V2 {
                amount0_in,
                amount1_in,
                amount0_out,
                amount1_out,
            },
        }
    }

    fn v3_event(amount0: f64, amount1: f64, sqrt_price_x96: f64) -> RawSwapEvent {
        RawSwapEvent {
            topic0: arb_data::types::V3_SWAP_TOPIC0,
            payload: SwapPayload::V3 {
                amount0,
                amount1,
                sqrt_price_x96,
                liquidity: 1e15,
                tick: -100_000,
            },
            ..v2_event(0.0, 0.0, 0.0, 0.0)
        }
    }

    #[test]
    fn v2_deltas_and_direction() {
        // User sells 1000 USDC into the pool, receives 0.5 WETH.
        let pool = weth_usdc_pool(false);
        let event = v2_event(1_000_000_000.0, 0.0, 0.0, 5e17);
        let swap = normalize_event(&event, pool, &NormalizerConfig::default());

        assert_eq!(swap.pool_delta_t0, 1_000_000_000.0);
        assert_eq!(swap.pool_delta_t1, -5e17);
        assert_eq!(swap.user_delta_t0, -1000.0);
        assert_eq!(swap.user_delta_t1, 0.5);
        assert!(!swap.token0_buy);
        assert_eq!(swap.token_in().symbol, "USDC");
        assert_eq!(swap.token_out().symbol, "WETH");
        assert!(swap.v3.is_none());
    }

    #[test]
    fn v3_deltas_and_direction() {
        // Pool gains 1 WETH, pays out 2000 USDC: user buys token0.
        let pool = weth_usdc_pool(true);
        let event = v3_event(-2_000_000_000.0, 1e18, 7.9e28);
        let swap = normalize_event(&event, pool, &NormalizerConfig::default());

        assert_eq!(swap.user_delta_t0, 2000.0);
        assert_eq!(swap.user_delta_t1, -1.0);
        assert!(swap.token0_buy);
        assert_eq!(swap.token_in().symbol, "WETH");
        assert_eq!(swap.token_out().symbol, "USDC");
    }

    #[test]
    fn normalization_round_trips_exactly() {
        let pool = weth_usdc_pool(false);
        let event = v2_event(123_456_789.0, 0.0, 0.0, 9.87e17);
        let swap = normalize_event(&event, pool.clone(), &NormalizerConfig::default());

        let restored_t0 = -swap.user_delta_t0 * 10f64.powi(i32::from(pool.token0.decimals));
        let restored_t1 = -swap.user_delta_t1 * 10f64.powi(i32::from(pool.token1.decimals));
        assert_eq!(restored_t0, swap.pool_delta_t0);
        assert_eq!(restored_t1, swap.pool_delta_t1);
    }

    #[test]
    fn execution_price_sign_and_zero_guard() {
        let pool = weth_usdc_pool(false);

        // Sell: t0 delta negative, t1 positive; -t1/t0 is positive.
        let sell = normalize_event(
            &v2_event(1_000_000_000.0, 0.0, 0.0, 5e17),
            pool.clone(),
            &NormalizerConfig::default(),
        );
        assert_eq!(sell.execution_price, 0.5 / 1000.0);

        // Zero token0 delta defines the price as 0 rather than dividing.
        let degenerate = normalize_event(
            &v2_event(0.0, 0.0, 0.0, 5e17),
            pool,
            &NormalizerConfig::default(),
        );
        assert_eq!(degenerate.execution_price, 0.0);
    }

    #[test]
    fn spot_price_shift_derived_and_overridden() {
        let pool = weth_usdc_pool(true);
        let sqrt = 2f64.powi(96);

        // Derived shift is token1.decimals - token0.decimals = 12.
        let derived = normalize_event(&v3_event(-1.0, 1.0, sqrt), pool.clone(), &NormalizerConfig::default());
        let details = derived.v3.expect("v3 details present");
        assert_eq!(details.spot_price, 1e12);

        let overridden = normalize_event(
            &v3_event(-1.0, 1.0, sqrt),
            pool,
            &NormalizerConfig {
                spot_price_shift: Some(0),
            },
        );
        assert_eq!(overridden.v3.expect("v3 details present").spot_price, 1.0);
    }

    #[test]
    fn batch_skips_unresolved_and_mismatched_pools() {
        let registry = Registry::from_records(
            &[PoolRecord {
                address: Address::repeat_byte(0x10),
                token0: Address::repeat_byte(1),
                token1: Address::repeat_byte(2),
                is_v3: false,
            }],
            &[
                TokenRecord {
                    address: Address::repeat_byte(1),
                    symbol: "USDC".to_string(),
                    decimals: 6,
                },
                TokenRecord {
                    address: Address::repeat_byte(2),
                    symbol: "WETH".to_string(),
                    decimals: 18,
                },
            ],
        );

        let known = v2_event(1_000_000.0, 0.0, 0.0, 5e14);
        let mut unknown_pool = known.clone();
        unknown_pool.pool_address = Address::repeat_byte(0x99);
        // V3 payload against a pool registered as V2.
        let mismatched = v3_event(-1.0, 1.0, 2f64.powi(96));

        let swaps = normalize_events(
            &[known, unknown_pool, mismatched],
            &registry,
            &NormalizerConfig::default(),
        );
        assert_eq!(swaps.len(), 1, "only the resolvable V2 event survives");
    }
}
