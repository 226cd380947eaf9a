//! Canonical swap records.
//!
//! A [`Swap`] is the protocol-neutral form of one Swap event: the raw
//! pool-side deltas of the source event plus sign-flipped,
//! decimal-normalized user-side deltas. Positive user delta means the
//! user received that token. V3-only state (post-swap price, liquidity,
//! tick) rides along in an optional detail block so the classifier never
//! branches on protocol kind.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use arb_data::types::{Pool, Token};

/// Concentrated-liquidity extras carried by V3 swap events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct V3Details {
    /// Post-swap square-root price, Q64.96.
    pub sqrt_price_x96: f64,
    /// Post-swap in-range liquidity.
    pub liquidity: f64,
    /// Post-swap tick.
    pub tick: i32,
    /// Spot price derived from `sqrt_price_x96`, decimal-adjusted.
    pub spot_price: f64,
}

/// One canonical swap. Identity is `(transaction_hash, log_index)`.
#[derive(Clone, Debug)]
pub struct Swap {
    /// Chain the swap executed on.
    pub chain_id: u64,
    /// Block number.
    pub block_number: u64,
    /// Transaction index within the block.
    pub transaction_index: u64,
    /// Hash of the containing transaction.
    pub transaction_hash: B256,
    /// Log index; defines emission order within the transaction.
    pub log_index: u64,
    /// The pool the event was emitted by.
    pub pool: Arc<Pool>,
    /// Event signature topic.
    pub topic0: B256,
    /// Swap initiator as reported by the event.
    pub sender: Address,
    /// Swap recipient as reported by the event.
    pub recipient: Address,
    /// Pool-side token0 delta, raw units.
    pub pool_delta_t0: f64,
    /// Pool-side token1 delta, raw units.
    pub pool_delta_t1: f64,
    /// User-side token0 delta, decimal-normalized. Positive = received.
    pub user_delta_t0: f64,
    /// User-side token1 delta, decimal-normalized. Positive = received.
    pub user_delta_t1: f64,
    /// Whether the user's net token0 delta is positive.
    pub token0_buy: bool,
    /// Execution price as `-user_delta_t1 / user_delta_t0`, or 0.0 when
    /// the token0 delta is exactly zero. The sign carries the swap
    /// direction; consumers may rely on it.
    pub execution_price: f64,
    /// V3-only post-swap state.
    pub v3: Option<V3Details>,
}

impl Swap {
    /// Token the user paid into this hop.
    pub fn token_in(&self) -> &Arc<Token> {
        if self.token0_buy {
            &self.pool.token1
        } else {
            &self.pool.token0
        }
    }

    /// Token the user received from this hop.
    pub fn token_out(&self) -> &Arc<Token> {
        if self.token0_buy {
            &self.pool.token0
        } else {
            &self.pool.token1
        }
    }
}

/// All swaps of one transaction, ordered by log index.
#[derive(Clone, Debug)]
pub struct SwapBundle {
    /// Transaction hash (identity).
    pub transaction_hash: B256,
    /// Block number.
    pub block_number: u64,
    /// Transaction index within the block.
    pub transaction_index: u64,
    /// Chain id.
    pub chain_id: u64,
    /// Member swaps, sorted by log index.
    pub swaps: Vec<Swap>,
}
