//! Type definitions for pool/token reference data and decoded swap events.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use alloy::primitives::{b256, Address, B256};

/// V2 Swap event signature:
/// `keccak256("Swap(address,uint256,uint256,uint256,uint256,address)")`.
pub const V2_SWAP_TOPIC0: B256 =
    b256!("d78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822");

/// V3 Swap event signature:
/// `keccak256("Swap(address,address,int256,int256,uint160,uint128,int24)")`.
pub const V3_SWAP_TOPIC0: B256 =
    b256!("c42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67");

/// ERC-20 token reference data, resolved once per chain.
///
/// Identity is the contract address alone: two records with the same
/// address are the same token regardless of symbol or decimals.
#[derive(Clone, Debug)]
pub struct Token {
    /// Token contract address.
    pub address: Address,
    /// Token symbol as reported by the contract (not unique per chain).
    pub symbol: String,
    /// ERC-20 decimals.
    pub decimals: u8,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// AMM pool reference data.
///
/// `token0`/`token1` keep the protocol-defined ordering; the same
/// [`Token`] instance is shared across every pool that includes it.
/// Identity is the pool contract address.
#[derive(Clone, Debug)]
pub struct Pool {
    /// Pool contract address.
    pub address: Address,
    /// First token of the pair (protocol order).
    pub token0: Arc<Token>,
    /// Second token of the pair (protocol order).
    pub token1: Arc<Token>,
    /// Concentrated-liquidity (V3) mechanics vs constant-product (V2).
    pub is_v3: bool,
}

impl PartialEq for Pool {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Pool {}

impl Hash for Pool {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// Protocol-specific amount fields of a decoded Swap event.
///
/// V2 pools emit separate in/out amounts per token; V3 pools emit one
/// signed amount per token plus post-swap price state. Amounts are the
/// f64 columns of the archive extract, in raw (un-normalized) units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SwapPayload {
    /// Constant-product Swap(amount0In, amount1In, amount0Out, amount1Out).
    V2 {
        /// token0 paid into the pool.
        amount0_in: f64,
        /// token1 paid into the pool.
        amount1_in: f64,
        /// token0 paid out to the recipient.
        amount0_out: f64,
        /// token1 paid out to the recipient.
        amount1_out: f64,
    },
    /// Concentrated-liquidity Swap(amount0, amount1, sqrtPriceX96, liquidity, tick).
    V3 {
        /// Signed token0 delta from the pool's perspective.
        amount0: f64,
        /// Signed token1 delta from the pool's perspective.
        amount1: f64,
        /// Post-swap square-root price, Q64.96.
        sqrt_price_x96: f64,
        /// Post-swap in-range liquidity.
        liquidity: f64,
        /// Post-swap tick.
        tick: i32,
    },
}

/// One decoded Swap event row from the archive extract.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSwapEvent {
    /// Chain the event was emitted on.
    pub chain_id: u64,
    /// Block number containing the event.
    pub block_number: u64,
    /// Transaction index within the block.
    pub transaction_index: u64,
    /// Hash of the emitting transaction.
    pub transaction_hash: B256,
    /// Log index within the transaction; unique per transaction and
    /// defines emission order.
    pub log_index: u64,
    /// Address of the emitting pool contract.
    pub pool_address: Address,
    /// Event signature topic.
    pub topic0: B256,
    /// Swap initiator as reported by the event.
    pub sender: Address,
    /// Swap recipient as reported by the event.
    pub recipient: Address,
    /// Protocol-specific amount/price fields.
    pub payload: SwapPayload,
}

impl RawSwapEvent {
    /// Whether this row came from a concentrated-liquidity pool event.
    pub fn is_v3(&self) -> bool {
        matches!(self.payload, SwapPayload::V3 { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn token(addr: u8, symbol: &str, decimals: u8) -> Token {
        let mut bytes = [0u8; 20];
        bytes[19] = addr;
        Token {
            address: Address::from(bytes),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    #[test]
    fn token_identity_is_address_only() {
        let a = token(1, "WETH", 18);
        let b = token(1, "WETH-RELABELED", 6);
        assert_eq!(a, b, "same address must compare equal");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn pool_identity_is_address_only() {
        let t0 = Arc::new(token(1, "WETH", 18));
        let t1 = Arc::new(token(2, "USDC", 6));
        let mut bytes = [0u8; 20];
        bytes[19] = 9;
        let a = Pool {
            address: Address::from(bytes),
            token0: t0.clone(),
            token1: t1.clone(),
            is_v3: false,
        };
        let b = Pool {
            address: Address::from(bytes),
            token0: t1,
            token1: t0,
            is_v3: true,
        };
        assert_eq!(a, b);
    }
}
