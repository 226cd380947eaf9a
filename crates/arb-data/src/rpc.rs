//! Raw JSON-RPC access for metadata harvesting and call traces.
//!
//! Pools and tokens expose their reference data through four view
//! functions (`token0()`, `token1()`, `symbol()`, `decimals()`), so the
//! harvester issues plain `eth_call` requests with hardcoded selectors
//! instead of pulling in a contract abstraction. Per-address failures
//! are expected (self-destructed pools, non-standard tokens) and are
//! reported to the caller, which skips the address and moves on.

use alloy::primitives::{Address, B256};
use eyre::{eyre, Context, Result};
use serde::Deserialize;

use crate::registry::{PoolRecord, TokenRecord};

/// Function selectors for the minimal pool/token view ABI.
mod selectors {
    /// `token0()`
    pub const TOKEN0: &str = "0x0dfe1681";
    /// `token1()`
    pub const TOKEN1: &str = "0xd21220a7";
    /// `symbol()`
    pub const SYMBOL: &str = "0x95d89b41";
    /// `decimals()`
    pub const DECIMALS: &str = "0x313ce567";
}

/// One frame of a `debug_traceTransaction` callTracer response.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Caller address, hex text.
    pub from: Option<String>,
    /// Callee address, hex text.
    pub to: Option<String>,
    /// Call input data, hex text.
    pub input: Option<String>,
    /// Gas used by the frame, hex text.
    pub gas_used: Option<String>,
    /// Nested calls.
    #[serde(default)]
    pub calls: Vec<CallFrame>,
}

/// Issues metadata and trace queries against one chain's RPC endpoint.
pub struct MetadataFetcher {
    client: reqwest::Client,
    rpc_url: String,
}

impl MetadataFetcher {
    /// Create a fetcher for the given HTTP JSON-RPC endpoint.
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
        }
    }

    /// Resolve a pool's token pair via `token0()`/`token1()`.
    ///
    /// # Errors
    /// Returns error if either call fails or returns non-address data.
    pub async fn fetch_pool(&self, address: Address, is_v3: bool) -> Result<PoolRecord> {
        let token0 = self.call_address(address, selectors::TOKEN0).await?;
        let token1 = self.call_address(address, selectors::TOKEN1).await?;
        Ok(PoolRecord {
            address,
            token0,
            token1,
            is_v3,
        })
    }

    /// Resolve a token's `symbol()` and `decimals()`.
    ///
    /// # Errors
    /// Returns error if either call fails or returns undecodable data.
    pub async fn fetch_token(&self, address: Address) -> Result<TokenRecord> {
        let symbol_data = self.eth_call(address, selectors::SYMBOL).await?;
        let symbol = decode_string_return(&symbol_data)
            .ok_or_else(|| eyre!("undecodable symbol() return from {address}"))?;
        let decimals_data = self.eth_call(address, selectors::DECIMALS).await?;
        let decimals = decode_uint_return(&decimals_data)
            .ok_or_else(|| eyre!("undecodable decimals() return from {address}"))?;
        Ok(TokenRecord {
            address,
            symbol,
            decimals: decimals as u8,
        })
    }

    /// Deployed bytecode length of an address, in bytes.
    ///
    /// # Errors
    /// Returns error if the RPC request fails.
    pub async fn code_len(&self, address: Address) -> Result<usize> {
        let result = self
            .request(
                "eth_getCode",
                serde_json::json!([format!("{address:#x}"), "latest"]),
            )
            .await?;
        let code = result
            .as_str()
            .ok_or_else(|| eyre!("eth_getCode returned non-string result"))?;
        Ok(code.trim_start_matches("0x").len() / 2)
    }

    /// Fetch the callTracer call tree of a transaction.
    ///
    /// # Errors
    /// Returns error if the RPC request fails or the node does not
    /// support `debug_traceTransaction`.
    pub async fn trace_transaction(&self, tx_hash: B256) -> Result<CallFrame> {
        let result = self
            .request(
                "debug_traceTransaction",
                serde_json::json!([format!("{tx_hash:#x}"), {"tracer": "callTracer"}]),
            )
            .await?;
        serde_json::from_value(result).wrap_err("failed to decode callTracer frame")
    }

    async fn call_address(&self, to: Address, selector: &str) -> Result<Address> {
        let data = self.eth_call(to, selector).await?;
        decode_address_return(&data)
            .ok_or_else(|| eyre!("call {selector} on {to} returned non-address data"))
    }

    async fn eth_call(&self, to: Address, selector: &str) -> Result<Vec<u8>> {
        let result = self
            .request(
                "eth_call",
                serde_json::json!([{"to": format!("{to:#x}"), "data": selector}, "latest"]),
            )
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| eyre!("eth_call returned non-string result"))?;
        let bytes = alloy::hex::decode(hex).wrap_err("eth_call returned invalid hex")?;
        if bytes.is_empty() {
            return Err(eyre!("eth_call to {to} with {selector} returned empty data"));
        }
        Ok(bytes)
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response: serde_json::Value = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("{method} request failed"))?
            .json()
            .await
            .wrap_err_with(|| format!("{method} returned invalid JSON"))?;

        if let Some(error) = response.get("error") {
            return Err(eyre!("{method} RPC error: {error}"));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| eyre!("{method} response missing result"))
    }
}

/// Decode a single address return word (right-aligned in 32 bytes).
fn decode_address_return(data: &[u8]) -> Option<Address> {
    if data.len() < 32 {
        return None;
    }
    Some(Address::from_slice(&data[12..32]))
}

/// Decode a single unsigned integer return word.
fn decode_uint_return(data: &[u8]) -> Option<u64> {
    if data.len() < 32 {
        return None;
    }
    let mut value = [0u8; 8];
    value.copy_from_slice(&data[24..32]);
    Some(u64::from_be_bytes(value))
}

/// Decode a `string` return value.
///
/// Standard ABI encoding is offset word + length word + bytes; some
/// older tokens return a fixed `bytes32` instead, handled by trimming
/// trailing NULs.
fn decode_string_return(data: &[u8]) -> Option<String> {
    if data.len() == 32 {
        let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
        return String::from_utf8(trimmed).ok();
    }
    if data.len() < 64 {
        return None;
    }
    let len = decode_uint_return(&data[32..64])? as usize;
    let bytes = data.get(64..64 + len)?;
    String::from_utf8(bytes.to_vec()).ok()
}
