//! Chain configuration loaded from a JSON file.
//!
//! One entry per chain: RPC endpoint plus the block range the archive
//! extract covers. The RPC URL can be overridden with `ARB_SCAN_RPC_URL`
//! so credentials stay out of checked-in config files.

use std::path::Path;

use eyre::{eyre, Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one chain's scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name used in file prefixes and CLI selection (e.g. "arbitrum").
    pub name: String,
    /// Numeric chain id.
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoint for metadata harvesting.
    pub rpc_url: String,
    /// First block of the scanned range (inclusive).
    pub start_block: u64,
    /// Last block of the scanned range (inclusive).
    pub end_block: u64,
}

/// Top-level scan configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Chains to process.
    pub chains: Vec<ChainConfig>,
}

impl ScanConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config: ScanConfig = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Look up a chain by name.
    ///
    /// # Errors
    /// Returns error naming the known chains if the name is absent.
    pub fn chain(&self, name: &str) -> Result<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.chains.iter().map(|c| c.name.as_str()).collect();
            eyre!("unknown chain '{}'; configured chains: {}", name, known.join(", "))
        })
    }
}

impl ChainConfig {
    /// RPC endpoint, with `ARB_SCAN_RPC_URL` taking precedence when set.
    pub fn rpc_url(&self) -> String {
        std::env::var("ARB_SCAN_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }
}
