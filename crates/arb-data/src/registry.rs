//! Pool and token metadata registry.
//!
//! Reference data is resolved once per chain (see [`crate::rpc`]) and
//! then shared read-only by the whole pipeline: pools hold `Arc`s to
//! their tokens, and the same token instance is shared by every pool
//! that includes it. A lookup miss is a skip signal for the caller, not
//! an error; the pipeline tolerates partial metadata coverage.
//!
//! On disk the registry is two parquet files per chain, as produced by
//! the `harvest` command:
//!
//! - `<chain>_pools.parquet`: `pool_address`, `token0`, `token1`, `is_v3`
//! - `<chain>_tokens.parquet`: `contract_address`, `symbol`, `decimals`

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::Address;
use arrow::array::{
    ArrayRef, BooleanArray, BooleanBuilder, StringArray, StringBuilder, UInt32Array,
    UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use eyre::{Context, ContextCompat, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::types::{Pool, Token};

/// Flat pool row as stored in the pools parquet file.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolRecord {
    /// Pool contract address.
    pub address: Address,
    /// token0 contract address.
    pub token0: Address,
    /// token1 contract address.
    pub token1: Address,
    /// Concentrated-liquidity pool.
    pub is_v3: bool,
}

/// Flat token row as stored in the tokens parquet file.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenRecord {
    /// Token contract address.
    pub address: Address,
    /// Token symbol.
    pub symbol: String,
    /// ERC-20 decimals.
    pub decimals: u8,
}

/// Read-only pool/token lookup for one chain.
#[derive(Debug, Default)]
pub struct Registry {
    pools: HashMap<Address, Arc<Pool>>,
    tokens: HashMap<Address, Arc<Token>>,
}

impl Registry {
    /// Build a registry from flat records.
    ///
    /// Pools referencing a token without a metadata row are dropped with
    /// a warning; the rest of the registry still loads.
    pub fn from_records(pools: &[PoolRecord], tokens: &[TokenRecord]) -> Self {
        let mut registry = Registry::default();
        for token in tokens {
            registry.tokens.insert(
                token.address,
                Arc::new(Token {
                    address: token.address,
                    symbol: token.symbol.clone(),
                    decimals: token.decimals,
                }),
            );
        }

        for pool in pools {
            let resolved = (
                registry.tokens.get(&pool.token0).cloned(),
                registry.tokens.get(&pool.token1).cloned(),
            );
            let (Some(token0), Some(token1)) = resolved else {
                tracing::warn!(
                    pool = %pool.address,
                    "pool references token without metadata, dropping"
                );
                continue;
            };
            registry.pools.insert(
                pool.address,
                Arc::new(Pool {
                    address: pool.address,
                    token0,
                    token1,
                    is_v3: pool.is_v3,
                }),
            );
        }
        registry
    }

    /// Load a registry from the per-chain parquet file pair.
    ///
    /// # Errors
    /// Returns error if either file cannot be read or has a bad schema.
    pub fn from_parquet(pools_path: &Path, tokens_path: &Path) -> Result<Self> {
        let tokens = read_tokens_parquet(tokens_path)?;
        let pools = read_pools_parquet(pools_path)?;
        let registry = Self::from_records(&pools, &tokens);
        tracing::info!(
            pools = registry.pools.len(),
            tokens = registry.tokens.len(),
            "loaded metadata registry"
        );
        Ok(registry)
    }

    /// Resolve a pool by its contract address. `None` means the swap
    /// referencing this pool should be skipped.
    pub fn resolve_pool(&self, address: Address) -> Option<&Arc<Pool>> {
        self.pools.get(&address)
    }

    /// Resolve a token by its contract address.
    pub fn resolve_token(&self, address: Address) -> Option<&Arc<Token>> {
        self.tokens.get(&address)
    }

    /// Number of pools in the registry.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// All pool and token contract addresses known to this registry.
    /// These are mundane DEX infrastructure for trace filtering purposes.
    pub fn known_addresses(&self) -> HashSet<Address> {
        self.pools
            .keys()
            .chain(self.tokens.keys())
            .copied()
            .collect()
    }
}

/// Read the pools parquet file.
///
/// # Errors
/// Returns error on I/O failure or schema mismatch; rows with
/// unparseable addresses are skipped with a warning.
pub fn read_pools_parquet(path: &Path) -> Result<Vec<PoolRecord>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("failed to open pools parquet: {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .wrap_err("failed to parse parquet metadata")?
        .build()
        .wrap_err("failed to build parquet record batch reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.wrap_err("failed to read record batch")?;
        let address = string_column(&batch, "pool_address")?;
        let token0 = string_column(&batch, "token0")?;
        let token1 = string_column(&batch, "token1")?;
        let is_v3 = batch
            .column(batch.schema().index_of("is_v3").context("column is_v3 not found")?)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .context("column is_v3 is not boolean type")?
            .clone();

        for row in 0..batch.num_rows() {
            let parsed = (
                address.value(row).parse::<Address>(),
                token0.value(row).parse::<Address>(),
                token1.value(row).parse::<Address>(),
            );
            let (Ok(address), Ok(token0), Ok(token1)) = parsed else {
                tracing::warn!(row, "pools parquet row has unparseable address, skipping");
                continue;
            };
            records.push(PoolRecord {
                address,
                token0,
                token1,
                is_v3: is_v3.value(row),
            });
        }
    }
    Ok(records)
}

/// Read the tokens parquet file.
///
/// # Errors
/// Returns error on I/O failure or schema mismatch.
pub fn read_tokens_parquet(path: &Path) -> Result<Vec<TokenRecord>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("failed to open tokens parquet: {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .wrap_err("failed to parse parquet metadata")?
        .build()
        .wrap_err("failed to build parquet record batch reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.wrap_err("failed to read record batch")?;
        let address = string_column(&batch, "contract_address")?;
        let symbol = string_column(&batch, "symbol")?;
        let decimals = batch
            .column(
                batch
                    .schema()
                    .index_of("decimals")
                    .context("column decimals not found")?,
            )
            .as_any()
            .downcast_ref::<UInt32Array>()
            .context("column decimals is not u32 type")?
            .clone();

        for row in 0..batch.num_rows() {
            let Ok(address) = address.value(row).parse::<Address>() else {
                tracing::warn!(row, "tokens parquet row has unparseable address, skipping");
                continue;
            };
            records.push(TokenRecord {
                address,
                symbol: symbol.value(row).to_string(),
                decimals: decimals.value(row) as u8,
            });
        }
    }
    Ok(records)
}

/// Write the pools parquet file.
///
/// # Errors
/// Returns error on I/O or arrow failure.
pub fn write_pools_parquet(path: &Path, records: &[PoolRecord]) -> Result<()> {
    let mut address = StringBuilder::new();
    let mut token0 = StringBuilder::new();
    let mut token1 = StringBuilder::new();
    let mut is_v3 = BooleanBuilder::new();
    for record in records {
        address.append_value(record.address.to_string());
        token0.append_value(record.token0.to_string());
        token1.append_value(record.token1.to_string());
        is_v3.append_value(record.is_v3);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("pool_address", DataType::Utf8, false),
        Field::new("token0", DataType::Utf8, false),
        Field::new("token1", DataType::Utf8, false),
        Field::new("is_v3", DataType::Boolean, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(address.finish()),
        Arc::new(token0.finish()),
        Arc::new(token1.finish()),
        Arc::new(is_v3.finish()),
    ];
    write_parquet(path, schema, columns)
}

/// Write the tokens parquet file.
///
/// # Errors
/// Returns error on I/O or arrow failure.
pub fn write_tokens_parquet(path: &Path, records: &[TokenRecord]) -> Result<()> {
    let mut address = StringBuilder::new();
    let mut symbol = StringBuilder::new();
    let mut decimals = UInt32Builder::new();
    for record in records {
        address.append_value(record.address.to_string());
        symbol.append_value(&record.symbol);
        decimals.append_value(u32::from(record.decimals));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("contract_address", DataType::Utf8, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("decimals", DataType::UInt32, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(address.finish()),
        Arc::new(symbol.finish()),
        Arc::new(decimals.finish()),
    ];
    write_parquet(path, schema, columns)
}

fn write_parquet(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<()> {
    let batch =
        RecordBatch::try_new(schema.clone(), columns).wrap_err("failed to build record batch")?;
    let file = std::fs::File::create(path)
        .wrap_err_with(|| format!("failed to create parquet file: {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).wrap_err("failed to create arrow writer")?;
    writer.write(&batch).wrap_err("failed to write record batch")?;
    writer.close().wrap_err("failed to close arrow writer")?;
    Ok(())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column(
            batch
                .schema()
                .index_of(name)
                .context(format!("column {name} not found"))?,
        )
        .as_any()
        .downcast_ref::<StringArray>()
        .context(format!("column {name} is not string type"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn sample_records() -> (Vec<PoolRecord>, Vec<TokenRecord>) {
        let pools = vec![
            PoolRecord {
                address: addr(0x10),
                token0: addr(1),
                token1: addr(2),
                is_v3: false,
            },
            PoolRecord {
                address: addr(0x11),
                token0: addr(2),
                token1: addr(3),
                is_v3: true,
            },
        ];
        let tokens = vec![
            TokenRecord {
                address: addr(1),
                symbol: "WETH".to_string(),
                decimals: 18,
            },
            TokenRecord {
                address: addr(2),
                symbol: "USDC".to_string(),
                decimals: 6,
            },
            TokenRecord {
                address: addr(3),
                symbol: "DAI".to_string(),
                decimals: 18,
            },
        ];
        (pools, tokens)
    }

    #[test]
    fn tokens_are_shared_across_pools() {
        let (pools, tokens) = sample_records();
        let registry = Registry::from_records(&pools, &tokens);

        let a = registry.resolve_pool(addr(0x10)).expect("pool present");
        let b = registry.resolve_pool(addr(0x11)).expect("pool present");
        assert!(
            Arc::ptr_eq(&a.token1, &b.token0),
            "the shared token must be one instance"
        );
    }

    #[test]
    fn pool_with_unknown_token_is_dropped() {
        let (mut pools, tokens) = sample_records();
        pools.push(PoolRecord {
            address: addr(0x12),
            token0: addr(1),
            token1: addr(9), // no metadata row
            is_v3: false,
        });
        let registry = Registry::from_records(&pools, &tokens);
        assert_eq!(registry.pool_count(), 2);
        assert!(registry.resolve_pool(addr(0x12)).is_none());
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let pools_path = dir.path().join("test_pools.parquet");
        let tokens_path = dir.path().join("test_tokens.parquet");
        let (pools, tokens) = sample_records();

        write_pools_parquet(&pools_path, &pools).expect("write pools");
        write_tokens_parquet(&tokens_path, &tokens).expect("write tokens");

        assert_eq!(read_pools_parquet(&pools_path).expect("read pools"), pools);
        assert_eq!(
            read_tokens_parquet(&tokens_path).expect("read tokens"),
            tokens
        );

        let registry = Registry::from_parquet(&pools_path, &tokens_path).expect("load registry");
        assert_eq!(registry.pool_count(), 2);
        let pool = registry.resolve_pool(addr(0x11)).expect("pool present");
        assert_eq!(pool.token0.symbol, "USDC");
        assert_eq!(pool.token1.decimals, 18);
        assert!(pool.is_v3);
    }

    #[test]
    fn known_addresses_cover_pools_and_tokens() {
        let (pools, tokens) = sample_records();
        let registry = Registry::from_records(&pools, &tokens);
        let known = registry.known_addresses();
        assert_eq!(known.len(), 5);
        assert!(known.contains(&addr(0x10)));
        assert!(known.contains(&addr(3)));
    }
}
