//! Parquet ingestion of decoded Swap event logs.
//!
//! The archive extract stores one file family per protocol generation.
//! Both share the positional columns `chain_id`, `block_number`,
//! `transaction_index`, `transaction_hash`, `log_index`, `address` and
//! `topic0` (hashes/addresses as raw binary), plus per-protocol event
//! columns:
//!
//! - V2: `event__sender`, `event__to`, `event__amount0In_f64`,
//!   `event__amount1In_f64`, `event__amount0Out_f64`, `event__amount1Out_f64`
//! - V3: `event__sender`, `event__recipient`, `event__amount0_f64`,
//!   `event__amount1_f64`, `event__sqrtPriceX96_f64`, `event__liquidity_f64`,
//!   `event__tick`
//!
//! Rows with missing or malformed required fields are skipped with a
//! debug log; a bad row never fails the batch.

use std::path::Path;

use alloy::primitives::{Address, B256};
use arrow::array::{Array, BinaryArray, Float64Array, Int32Array, UInt64Array};
use arrow::record_batch::RecordBatch;
use eyre::{Context, ContextCompat, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::types::{RawSwapEvent, SwapPayload};

/// Parse a V2 swap-log parquet file into raw events.
///
/// # Errors
/// Returns error if the file cannot be opened, is not valid parquet, or
/// the schema is missing expected columns.
pub fn read_v2_swap_logs(path: &Path) -> Result<Vec<RawSwapEvent>> {
    read_swap_logs(path, false)
}

/// Parse a V3 swap-log parquet file into raw events.
///
/// # Errors
/// Returns error if the file cannot be opened, is not valid parquet, or
/// the schema is missing expected columns.
pub fn read_v3_swap_logs(path: &Path) -> Result<Vec<RawSwapEvent>> {
    read_swap_logs(path, true)
}

/// Keep only events whose block number lies in `start..=end`.
pub fn filter_by_block_range(
    events: Vec<RawSwapEvent>,
    start: u64,
    end: u64,
) -> Vec<RawSwapEvent> {
    events
        .into_iter()
        .filter(|e| e.block_number >= start && e.block_number <= end)
        .collect()
}

fn read_swap_logs(path: &Path, v3: bool) -> Result<Vec<RawSwapEvent>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("failed to open parquet file: {}", path.display()))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .wrap_err("failed to parse parquet metadata")?;
    let reader = builder
        .build()
        .wrap_err("failed to build parquet record batch reader")?;

    let mut events = Vec::new();
    let mut skipped = 0usize;

    for batch_result in reader {
        let batch = batch_result.wrap_err("failed to read record batch")?;
        read_batch(&batch, v3, &mut events, &mut skipped)
            .wrap_err_with(|| format!("bad schema in {}", path.display()))?;
    }

    if skipped > 0 {
        tracing::warn!(
            path = %path.display(),
            skipped,
            "skipped malformed swap-log rows"
        );
    }
    tracing::info!(
        path = %path.display(),
        events = events.len(),
        v3,
        "parsed swap-log parquet file"
    );
    Ok(events)
}

fn read_batch(
    batch: &RecordBatch,
    v3: bool,
    events: &mut Vec<RawSwapEvent>,
    skipped: &mut usize,
) -> Result<()> {
    let chain_id = u64_col(batch, "chain_id")?;
    let block_number = u64_col(batch, "block_number")?;
    let transaction_index = u64_col(batch, "transaction_index")?;
    let log_index = u64_col(batch, "log_index")?;
    let transaction_hash = binary_col(batch, "transaction_hash")?;
    let address = binary_col(batch, "address")?;
    let topic0 = binary_col(batch, "topic0")?;
    let sender = binary_col(batch, "event__sender")?;
    // V2 names the recipient field `to`; V3 names it `recipient`.
    let recipient = binary_col(batch, if v3 { "event__recipient" } else { "event__to" })?;

    enum Amounts<'a> {
        V2 {
            in0: &'a Float64Array,
            in1: &'a Float64Array,
            out0: &'a Float64Array,
            out1: &'a Float64Array,
        },
        V3 {
            amount0: &'a Float64Array,
            amount1: &'a Float64Array,
            sqrt_price: &'a Float64Array,
            liquidity: &'a Float64Array,
            tick: &'a Int32Array,
        },
    }

    let amounts = if v3 {
        Amounts::V3 {
            amount0: f64_col(batch, "event__amount0_f64")?,
            amount1: f64_col(batch, "event__amount1_f64")?,
            sqrt_price: f64_col(batch, "event__sqrtPriceX96_f64")?,
            liquidity: f64_col(batch, "event__liquidity_f64")?,
            tick: batch
                .column(col_idx(batch, "event__tick")?)
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("column event__tick is not i32 type")?,
        }
    } else {
        Amounts::V2 {
            in0: f64_col(batch, "event__amount0In_f64")?,
            in1: f64_col(batch, "event__amount1In_f64")?,
            out0: f64_col(batch, "event__amount0Out_f64")?,
            out1: f64_col(batch, "event__amount1Out_f64")?,
        }
    };

    for row in 0..batch.num_rows() {
        let required = [
            transaction_hash.is_null(row),
            address.is_null(row),
            topic0.is_null(row),
            sender.is_null(row),
            recipient.is_null(row),
        ];
        if required.iter().any(|null| *null) {
            *skipped += 1;
            continue;
        }

        let parsed = (
            b256_from_bytes(transaction_hash.value(row)),
            address_from_bytes(address.value(row)),
            b256_from_bytes(topic0.value(row)),
            address_from_bytes(sender.value(row)),
            address_from_bytes(recipient.value(row)),
        );
        let (Some(tx_hash), Some(pool), Some(topic), Some(sender), Some(recipient)) = parsed
        else {
            tracing::debug!(row, "swap-log row has malformed binary field");
            *skipped += 1;
            continue;
        };

        let payload = match &amounts {
            Amounts::V2 { in0, in1, out0, out1 } => SwapPayload::V2 {
                amount0_in: in0.value(row),
                amount1_in: in1.value(row),
                amount0_out: out0.value(row),
                amount1_out: out1.value(row),
            },
            Amounts::V3 {
                amount0,
                amount1,
                sqrt_price,
                liquidity,
                tick,
            } => SwapPayload::V3 {
                amount0: amount0.value(row),
                amount1: amount1.value(row),
                sqrt_price_x96: sqrt_price.value(row),
                liquidity: liquidity.value(row),
                tick: tick.value(row),
            },
        };

        events.push(RawSwapEvent {
            chain_id: chain_id.value(row),
            block_number: block_number.value(row),
            transaction_index: transaction_index.value(row),
            transaction_hash: tx_hash,
            log_index: log_index.value(row),
            pool_address: pool,
            topic0: topic,
            sender,
            recipient,
            payload,
        });
    }

    Ok(())
}

fn col_idx(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(name)
        .context(format!("column {name} not found in parquet schema"))
}

fn binary_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a BinaryArray> {
    batch
        .column(col_idx(batch, name)?)
        .as_any()
        .downcast_ref::<BinaryArray>()
        .context(format!("column {name} is not binary type"))
}

fn u64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt64Array> {
    batch
        .column(col_idx(batch, name)?)
        .as_any()
        .downcast_ref::<UInt64Array>()
        .context(format!("column {name} is not u64 type"))
}

fn f64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column(col_idx(batch, name)?)
        .as_any()
        .downcast_ref::<Float64Array>()
        .context(format!("column {name} is not f64 type"))
}

fn address_from_bytes(bytes: &[u8]) -> Option<Address> {
    (bytes.len() == 20).then(|| Address::from_slice(bytes))
}

fn b256_from_bytes(bytes: &[u8]) -> Option<B256> {
    (bytes.len() == 32).then(|| B256::from_slice(bytes))
}
