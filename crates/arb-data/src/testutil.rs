//! Parquet fixture builders shared by unit tests, integration tests,
//! and benches. Not part of the processing pipeline.

use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use arrow::array::{ArrayRef, BinaryBuilder, Float64Builder, Int32Builder, UInt64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::types::{V2_SWAP_TOPIC0, V3_SWAP_TOPIC0};

/// One V2 swap-log fixture row.
#[derive(Clone, Debug)]
pub struct V2Row {
    pub chain_id: u64,
    pub block_number: u64,
    pub transaction_index: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
    pub pool: Address,
    pub sender: Address,
    pub recipient: Address,
    pub amount0_in: f64,
    pub amount1_in: f64,
    pub amount0_out: f64,
    pub amount1_out: f64,
}

/// One V3 swap-log fixture row.
#[derive(Clone, Debug)]
pub struct V3Row {
    pub chain_id: u64,
    pub block_number: u64,
    pub transaction_index: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
    pub pool: Address,
    pub sender: Address,
    pub recipient: Address,
    pub amount0: f64,
    pub amount1: f64,
    pub sqrt_price_x96: f64,
    pub liquidity: f64,
    pub tick: i32,
}

/// Write a V2 swap-log parquet file in the archive-extract schema.
///
/// # Panics
/// Panics on I/O or arrow errors; fixture writing is test-only.
pub fn write_v2_fixture(path: &Path, rows: &[V2Row]) {
    let mut chain_id = UInt64Builder::new();
    let mut block_number = UInt64Builder::new();
    let mut transaction_index = UInt64Builder::new();
    let mut transaction_hash = BinaryBuilder::new();
    let mut log_index = UInt64Builder::new();
    let mut address = BinaryBuilder::new();
    let mut topic0 = BinaryBuilder::new();
    let mut sender = BinaryBuilder::new();
    let mut to = BinaryBuilder::new();
    let mut amount0_in = Float64Builder::new();
    let mut amount1_in = Float64Builder::new();
    let mut amount0_out = Float64Builder::new();
    let mut amount1_out = Float64Builder::new();

    for row in rows {
        chain_id.append_value(row.chain_id);
        block_number.append_value(row.block_number);
        transaction_index.append_value(row.transaction_index);
        transaction_hash.append_value(row.transaction_hash.as_slice());
        log_index.append_value(row.log_index);
        address.append_value(row.pool.as_slice());
        topic0.append_value(V2_SWAP_TOPIC0.as_slice());
        sender.append_value(row.sender.as_slice());
        to.append_value(row.recipient.as_slice());
        amount0_in.append_value(row.amount0_in);
        amount1_in.append_value(row.amount1_in);
        amount0_out.append_value(row.amount0_out);
        amount1_out.append_value(row.amount1_out);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("chain_id", DataType::UInt64, false),
        Field::new("block_number", DataType::UInt64, false),
        Field::new("transaction_index", DataType::UInt64, false),
        Field::new("transaction_hash", DataType::Binary, true),
        Field::new("log_index", DataType::UInt64, false),
        Field::new("address", DataType::Binary, true),
        Field::new("topic0", DataType::Binary, true),
        Field::new("event__sender", DataType::Binary, true),
        Field::new("event__to", DataType::Binary, true),
        Field::new("event__amount0In_f64", DataType::Float64, false),
        Field::new("event__amount1In_f64", DataType::Float64, false),
        Field::new("event__amount0Out_f64", DataType::Float64, false),
        Field::new("event__amount1Out_f64", DataType::Float64, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(chain_id.finish()),
        Arc::new(block_number.finish()),
        Arc::new(transaction_index.finish()),
        Arc::new(transaction_hash.finish()),
        Arc::new(log_index.finish()),
        Arc::new(address.finish()),
        Arc::new(topic0.finish()),
        Arc::new(sender.finish()),
        Arc::new(to.finish()),
        Arc::new(amount0_in.finish()),
        Arc::new(amount1_in.finish()),
        Arc::new(amount0_out.finish()),
        Arc::new(amount1_out.finish()),
    ];

    write_batch(path, schema, columns);
}

/// Write a V3 swap-log parquet file in the archive-extract schema.
///
/// # Panics
/// Panics on I/O or arrow errors; fixture writing is test-only.
pub fn write_v3_fixture(path: &Path, rows: &[V3Row]) {
    let mut chain_id = UInt64Builder::new();
    let mut block_number = UInt64Builder::new();
    let mut transaction_index = UInt64Builder::new();
    let mut transaction_hash = BinaryBuilder::new();
    let mut log_index = UInt64Builder::new();
    let mut address = BinaryBuilder::new();
    let mut topic0 = BinaryBuilder::new();
    let mut sender = BinaryBuilder::new();
    let mut recipient = BinaryBuilder::new();
    let mut amount0 = Float64Builder::new();
    let mut amount1 = Float64Builder::new();
    let mut sqrt_price = Float64Builder::new();
    let mut liquidity = Float64Builder::new();
    let mut tick = Int32Builder::new();

    for row in rows {
        chain_id.append_value(row.chain_id);
        block_number.append_value(row.block_number);
        transaction_index.append_value(row.transaction_index);
        transaction_hash.append_value(row.transaction_hash.as_slice());
        log_index.append_value(row.log_index);
        address.append_value(row.pool.as_slice());
        topic0.append_value(V3_SWAP_TOPIC0.as_slice());
        sender.append_value(row.sender.as_slice());
        recipient.append_value(row.recipient.as_slice());
        amount0.append_value(row.amount0);
        amount1.append_value(row.amount1);
        sqrt_price.append_value(row.sqrt_price_x96);
        liquidity.append_value(row.liquidity);
        tick.append_value(row.tick);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("chain_id", DataType::UInt64, false),
        Field::new("block_number", DataType::UInt64, false),
        Field::new("transaction_index", DataType::UInt64, false),
        Field::new("transaction_hash", DataType::Binary, true),
        Field::new("log_index", DataType::UInt64, false),
        Field::new("address", DataType::Binary, true),
        Field::new("topic0", DataType::Binary, true),
        Field::new("event__sender", DataType::Binary, true),
        Field::new("event__recipient", DataType::Binary, true),
        Field::new("event__amount0_f64", DataType::Float64, false),
        Field::new("event__amount1_f64", DataType::Float64, false),
        Field::new("event__sqrtPriceX96_f64", DataType::Float64, false),
        Field::new("event__liquidity_f64", DataType::Float64, false),
        Field::new("event__tick", DataType::Int32, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(chain_id.finish()),
        Arc::new(block_number.finish()),
        Arc::new(transaction_index.finish()),
        Arc::new(transaction_hash.finish()),
        Arc::new(log_index.finish()),
        Arc::new(address.finish()),
        Arc::new(topic0.finish()),
        Arc::new(sender.finish()),
        Arc::new(recipient.finish()),
        Arc::new(amount0.finish()),
        Arc::new(amount1.finish()),
        Arc::new(sqrt_price.finish()),
        Arc::new(liquidity.finish()),
        Arc::new(tick.finish()),
    ];

    write_batch(path, schema, columns);
}

fn write_batch(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) {
    let batch = RecordBatch::try_new(schema.clone(), columns).expect("create record batch");
    let file = std::fs::File::create(path).expect("create parquet file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("create arrow writer");
    writer.write(&batch).expect("write batch");
    writer.close().expect("close writer");
}
