//! arb-data crate
//!
//! Reference data and I/O for the swap-cycle scanner: chain
//! configuration, parquet ingestion of decoded swap logs, the pool/token
//! metadata registry, RPC metadata harvesting, and SQLite persistence of
//! classification output.

pub mod config;
pub mod logs;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod testutil;
pub mod types;

pub use registry::Registry;
pub use types::{Pool, RawSwapEvent, SwapPayload, Token};
