//! arb-analysis crate
//!
//! The analytical core of the swap-cycle scanner: normalization of
//! decoded V2/V3 swap events into canonical signed balance deltas,
//! per-transaction bundling, closed-cycle classification, per-address
//! aggregation, and call-trace exclusion filtering. Everything here is
//! pure computation over already-resolved data; I/O lives in `arb-data`
//! and the CLI.

pub mod bundle;
pub mod cycle;
pub mod normalize;
pub mod summary;
pub mod swap;
pub mod traces;

pub use cycle::{classify, ClassifierConfig, ConservationMode, CycleReport};
pub use swap::{Swap, SwapBundle};
