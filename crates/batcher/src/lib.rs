//! # Batcher
//!
//! Folds decoded records into size- and count-bounded batches.
//!
//! Responsibilities:
//! - Accumulate records under a dual stopping rule (count OR estimated size)
//! - Nest every batch under the run's `RootReference`
//! - Emit sealed batches in input order, then the final partial batch
//! - Propagate upstream failure without emitting the partial batch
//!
//! ## Usage Example
//!
//! ```ignore
//! use batcher::{BatchAssembler, BatchBuilder};
//! use contracts::BatchingPolicy;
//!
//! let mut builder = BatchBuilder::new(policy, root);
//!
//! // Push records as they arrive
//! if let Some((batch, reason)) = builder.push(record) {
//!     // Handle sealed batch
//! }
//!
//! // Or run the async stage between two channels
//! let report = BatchAssembler::new(policy, root).run(records_rx, batches_tx).await?;
//! ```

mod assembler;
mod builder;

// Re-exports
pub use assembler::{AssemblerMetrics, AssemblerMetricsSnapshot, AssemblerReport, BatchAssembler};
pub use builder::BatchBuilder;
pub use contracts::{Batch, BatchingPolicy, Record, RootReference};
pub use observability::SealReason;
