//! # Ingestion
//!
//! Record ingestion module.
//!
//! Responsibilities:
//! - Read a newline-delimited JSON file (or any async buffered reader) line by line
//! - Decode each line into a `Record`, aborting on the first malformed line
//! - Push records downstream through a bounded stage channel (backpressure)
//! - Close the channel as completed or failed
//!
//! ## Usage Example
//!
//! ```ignore
//! use contracts::stage_channel;
//! use ingestion::{JsonRecordDecoder, RecordSource};
//!
//! let (tx, rx) = stage_channel("records", 50);
//! let source = RecordSource::new("events.jsonl", JsonRecordDecoder);
//! tokio::spawn(source.run(tx));
//!
//! while let Some(record) = rx.recv().await? {
//!     // Process record
//! }
//! ```

mod config;
mod decoder;
mod source;

// Re-exports
pub use config::{SourceMetrics, SourceMetricsSnapshot};
pub use contracts::Record;
pub use decoder::JsonRecordDecoder;
pub use source::{RecordSource, SourceReport};
