//! Batch - BatchAssembler output
//!
//! Batches, the run-scoped root they are nested under, and the thresholds
//! that decide when a batch is sealed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContractError, Record, TIMESTAMP_SIZE};

/// Run-scoped parent of every batch
///
/// Created once per run by a `RootProvider` before any record is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootReference {
    /// Container identifier
    pub book: String,

    /// Logical scope
    pub scope: String,

    /// Opaque correlation id
    pub id: String,
}

impl RootReference {
    /// Create a root reference
    pub fn new(book: impl Into<String>, scope: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            scope: scope.into(),
            id: id.into(),
        }
    }

    /// Fixed parent-linkage overhead paid by every batch
    pub fn overhead(&self) -> usize {
        self.book.len() + self.scope.len() + TIMESTAMP_SIZE + self.id.len()
    }

    /// Size of one event id
    ///
    /// Event ids share the root's book, scope and id shape.
    pub fn event_id_size(&self) -> usize {
        self.overhead()
    }

    /// Size a record adds to a batch under this root
    ///
    /// Covers the record's own id, its parent link and an end timestamp.
    pub fn record_overhead(&self, record: &Record) -> usize {
        record.estimated_size() + 2 * self.event_id_size() + TIMESTAMP_SIZE
    }
}

/// Sealed group of records delivered as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Sequence number within the run (1-based)
    pub batch_id: u64,

    /// Parent root shared by every batch of the run
    pub parent: Arc<RootReference>,

    /// Records in input order
    pub records: Vec<Record>,

    /// Estimated encoded size, root overhead included
    pub estimated_size: usize,
}

impl Batch {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch has no records (never true for emitted batches)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Thresholds deciding when a batch is sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBatchingPolicy")]
pub struct BatchingPolicy {
    max_count: usize,
    max_size_bytes: usize,
}

/// Default maximum records per batch
pub const DEFAULT_MAX_COUNT: usize = 300;

/// Default maximum estimated batch size (256 KiB)
pub const DEFAULT_MAX_SIZE_BYTES: usize = 256 * 1024;

impl BatchingPolicy {
    /// Create a policy; both thresholds must be positive
    pub fn new(max_count: usize, max_size_bytes: usize) -> Result<Self, ContractError> {
        if max_count == 0 {
            return Err(ContractError::config_validation(
                "batching.max_count",
                "must be > 0",
            ));
        }
        if max_size_bytes == 0 {
            return Err(ContractError::config_validation(
                "batching.max_size_bytes",
                "must be > 0",
            ));
        }
        Ok(Self {
            max_count,
            max_size_bytes,
        })
    }

    /// Maximum records per batch
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Maximum estimated batch size in bytes
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Whether a batch with this count and running size must be sealed
    ///
    /// Count seals on reaching the limit, size only after exceeding it.
    pub fn should_seal(&self, count: usize, running_size: usize) -> bool {
        count == self.max_count || running_size > self.max_size_bytes
    }
}

impl Default for BatchingPolicy {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_COUNT,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
        }
    }
}

#[derive(Deserialize)]
struct RawBatchingPolicy {
    max_count: usize,
    max_size_bytes: usize,
}

impl TryFrom<RawBatchingPolicy> for BatchingPolicy {
    type Error = ContractError;

    fn try_from(raw: RawBatchingPolicy) -> Result<Self, Self::Error> {
        Self::new(raw.max_count, raw.max_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_overhead() {
        let root = RootReference::new("book", "scope", "0123456789");
        assert_eq!(root.overhead(), 4 + 5 + 12 + 10);
    }

    #[test]
    fn test_record_overhead_includes_ids_and_end_timestamp() {
        let root = RootReference::new("b", "s", "i");
        let record = Record {
            name: Some("n".to_string()),
            event_type: Some("t".to_string()),
            ..Default::default()
        };
        // 2 + 2 * 15 + 12
        assert_eq!(root.record_overhead(&record), 44);
    }

    #[test]
    fn test_policy_rejects_zero_thresholds() {
        assert!(BatchingPolicy::new(0, 10).is_err());
        assert!(BatchingPolicy::new(10, 0).is_err());
        assert!(BatchingPolicy::new(1, 1).is_ok());
    }

    #[test]
    fn test_size_seals_only_after_exceeding() {
        let policy = BatchingPolicy::new(100, 50).unwrap();
        assert!(!policy.should_seal(1, 50));
        assert!(policy.should_seal(2, 51));
        assert!(policy.should_seal(100, 0));
    }

    #[test]
    fn test_policy_defaults() {
        let policy = BatchingPolicy::default();
        assert_eq!(policy.max_count(), 300);
        assert_eq!(policy.max_size_bytes(), 262_144);
    }

    #[test]
    fn test_policy_deserialize_validates() {
        let err = serde_json::from_str::<BatchingPolicy>(r#"{"max_count":0,"max_size_bytes":1}"#);
        assert!(err.is_err());
    }
}
