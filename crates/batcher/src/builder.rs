//! Synchronous batch folding

use std::sync::Arc;

use contracts::{Batch, BatchingPolicy, Record, RootReference};
use observability::SealReason;

/// Accumulates records into batches
///
/// Running size starts at the root overhead. Each record adds its record
/// overhead and the seal check runs once, after the append.
#[derive(Debug)]
pub struct BatchBuilder {
    policy: BatchingPolicy,
    root: Arc<RootReference>,
    root_overhead: usize,
    next_batch_id: u64,
    records: Vec<Record>,
    running_size: usize,
}

impl BatchBuilder {
    /// Create a builder nesting batches under `root`
    pub fn new(policy: BatchingPolicy, root: Arc<RootReference>) -> Self {
        let root_overhead = root.overhead();
        Self {
            policy,
            root,
            root_overhead,
            next_batch_id: 1,
            records: Vec::with_capacity(policy.max_count().min(1024)),
            running_size: root_overhead,
        }
    }

    /// Append a record, returning the batch it sealed (if any)
    pub fn push(&mut self, record: Record) -> Option<(Batch, SealReason)> {
        self.running_size += self.root.record_overhead(&record);
        self.records.push(record);

        let count = self.records.len();
        if !self.policy.should_seal(count, self.running_size) {
            return None;
        }

        let reason = if count == self.policy.max_count() {
            SealReason::Count
        } else {
            SealReason::Size
        };
        Some((self.seal(), reason))
    }

    /// Seal the in-progress batch if it holds any record
    pub fn flush(&mut self) -> Option<Batch> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.seal())
        }
    }

    /// Records waiting in the in-progress batch
    pub fn pending_len(&self) -> usize {
        self.records.len()
    }

    /// Running size estimate of the in-progress batch
    pub fn running_size(&self) -> usize {
        self.running_size
    }

    /// Batches sealed so far
    pub fn batches_sealed(&self) -> u64 {
        self.next_batch_id - 1
    }

    /// Policy in use
    pub fn policy(&self) -> BatchingPolicy {
        self.policy
    }

    fn seal(&mut self) -> Batch {
        let capacity = self.policy.max_count().min(1024);
        let batch = Batch {
            batch_id: self.next_batch_id,
            parent: Arc::clone(&self.root),
            records: std::mem::replace(&mut self.records, Vec::with_capacity(capacity)),
            estimated_size: self.running_size,
        };
        self.next_batch_id += 1;
        self.running_size = self.root_overhead;
        batch
    }
}
