//! Source metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// RecordSource metrics
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Lines read from the input (including the failing one)
    pub lines_read: AtomicU64,

    /// Records pushed downstream
    pub records_sent: AtomicU64,

    /// Decode failure count
    pub decode_failures: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl SourceMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record line read
    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Record pushed downstream
    pub fn record_sent(&self) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record decode failure
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMetricsSnapshot {
    /// Lines read from the input
    pub lines_read: u64,

    /// Records pushed downstream
    pub records_sent: u64,

    /// Decode failure count
    pub decode_failures: u64,

    /// Current queue length
    pub queue_len: usize,
}
