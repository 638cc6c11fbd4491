//! Uploader metrics
//!
//! Thin wrappers over the `metrics` facade, one per pipeline event, plus an
//! in-memory aggregator used for the end-of-run summary.

use contracts::Batch;
use metrics::{counter, gauge, histogram};

/// Record lines read by RecordSource
pub fn record_lines_read(count: u64) {
    counter!("event_uploader_lines_read_total").increment(count);
}

/// Record a malformed input line
pub fn record_decode_failure() {
    counter!("event_uploader_decode_failures_total").increment(1);
}

/// Record a batch sealed by BatchAssembler
pub fn record_batch_sealed(batch: &Batch, reason: SealReason) {
    counter!("event_uploader_batches_sealed_total", "reason" => reason.as_str()).increment(1);
    histogram!("event_uploader_batch_records").record(batch.len() as f64);
    histogram!("event_uploader_batch_size_bytes").record(batch.estimated_size as f64);
}

/// Record a batch handed to the delivery client
pub fn record_batch_dispatched(client: &str, records: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "event_uploader_batches_dispatched_total",
        "client" => client.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        counter!(
            "event_uploader_records_dispatched_total",
            "client" => client.to_string()
        )
        .increment(records as u64);
    }
}

/// Record how long one delivery call took
pub fn record_delivery_latency_ms(client: &str, latency_ms: f64) {
    histogram!(
        "event_uploader_delivery_latency_ms",
        "client" => client.to_string()
    )
    .record(latency_ms);
}

/// Record the depth of a stage queue
pub fn record_queue_depth(channel: &str, depth: usize) {
    gauge!(
        "event_uploader_queue_depth",
        "channel" => channel.to_string()
    )
    .set(depth as f64);
}

/// Why a batch was sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealReason {
    /// Reached the record count limit
    Count,
    /// Exceeded the size limit
    Size,
    /// Input ended with a partial batch
    Flush,
}

impl SealReason {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Size => "size",
            Self::Flush => "flush",
        }
    }
}

/// Batch statistics aggregator
///
/// Aggregates in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    /// Batches seen
    pub total_batches: u64,

    /// Records across all batches
    pub total_records: u64,

    /// Batches sealed per reason
    pub sealed_by_count: u64,
    pub sealed_by_size: u64,
    pub flushed: u64,

    /// Records per batch
    pub record_stats: RunningStats,

    /// Estimated bytes per batch
    pub size_stats: RunningStats,
}

impl BatchMetricsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update aggregate statistics
    pub fn update(&mut self, batch: &Batch, reason: SealReason) {
        self.total_batches += 1;
        self.total_records += batch.len() as u64;

        match reason {
            SealReason::Count => self.sealed_by_count += 1,
            SealReason::Size => self.sealed_by_size += 1,
            SealReason::Flush => self.flushed += 1,
        }

        self.record_stats.push(batch.len() as f64);
        self.size_stats.push(batch.estimated_size as f64);
    }

    /// Produce a summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            total_records: self.total_records,
            sealed_by_count: self.sealed_by_count,
            sealed_by_size: self.sealed_by_size,
            flushed: self.flushed,
            records_per_batch: StatsSummary::from(&self.record_stats),
            bytes_per_batch: StatsSummary::from(&self.size_stats),
        }
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub total_records: u64,
    pub sealed_by_count: u64,
    pub sealed_by_size: u64,
    pub flushed: u64,
    pub records_per_batch: StatsSummary,
    pub bytes_per_batch: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Batch Metrics Summary ===")?;
        writeln!(f, "Total batches: {}", self.total_batches)?;
        writeln!(f, "Total records: {}", self.total_records)?;
        writeln!(
            f,
            "Sealed by count/size/flush: {}/{}/{}",
            self.sealed_by_count, self.sealed_by_size, self.flushed
        )?;
        writeln!(f, "Records per batch: {}", self.records_per_batch)?;
        writeln!(f, "Bytes per batch: {}", self.bytes_per_batch)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics calculator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }
}
