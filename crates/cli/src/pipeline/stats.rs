//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::MetricsSummary;

/// Statistics from a pipeline run
///
/// Filled for failed runs too, with whatever the stages reached.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Lines read from the events file
    pub lines_read: u64,

    /// Records decoded and handed to the assembler
    pub records_read: u64,

    /// Records placed into emitted batches
    pub records_batched: u64,

    /// Batches emitted by the assembler
    pub batches_sealed: u64,

    /// Batches acknowledged by the delivery client
    pub batches_sent: u64,

    /// Records acknowledged by the delivery client
    pub records_sent: u64,

    /// Bytes handed to the transport
    pub bytes_sent: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Per-batch statistics, present once the assembler finished
    pub batch_summary: Option<MetricsSummary>,
}

impl PipelineStats {
    /// Delivered records per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records_sent as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read);
        println!("   ├─ Records read: {}", self.records_read);
        println!("   └─ Records/sec: {:.2}", self.records_per_sec());

        println!("\nBatching");
        println!("   ├─ Batches sealed: {}", self.batches_sealed);
        println!("   └─ Records batched: {}", self.records_batched);

        println!("\nDelivery");
        println!("   ├─ Batches sent: {}", self.batches_sent);
        println!("   ├─ Records sent: {}", self.records_sent);
        println!("   └─ Bytes sent: {}", self.bytes_sent);

        if let Some(ref summary) = self.batch_summary {
            println!("\n{summary}");
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_per_sec() {
        let stats = PipelineStats {
            records_sent: 500,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.records_per_sec() - 250.0).abs() < 1e-9);
        assert_eq!(PipelineStats::default().records_per_sec(), 0.0);
    }
}
