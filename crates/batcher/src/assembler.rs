//! BatchAssembler - second pipeline stage

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    Batch, BatchingPolicy, Record, RootReference, SharedError, StageReceiver,
    StageSender,
};
use observability::{measure, timer_for, BatchMetricsAggregator, MetricsSummary, SealReason, Timer};
use tracing::{debug, error, info, instrument, warn, Level};

use crate::builder::BatchBuilder;

/// Outcome of a successful assembly
#[derive(Debug, Clone)]
pub struct AssemblerReport {
    /// Batches emitted, final partial batch included
    pub batches: u64,
    /// Records emitted across all batches
    pub records: u64,
    /// Per-batch statistics
    pub summary: MetricsSummary,
}

/// Assembler metrics
#[derive(Debug, Default)]
pub struct AssemblerMetrics {
    /// Records pulled from upstream
    pub records_received: AtomicU64,

    /// Batches handed downstream
    pub batches_sealed: AtomicU64,

    /// Records inside handed-down batches
    pub records_batched: AtomicU64,
}

impl AssemblerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_emitted(&self, records: usize) {
        self.batches_sealed.fetch_add(1, Ordering::Relaxed);
        self.records_batched
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> AssemblerMetricsSnapshot {
        AssemblerMetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            batches_sealed: self.batches_sealed.load(Ordering::Relaxed),
            records_batched: self.records_batched.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerMetricsSnapshot {
    pub records_received: u64,
    pub batches_sealed: u64,
    pub records_batched: u64,
}

struct AssemblerTimers {
    total: Box<dyn Timer>,
    record: Box<dyn Timer>,
    batch: Box<dyn Timer>,
    push: Box<dyn Timer>,
}

impl AssemblerTimers {
    fn new() -> Self {
        Self {
            total: timer_for(Level::DEBUG),
            record: timer_for(Level::DEBUG),
            batch: timer_for(Level::DEBUG),
            push: timer_for(Level::TRACE),
        }
    }

    fn report(&self, max_count: u64, records: u64) {
        self.push.report("Assemble: batch channel (record/sec)", max_count);
        self.record.report("Assemble: record added (record/sec)", 1);
        self.batch.report("Assemble: batch created (record/sec)", max_count);
        self.total.report("Assemble: total (record/sec)", records);
    }
}

/// Consumes records and emits batches
pub struct BatchAssembler {
    policy: BatchingPolicy,
    root: Arc<RootReference>,
    metrics: Arc<AssemblerMetrics>,
}

impl BatchAssembler {
    /// Create an assembler nesting batches under `root`
    pub fn new(policy: BatchingPolicy, root: Arc<RootReference>) -> Self {
        Self {
            policy,
            root,
            metrics: Arc::new(AssemblerMetrics::new()),
        }
    }

    /// Share metrics with the caller
    pub fn with_metrics(mut self, metrics: Arc<AssemblerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<AssemblerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Fold records from `rx` into batches pushed onto `tx`
    ///
    /// On normal upstream completion the in-progress batch is flushed and
    /// `tx` completes. On upstream failure `tx` is failed with the same cause,
    /// the partial batch is dropped and the cause is returned.
    #[instrument(
        name = "batch_assembler_run",
        skip(self, rx, tx),
        fields(
            max_count = self.policy.max_count(),
            max_size_bytes = self.policy.max_size_bytes(),
            root_id = %self.root.id
        )
    )]
    pub async fn run(
        self,
        rx: StageReceiver<Record>,
        tx: StageSender<Batch>,
    ) -> Result<AssemblerReport, SharedError> {
        info!("Batch assembler started");

        let mut builder = BatchBuilder::new(self.policy, Arc::clone(&self.root));
        let mut aggregator = BatchMetricsAggregator::new();
        let mut timers = AssemblerTimers::new();
        let started = Instant::now();

        let result = self
            .assemble(&mut builder, &mut aggregator, &mut timers, &rx, &tx)
            .await;

        if timers.total.is_enabled() {
            timers.total.put(started.elapsed());
        }
        let snapshot = self.metrics.snapshot();
        timers.report(self.policy.max_count() as u64, snapshot.records_batched);

        match result {
            Ok(()) => {
                tx.complete();
                info!(
                    batches = snapshot.batches_sealed,
                    records = snapshot.records_batched,
                    "Batch assembler complete"
                );
                Ok(AssemblerReport {
                    batches: snapshot.batches_sealed,
                    records: snapshot.records_batched,
                    summary: aggregator.summary(),
                })
            }
            Err(error) => {
                if error.is_cancellation() {
                    warn!(error = %error, "Batch assembler cancelled");
                } else {
                    error!(
                        batches = snapshot.batches_sealed,
                        records = snapshot.records_batched,
                        pending = builder.pending_len(),
                        error = %error,
                        "Batch assembler failed"
                    );
                }
                tx.fail(Arc::clone(&error));
                Err(error)
            }
        }
    }

    async fn assemble(
        &self,
        builder: &mut BatchBuilder,
        aggregator: &mut BatchMetricsAggregator,
        timers: &mut AssemblerTimers,
        rx: &StageReceiver<Record>,
        tx: &StageSender<Batch>,
    ) -> Result<(), SharedError> {
        let mut batch_started = Instant::now();

        while let Some(record) = rx.recv().await? {
            self.metrics.record_received();
            let sealed = measure(timers.record.as_mut(), || builder.push(record));

            if let Some((batch, reason)) = sealed {
                if timers.batch.is_enabled() {
                    timers.batch.put(batch_started.elapsed());
                }
                self.emit(batch, reason, aggregator, timers, tx).await?;
                batch_started = Instant::now();
            }
        }

        if let Some(batch) = builder.flush() {
            self.emit(batch, SealReason::Flush, aggregator, timers, tx)
                .await?;
        }
        Ok(())
    }

    async fn emit(
        &self,
        batch: Batch,
        reason: SealReason,
        aggregator: &mut BatchMetricsAggregator,
        timers: &mut AssemblerTimers,
        tx: &StageSender<Batch>,
    ) -> Result<(), SharedError> {
        let records = batch.len();
        debug!(
            batch_id = batch.batch_id,
            records,
            estimated_size = batch.estimated_size,
            reason = reason.as_str(),
            "Batch sealed"
        );
        observability::record_batch_sealed(&batch, reason);
        aggregator.update(&batch, reason);

        let push_started = Instant::now();
        tx.send(batch).await.map_err(Arc::new)?;
        if timers.push.is_enabled() {
            timers.push.put(push_started.elapsed());
        }

        self.metrics.record_emitted(records);
        observability::record_queue_depth(tx.name(), tx.len());
        Ok(())
    }
}
