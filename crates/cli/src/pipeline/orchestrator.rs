//! Pipeline orchestrator - coordinates all stages.
//!
//! Creates the run root, wires source, assembler and dispatcher through two
//! bounded stage channels and joins them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use batcher::{AssemblerMetrics, AssemblerReport, BatchAssembler};
use contracts::{
    stage_channel, BatchingPolicy, ContractError, DeliveryClient, QueueConfig, RootProvider,
    SharedError,
};
use dispatcher::{DispatchMetrics, Dispatcher};
use ingestion::{JsonRecordDecoder, RecordSource, SourceMetrics};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Events file, one JSON object per line
    pub events_file: PathBuf,

    /// Book every batch is uploaded to
    pub book: String,

    /// Scope of the run
    pub scope: String,

    /// Label of the run root
    pub root_label: String,

    /// Batch sealing thresholds
    pub policy: BatchingPolicy,

    /// Stage channel capacities
    pub queues: QueueConfig,
}

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Failed run: the surfaced cause plus what the stages reached
#[derive(Debug)]
pub struct PipelineFailure {
    pub cause: SharedError,
    pub stats: PipelineStats,
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline failed: {}", self.cause)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Main pipeline orchestrator
///
/// Runs once: the delivery client is handed to the dispatcher stage.
pub struct Pipeline<C> {
    config: PipelineConfig,
    client: Option<C>,
    state: PipelineState,
}

/// Metrics handles shared with the spawned stages
#[derive(Default)]
struct StageMetrics {
    source: Arc<SourceMetrics>,
    assembler: Arc<AssemblerMetrics>,
    dispatch: Arc<DispatchMetrics>,
}

impl StageMetrics {
    fn stats(&self, started: Instant, assembled: Option<AssemblerReport>) -> PipelineStats {
        let source = self.source.snapshot();
        let assembler = self.assembler.snapshot();
        let dispatch = self.dispatch.snapshot();

        PipelineStats {
            lines_read: source.lines_read,
            records_read: source.records_sent,
            records_batched: assembler.records_batched,
            batches_sealed: assembler.batches_sealed,
            batches_sent: dispatch.batches_sent,
            records_sent: dispatch.records_sent,
            bytes_sent: dispatch.bytes_sent,
            duration: started.elapsed(),
            batch_summary: assembled.map(|report| report.summary),
        }
    }
}

impl<C> Pipeline<C>
where
    C: DeliveryClient + RootProvider + 'static,
{
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig, client: C) -> Self {
        Self {
            config,
            client: Some(client),
            state: PipelineState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the pipeline to completion
    ///
    /// Succeeds only if all three stages succeed. Otherwise the first error
    /// in join order (assembler, dispatcher, source) is surfaced, with root
    /// causes ranked before cancellations.
    #[instrument(
        name = "pipeline_run",
        skip(self),
        fields(
            events_file = %self.config.events_file.display(),
            book = %self.config.book,
            scope = %self.config.scope
        )
    )]
    pub async fn run(&mut self) -> Result<PipelineStats, PipelineFailure> {
        let started = Instant::now();
        let metrics = StageMetrics::default();

        let Some(mut client) = self.client.take() else {
            return Err(PipelineFailure {
                cause: Arc::new(ContractError::Other(
                    "pipeline has already been started".to_string(),
                )),
                stats: metrics.stats(started, None),
            });
        };
        self.state = PipelineState::Running;

        let root = match client
            .create_root(&self.config.book, &self.config.scope, &self.config.root_label)
            .await
        {
            Ok(root) => Arc::new(root),
            Err(e) => {
                error!(error = %e, "Failed to create run root");
                if let Err(close_err) = client.close().await {
                    warn!(error = %close_err, "Failed to close delivery client");
                }
                self.state = PipelineState::Failed;
                return Err(PipelineFailure {
                    cause: Arc::new(e),
                    stats: metrics.stats(started, None),
                });
            }
        };
        info!(root_id = %root.id, label = %self.config.root_label, "Run root created");

        let (records_tx, records_rx) = stage_channel("records", self.config.queues.read_buffer_size);
        let (batches_tx, batches_rx) = stage_channel("batches", self.config.queues.batch_buffer_size);

        let source = RecordSource::new(self.config.events_file.clone(), JsonRecordDecoder)
            .with_metrics(Arc::clone(&metrics.source));
        let assembler = BatchAssembler::new(self.config.policy, root)
            .with_metrics(Arc::clone(&metrics.assembler));
        let dispatcher = Dispatcher::new(client).with_metrics(Arc::clone(&metrics.dispatch));

        let source_handle = tokio::spawn(source.run(records_tx));
        let assembler_handle = tokio::spawn(assembler.run(records_rx, batches_tx));
        let dispatcher_handle = tokio::spawn(dispatcher.run(batches_rx));

        info!(
            max_count = self.config.policy.max_count(),
            max_size_bytes = self.config.policy.max_size_bytes(),
            read_buffer_size = self.config.queues.read_buffer_size,
            batch_buffer_size = self.config.queues.batch_buffer_size,
            "Pipeline running"
        );

        let assembled = join_stage("assembler", assembler_handle).await;
        let dispatched = join_stage("dispatcher", dispatcher_handle).await;
        let sourced = join_stage("source", source_handle).await;

        let mut failures = Vec::new();
        let report = match assembled {
            Ok(report) => Some(report),
            Err(e) => {
                failures.push(("assembler", e));
                None
            }
        };
        if let Err(e) = dispatched {
            failures.push(("dispatcher", e));
        }
        if let Err(e) = sourced {
            failures.push(("source", e));
        }

        let stats = metrics.stats(started, report);
        match select_failure(failures) {
            None => {
                self.state = PipelineState::Completed;
                info!(
                    records = stats.records_sent,
                    batches = stats.batches_sent,
                    duration_secs = stats.duration.as_secs_f64(),
                    "Pipeline completed"
                );
                Ok(stats)
            }
            Some(cause) => {
                self.state = PipelineState::Failed;
                error!(error = %cause, "Pipeline failed");
                Err(PipelineFailure { cause, stats })
            }
        }
    }
}

/// Await a stage task, turning a panic or cancellation into a stage error
async fn join_stage<T>(
    stage: &str,
    handle: JoinHandle<Result<T, SharedError>>,
) -> Result<T, SharedError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(Arc::new(ContractError::StagePanicked {
            stage: stage.to_string(),
            message: e.to_string(),
        })),
    }
}

/// Pick the error to surface from stage failures listed in join order
///
/// The first root cause wins; a cancellation is surfaced only when nothing
/// else failed. Failures not sharing the surfaced cause are logged.
fn select_failure(failures: Vec<(&str, SharedError)>) -> Option<SharedError> {
    let chosen = failures
        .iter()
        .find(|(_, e)| !e.is_cancellation())
        .or_else(|| failures.first())
        .map(|(_, e)| Arc::clone(e))?;

    for (stage, e) in &failures {
        if !Arc::ptr_eq(e, &chosen) {
            warn!(stage = *stage, error = %e, "Additional stage failure");
        }
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Ack, Batch, RootReference};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Records delivered batch sizes; can fail root creation or one batch
    #[derive(Default)]
    struct MockClient {
        delivered: Arc<Mutex<Vec<usize>>>,
        roots: Arc<Mutex<u32>>,
        fail_root: bool,
        fail_batch: Option<u64>,
    }

    impl RootProvider for MockClient {
        async fn create_root(
            &mut self,
            book: &str,
            scope: &str,
            _label: &str,
        ) -> Result<RootReference, ContractError> {
            *self.roots.lock().unwrap() += 1;
            if self.fail_root {
                return Err(ContractError::root_creation("mock", "rejected"));
            }
            Ok(RootReference::new(book, scope, "20260101000000000000000"))
        }
    }

    impl DeliveryClient for MockClient {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError> {
            if self.fail_batch == Some(batch.batch_id) {
                return Err(ContractError::delivery("mock", batch.batch_id, "boom"));
            }
            self.delivered.lock().unwrap().push(batch.len());
            Ok(Ack {
                records: batch.len(),
                bytes: batch.estimated_size,
            })
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn events_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn valid_lines(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!(r#"{{"name":"event {i}","type":"test"}}"#))
            .collect()
    }

    fn config(file: &NamedTempFile, max_count: usize) -> PipelineConfig {
        PipelineConfig {
            events_file: file.path().to_path_buf(),
            book: "book".to_string(),
            scope: "scope".to_string(),
            root_label: "Root event".to_string(),
            policy: BatchingPolicy::new(max_count, 1024 * 1024).unwrap(),
            queues: QueueConfig {
                read_buffer_size: 2,
                batch_buffer_size: 1,
            },
        }
    }

    #[tokio::test]
    async fn test_run_delivers_every_record() {
        let lines = valid_lines(7);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = events_file(&lines);
        let client = MockClient::default();
        let delivered = Arc::clone(&client.delivered);
        let roots = Arc::clone(&client.roots);

        let mut pipeline = Pipeline::new(config(&file, 3), client);
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let stats = pipeline.run().await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Completed);
        assert_eq!(*delivered.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(*roots.lock().unwrap(), 1);
        assert_eq!(stats.lines_read, 7);
        assert_eq!(stats.records_sent, 7);
        assert_eq!(stats.batches_sent, 3);
        assert_eq!(stats.batch_summary.unwrap().flushed, 1);
    }

    #[tokio::test]
    async fn test_decode_failure_fails_run_after_full_batches() {
        let mut lines = valid_lines(8);
        lines[6] = "{not json".to_string();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = events_file(&lines);
        let client = MockClient::default();
        let delivered = Arc::clone(&client.delivered);

        let mut pipeline = Pipeline::new(config(&file, 2), client);
        let failure = pipeline.run().await.unwrap_err();

        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(matches!(
            failure.cause.as_ref(),
            ContractError::Decode { line: 7, .. }
        ));
        // floor((7 - 1) / 2)
        assert_eq!(delivered.lock().unwrap().len(), 3);
        assert_eq!(failure.stats.records_sent, 6);
    }

    #[tokio::test]
    async fn test_root_failure_starts_no_stage() {
        let file = events_file(&["{}"]);
        let client = MockClient {
            fail_root: true,
            ..Default::default()
        };
        let delivered = Arc::clone(&client.delivered);

        let mut pipeline = Pipeline::new(config(&file, 2), client);
        let failure = pipeline.run().await.unwrap_err();

        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(matches!(
            failure.cause.as_ref(),
            ContractError::RootCreation { .. }
        ));
        assert!(delivered.lock().unwrap().is_empty());
        assert_eq!(failure.stats.lines_read, 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_surfaces_over_cancellation() {
        let lines = valid_lines(20);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = events_file(&lines);
        let client = MockClient {
            fail_batch: Some(1),
            ..Default::default()
        };

        let mut pipeline = Pipeline::new(config(&file, 2), client);
        let failure = pipeline.run().await.unwrap_err();

        assert!(matches!(
            failure.cause.as_ref(),
            ContractError::Delivery { batch_id: 1, .. }
        ));
        assert_eq!(failure.stats.batches_sent, 0);
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let file = events_file(&[]);
        let client = MockClient::default();
        let delivered = Arc::clone(&client.delivered);

        let mut pipeline = Pipeline::new(config(&file, 3), client);
        let stats = pipeline.run().await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Completed);
        assert!(delivered.lock().unwrap().is_empty());
        assert_eq!(stats.records_sent, 0);
        assert_eq!(stats.batches_sealed, 0);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let file = events_file(&[]);
        let mut pipeline = Pipeline::new(config(&file, 3), MockClient::default());
        pipeline.run().await.unwrap();

        let failure = pipeline.run().await.unwrap_err();
        assert!(matches!(failure.cause.as_ref(), ContractError::Other(_)));
    }

    #[test]
    fn test_select_failure_prefers_root_cause() {
        let closed = Arc::new(ContractError::ChannelClosed {
            channel: "batches".to_string(),
        });
        let delivery = Arc::new(ContractError::delivery("mock", 1, "boom"));

        let chosen = select_failure(vec![
            ("assembler", Arc::clone(&closed)),
            ("dispatcher", Arc::clone(&delivery)),
        ])
        .unwrap();
        assert!(Arc::ptr_eq(&chosen, &delivery));

        let chosen = select_failure(vec![("source", Arc::clone(&closed))]).unwrap();
        assert!(Arc::ptr_eq(&chosen, &closed));

        assert!(select_failure(Vec::new()).is_none());
    }
}
