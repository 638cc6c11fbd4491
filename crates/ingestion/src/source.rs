//! RecordSource - first pipeline stage

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use contracts::{ContractError, DecodeError, Record, RecordDecoder, SharedError, StageSender};
use observability::{measure, timer_for, Timer};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, instrument, warn, Level};

use crate::config::SourceMetrics;

/// Queue depth is published every this many records
const QUEUE_DEPTH_INTERVAL: u64 = 100;

/// Outcome of a successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceReport {
    /// Records decoded and pushed downstream
    pub records: u64,
}

/// Lazily decodes a line-oriented input into `Record`s
///
/// Order of the input is preserved. The first malformed line aborts the
/// whole read and closes the output channel as failed.
pub struct RecordSource<D> {
    path: PathBuf,
    decoder: D,
    metrics: Arc<SourceMetrics>,
}

struct SourceTimers {
    total: Box<dyn Timer>,
    decode: Box<dyn Timer>,
    push: Box<dyn Timer>,
}

impl SourceTimers {
    fn new() -> Self {
        Self {
            total: timer_for(Level::DEBUG),
            decode: timer_for(Level::DEBUG),
            push: timer_for(Level::TRACE),
        }
    }

    fn report(&self, records: u64) {
        self.push.report("Read: record channel (record/sec)", 1);
        self.decode.report("Read: decode (record/sec)", 1);
        self.total.report("Read: total (record/sec)", records);
    }
}

impl<D: RecordDecoder> RecordSource<D> {
    /// Create a source for the file at `path`
    pub fn new(path: impl Into<PathBuf>, decoder: D) -> Self {
        Self {
            path: path.into(),
            decoder,
            metrics: Arc::new(SourceMetrics::new()),
        }
    }

    /// Share metrics with the caller
    pub fn with_metrics(mut self, metrics: Arc<SourceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Input path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<SourceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Open the input file and stream it into `tx`
    ///
    /// # Errors
    /// IO failure, the first decode failure (with its 1-based line number), or
    /// `ChannelClosed` when the consumer went away. The channel is closed as
    /// failed before the error is returned.
    pub async fn run(self, tx: StageSender<Record>) -> Result<SourceReport, SharedError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => {
                let error: SharedError = Arc::new(ContractError::Io(e));
                error!(path = %self.path.display(), error = %error, "Failed to open input");
                tx.fail(Arc::clone(&error));
                return Err(error);
            }
        };
        self.run_reader(BufReader::new(file), tx).await
    }

    /// Stream an already opened reader into `tx`
    #[instrument(
        name = "record_source_run",
        skip(self, reader, tx),
        fields(path = %self.path.display(), channel = %tx.name())
    )]
    pub async fn run_reader<R>(
        self,
        reader: R,
        tx: StageSender<Record>,
    ) -> Result<SourceReport, SharedError>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Record source started");

        let mut timers = SourceTimers::new();
        let started = Instant::now();
        let result = self.read_lines(reader, &tx, &mut timers).await;
        if timers.total.is_enabled() {
            timers.total.put(started.elapsed());
        }

        let snapshot = self.metrics.snapshot();
        timers.report(snapshot.records_sent);

        match result {
            Ok(records) => {
                tx.complete();
                info!(lines = snapshot.lines_read, records, "Record source complete");
                Ok(SourceReport { records })
            }
            Err(error) => {
                let error: SharedError = Arc::new(error);
                if error.is_cancellation() {
                    warn!(lines = snapshot.lines_read, error = %error, "Record source cancelled");
                } else {
                    error!(lines = snapshot.lines_read, error = %error, "Record source failed");
                }
                tx.fail(Arc::clone(&error));
                Err(error)
            }
        }
    }

    async fn read_lines<R>(
        &self,
        reader: R,
        tx: &StageSender<Record>,
        timers: &mut SourceTimers,
    ) -> Result<u64, ContractError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut reader = reader;
        let mut buf = Vec::new();
        let mut line_number: u64 = 0;
        let mut records: u64 = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            line_number += 1;
            self.metrics.record_line();
            observability::record_lines_read(1);

            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            let line = std::str::from_utf8(&buf).map_err(|e| {
                self.metrics.record_decode_failure();
                observability::record_decode_failure();
                ContractError::Decode {
                    line: line_number,
                    source: DecodeError::with_source("invalid UTF-8", e),
                }
            })?;

            let record = measure(timers.decode.as_mut(), || self.decoder.decode(line))
                .map_err(|source| {
                    self.metrics.record_decode_failure();
                    observability::record_decode_failure();
                    ContractError::Decode {
                        line: line_number,
                        source,
                    }
                })?;

            let push_started = Instant::now();
            tx.send(record).await?;
            if timers.push.is_enabled() {
                timers.push.put(push_started.elapsed());
            }

            records += 1;
            self.metrics.record_sent();
            if records % QUEUE_DEPTH_INTERVAL == 0 {
                self.metrics.update_queue_len(tx.len());
                observability::record_queue_depth(tx.name(), tx.len());
                debug!(records, queue_len = tx.len(), "Record source progress");
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonRecordDecoder;
    use contracts::stage_channel;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LINE: &str = r#"{"name":"event","type":"info","body":"{}"}"#;

    fn jsonl(lines: &[&str]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    async fn collect(rx: &contracts::StageReceiver<Record>) -> (Vec<Record>, Option<SharedError>) {
        let mut records = Vec::new();
        loop {
            match rx.recv().await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => return (records, None),
                Err(e) => return (records, Some(e)),
            }
        }
    }

    #[tokio::test]
    async fn test_reads_file_in_order() {
        let file = jsonl(&[
            r#"{"name":"1"}"#,
            r#"{"name":"2"}"#,
            r#"{"name":"3"}"#,
        ]);
        let (tx, rx) = stage_channel("records", 2);
        let source = RecordSource::new(file.path(), JsonRecordDecoder);
        let metrics = source.metrics();

        let handle = tokio::spawn(source.run(tx));
        let (records, error) = collect(&rx).await;

        assert!(error.is_none());
        let names: Vec<_> = records.iter().filter_map(|r| r.name.clone()).collect();
        assert_eq!(names, ["1", "2", "3"]);
        assert_eq!(handle.await.unwrap().unwrap(), SourceReport { records: 3 });
        assert_eq!(metrics.snapshot().lines_read, 3);
    }

    #[tokio::test]
    async fn test_decode_error_reports_line_and_fails_channel() {
        let file = jsonl(&[LINE, LINE, "{broken", LINE]);
        let (tx, rx) = stage_channel("records", 8);
        let source = RecordSource::new(file.path(), JsonRecordDecoder);
        let metrics = source.metrics();

        let result = source.run(tx).await;
        let err = result.unwrap_err();
        assert!(matches!(*err, ContractError::Decode { line: 3, .. }));

        let (records, channel_error) = collect(&rx).await;
        assert_eq!(records.len(), 2);
        assert!(Arc::ptr_eq(&err, &channel_error.unwrap()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.lines_read, 3);
        assert_eq!(snapshot.records_sent, 2);
        assert_eq!(snapshot.decode_failures, 1);
    }

    #[tokio::test]
    async fn test_blank_line_is_malformed() {
        let (tx, rx) = stage_channel("records", 8);
        let reader: &[u8] = b"{}\n\n{}\n";
        let result = RecordSource::new("mem", JsonRecordDecoder)
            .run_reader(reader, tx)
            .await;
        assert!(matches!(
            *result.unwrap_err(),
            ContractError::Decode { line: 2, .. }
        ));
        let (records, error) = collect(&rx).await;
        assert_eq!(records.len(), 1);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_decode_error() {
        let (tx, rx) = stage_channel("records", 8);
        let reader: &[u8] = b"{\"name\":\"a\"}\n{\"name\":\"\xff\"}\n{}\n";
        let source = RecordSource::new("mem", JsonRecordDecoder);
        let result = source.run_reader(reader, tx).await;

        let err = result.unwrap_err();
        match err.as_ref() {
            ContractError::Decode { line, source } => {
                assert_eq!(*line, 2);
                assert_eq!(source.message(), "invalid UTF-8");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        let (records, error) = collect(&rx).await;
        assert_eq!(records.len(), 1);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn test_crlf_line_endings_are_stripped() {
        let (tx, rx) = stage_channel("records", 8);
        let reader: &[u8] = b"{\"name\":\"a\"}\r\n{\"name\":\"b\"}";
        let report = RecordSource::new("mem", JsonRecordDecoder)
            .run_reader(reader, tx)
            .await
            .unwrap();
        assert_eq!(report.records, 2);
        let (records, error) = collect(&rx).await;
        assert!(error.is_none());
        assert_eq!(records[1].name.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let (tx, rx) = stage_channel("records", 1);
        let reader: &[u8] = b"";
        let report = RecordSource::new("mem", JsonRecordDecoder)
            .run_reader(reader, tx)
            .await
            .unwrap();
        assert_eq!(report.records, 0);
        assert!(rx.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_fails_channel() {
        let (tx, rx) = stage_channel("records", 1);
        let result = RecordSource::new("/nonexistent/events.jsonl", JsonRecordDecoder)
            .run(tx)
            .await;
        assert!(matches!(*result.unwrap_err(), ContractError::Io(_)));
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_consumer_cancels_source() {
        let (tx, rx) = stage_channel("records", 1);
        drop(rx);
        let reader: &[u8] = b"{}\n{}\n";
        let err = RecordSource::new("mem", JsonRecordDecoder)
            .run_reader(reader, tx)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_backpressure_suspends_until_consumed() {
        let lines: Vec<String> = (0..10).map(|i| format!(r#"{{"name":"{i}"}}"#)).collect();
        let input = lines.join("\n");
        let (tx, rx) = stage_channel("records", 2);
        let source = RecordSource::new("mem", JsonRecordDecoder);
        let metrics = source.metrics();

        let handle = tokio::spawn(async move {
            let reader = std::io::Cursor::new(input.into_bytes());
            source.run_reader(reader, tx).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(metrics.snapshot().records_sent <= 3);

        let (records, _) = collect(&rx).await;
        assert_eq!(records.len(), 10);
        assert_eq!(handle.await.unwrap().unwrap().records, 10);
    }
}
