//! Dispatcher - final pipeline stage, forwards batches to a delivery client

use std::sync::Arc;
use std::time::Instant;

use contracts::{Batch, ContractError, DeliveryClient, SharedError, StageReceiver};
use observability::{timer_for, Timer};
use tracing::{debug, error, info, instrument, warn, Level};

use crate::metrics::{DispatchMetrics, MetricsSnapshot};

/// Outcome of a successful dispatch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Batches delivered
    pub batches: u64,
    /// Records delivered
    pub records: u64,
    /// Bytes handed to the transport
    pub bytes: u64,
}

impl From<MetricsSnapshot> for DispatchReport {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            batches: snapshot.batches_sent,
            records: snapshot.records_sent,
            bytes: snapshot.bytes_sent,
        }
    }
}

/// Forwards batches, in arrival order, to one delivery client
///
/// Delivery failures are not retried: the first one stops the stage.
pub struct Dispatcher<C> {
    client: C,
    metrics: Arc<DispatchMetrics>,
}

impl<C: DeliveryClient> Dispatcher<C> {
    /// Create a dispatcher around `client`
    pub fn new(client: C) -> Self {
        Self {
            client,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Share metrics with the caller
    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the dispatcher main loop
    ///
    /// Consumes batches until the input completes. The client is closed on
    /// every exit path. Returning drops `rx`, so an upstream stage still
    /// sending observes `ChannelClosed`.
    #[instrument(
        name = "dispatcher_run",
        skip(self, rx),
        fields(client = %self.client.name(), channel = %rx.name())
    )]
    pub async fn run(mut self, rx: StageReceiver<Batch>) -> Result<DispatchReport, SharedError> {
        info!("Dispatcher started");

        let mut total_times = timer_for(Level::DEBUG);
        let mut send_times = timer_for(Level::DEBUG);
        let started = Instant::now();

        let result = self.dispatch_all(&rx, send_times.as_mut()).await;
        drop(rx);

        let closed = self.client.close().await;
        if total_times.is_enabled() {
            total_times.put(started.elapsed());
        }

        let snapshot = self.metrics.snapshot();
        send_times.report("Send: batch (batch/sec)", 1);
        total_times.report("Send: total (record/sec)", snapshot.records_sent);

        match (result, closed) {
            (Ok(()), Ok(())) => {
                info!(
                    batches = snapshot.batches_sent,
                    records = snapshot.records_sent,
                    "Dispatcher input closed, shutdown complete"
                );
                Ok(snapshot.into())
            }
            (Ok(()), Err(close_error)) => {
                error!(error = %close_error, "Dispatcher failed to close client");
                Err(Arc::new(close_error))
            }
            (Err(error), closed) => {
                if let Err(close_error) = closed {
                    warn!(error = %close_error, "Client close failed after dispatch failure");
                }
                if error.is_cancellation() {
                    warn!(error = %error, "Dispatcher cancelled");
                } else {
                    error!(
                        batches = snapshot.batches_sent,
                        records = snapshot.records_sent,
                        error = %error,
                        "Dispatcher failed"
                    );
                }
                Err(error)
            }
        }
    }

    async fn dispatch_all(
        &mut self,
        rx: &StageReceiver<Batch>,
        send_times: &mut dyn Timer,
    ) -> Result<(), SharedError> {
        while let Some(batch) = rx.recv().await? {
            self.metrics.set_queue_len(rx.len());
            observability::record_queue_depth(rx.name(), rx.len());

            self.dispatch_batch(&batch, send_times)
                .await
                .map_err(Arc::new)?;

            let batches = self.metrics.batches_sent();
            if batches.is_multiple_of(100) {
                debug!(
                    batches,
                    records = self.metrics.records_sent(),
                    "Dispatcher progress"
                );
            }
        }
        Ok(())
    }

    async fn dispatch_batch(
        &mut self,
        batch: &Batch,
        send_times: &mut dyn Timer,
    ) -> Result<(), ContractError> {
        let started = Instant::now();
        let result = self.client.send(batch).await;
        let elapsed = started.elapsed();

        if send_times.is_enabled() {
            send_times.put(elapsed);
        }
        observability::record_delivery_latency_ms(
            self.client.name(),
            elapsed.as_secs_f64() * 1000.0,
        );

        match result {
            Ok(ack) => {
                self.metrics.record_delivery(ack.records, ack.bytes);
                observability::record_batch_dispatched(self.client.name(), ack.records, true);
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                observability::record_batch_dispatched(self.client.name(), batch.len(), false);
                Err(e)
            }
        }
    }
}
