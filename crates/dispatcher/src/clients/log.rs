//! LogClient - logs batch summaries via tracing

use contracts::{Ack, Batch, ContractError, DeliveryClient, RootProvider, RootReference};
use tracing::{info, instrument};

use super::new_root;

/// Client that logs batch summaries instead of delivering them
pub struct LogClient {
    name: String,
}

impl LogClient {
    /// Create a new LogClient with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &Batch) {
        let named = batch.records.iter().filter(|r| r.name.is_some()).count();
        let attachments: usize = batch
            .records
            .iter()
            .map(|r| r.attached_message_ids.len())
            .sum();

        info!(
            client = %self.name,
            batch_id = batch.batch_id,
            parent = %batch.parent.id,
            records = batch.len(),
            named,
            attachments,
            estimated_size = batch.estimated_size,
            "Batch received"
        );
    }
}

impl RootProvider for LogClient {
    #[instrument(name = "log_client_create_root", skip(self))]
    async fn create_root(
        &mut self,
        book: &str,
        scope: &str,
        label: &str,
    ) -> Result<RootReference, ContractError> {
        let root = new_root(book, scope);
        info!(client = %self.name, root_id = %root.id, label, "Root created");
        Ok(root)
    }
}

impl DeliveryClient for LogClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_client_send",
        skip(self, batch),
        fields(client = %self.name, batch_id = batch.batch_id)
    )]
    async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError> {
        self.log_batch_summary(batch);
        Ok(Ack {
            records: batch.len(),
            bytes: batch.estimated_size,
        })
    }

    #[instrument(name = "log_client_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(client = %self.name, "LogClient closed");
        Ok(())
    }
}
