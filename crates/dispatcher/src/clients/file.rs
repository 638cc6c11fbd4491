//! FileClient - appends the root and batches as JSON lines

use contracts::{Ack, Batch, ContractError, DeliveryClient, RootProvider, RootReference};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

use super::{new_root, Envelope};

/// Configuration for FileClient
#[derive(Debug, Clone)]
pub struct FileClientConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Output file name inside `base_path`
    pub file_name: String,
}

impl FileClientConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let file_name = params
            .get("file_name")
            .cloned()
            .unwrap_or_else(|| "events.jsonl".to_string());

        Self {
            base_path,
            file_name,
        }
    }

    /// Full output path
    pub fn output_path(&self) -> PathBuf {
        self.base_path.join(&self.file_name)
    }
}

/// Client that appends JSON lines to a local file
pub struct FileClient {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileClient {
    /// Create a new FileClient
    pub fn new(name: impl Into<String>, config: FileClientConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        let path = config.output_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileClientConfig::from_params(params);
        Self::new(name, config)
    }

    /// Output file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn append(&mut self, envelope: &Envelope<'_>) -> std::io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file client closed"))?;
        let mut line = serde_json::to_vec(envelope)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        writer.write_all(&line)?;
        Ok(line.len())
    }
}

impl RootProvider for FileClient {
    #[instrument(name = "file_client_create_root", skip(self))]
    async fn create_root(
        &mut self,
        book: &str,
        scope: &str,
        label: &str,
    ) -> Result<RootReference, ContractError> {
        let root = new_root(book, scope);
        self.append(&Envelope::Root { label, root: &root })
            .map_err(|e| ContractError::root_creation(&self.name, e.to_string()))?;
        debug!(client = %self.name, root_id = %root.id, "Root written");
        Ok(root)
    }
}

impl DeliveryClient for FileClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_client_send",
        skip(self, batch),
        fields(client = %self.name, batch_id = batch.batch_id)
    )]
    async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError> {
        let bytes = self.append(&Envelope::Batch(batch)).map_err(|e| {
            error!(client = %self.name, batch_id = batch.batch_id, error = %e, "Write failed");
            ContractError::delivery(&self.name, batch.batch_id, e.to_string())
        })?;
        Ok(Ack {
            records: batch.len(),
            bytes,
        })
    }

    #[instrument(name = "file_client_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                ContractError::client_connection(&self.name, format!("flush failed: {e}"))
            })?;
        }
        debug!(client = %self.name, path = %self.path.display(), "FileClient closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Record;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_client_writes_root_then_batches() {
        let dir = tempdir().unwrap();
        let config = FileClientConfig {
            base_path: dir.path().join("nested"),
            file_name: "out.jsonl".to_string(),
        };

        let mut client = FileClient::new("test_file", config).unwrap();
        let root = Arc::new(client.create_root("book", "scope", "Root event").await.unwrap());
        for batch_id in 1..=2 {
            let batch = Batch {
                batch_id,
                parent: Arc::clone(&root),
                records: vec![Record::default()],
                estimated_size: 10,
            };
            let ack = client.send(&batch).await.unwrap();
            assert_eq!(ack.records, 1);
        }
        client.close().await.unwrap();

        let content = fs::read_to_string(dir.path().join("nested").join("out.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["root"]["label"], "Root event");
        assert_eq!(lines[0]["root"]["root"]["id"], root.id.as_str());
        assert_eq!(lines[2]["batch"]["batch_id"], 2);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let dir = tempdir().unwrap();
        let params = HashMap::from([(
            "base_path".to_string(),
            dir.path().display().to_string(),
        )]);
        let mut client = FileClient::from_params("test_file", &params).unwrap();
        client.close().await.unwrap();

        let batch = Batch {
            batch_id: 7,
            parent: Arc::new(RootReference::new("b", "s", "1")),
            records: vec![Record::default()],
            estimated_size: 10,
        };
        let err = client.send(&batch).await.unwrap_err();
        assert!(matches!(err, ContractError::Delivery { batch_id: 7, .. }));
    }

    #[test]
    fn test_default_output_path() {
        let config = FileClientConfig::from_params(&HashMap::new());
        assert_eq!(config.output_path(), PathBuf::from("./output/events.jsonl"));
    }
}
