//! NetworkClient - length-prefixed frames over TCP
//!
//! Every message is a 4-byte big-endian length followed by the payload.

use config_loader::parse_byte_size;
use contracts::{Ack, Batch, ContractError, DeliveryClient, RootProvider, RootReference};
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use super::{new_root, Envelope};

/// Default upper bound for a single frame payload (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkClient
#[derive(Debug, Clone)]
pub struct NetworkClientConfig {
    /// Target address (`host:port`)
    pub addr: String,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max payload size of one frame
    pub max_frame_size: usize,
}

impl NetworkClientConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr = params
            .get("addr")
            .cloned()
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_frame_size = match params.get("max_frame_size") {
            Some(value) => parse_byte_size(value).map_err(|e| e.to_string())?,
            None => DEFAULT_MAX_FRAME_SIZE,
        };

        Ok(Self {
            addr,
            format,
            max_frame_size,
        })
    }
}

/// Client that streams frames over a TCP connection
pub struct NetworkClient {
    name: String,
    config: NetworkClientConfig,
    stream: Option<TcpStream>,
}

impl NetworkClient {
    /// Connect a new NetworkClient
    #[instrument(name = "network_client_new", skip(name, config), fields(addr = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkClientConfig) -> std::io::Result<Self> {
        let name = name.into();
        let stream = TcpStream::connect(config.addr.as_str()).await?;
        stream.set_nodelay(true)?;

        debug!(
            client = %name,
            target = %config.addr,
            "NetworkClient connected"
        );

        Ok(Self {
            name,
            config,
            stream: Some(stream),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_client_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkClientConfig::from_params(params)
            .map_err(|e| ContractError::client_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::client_connection(&name, e.to_string()))
    }

    fn serialize(&self, envelope: &Envelope<'_>) -> Result<Vec<u8>, String> {
        match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(envelope).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(envelope).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn prepare_frame(&self, envelope: &Envelope<'_>) -> Result<Vec<u8>, String> {
        let payload = self.serialize(envelope)?;

        if payload.len() > self.config.max_frame_size {
            warn!(
                client = %self.name,
                size = payload.len(),
                max = self.config.max_frame_size,
                "Frame too large, rejecting"
            );
            return Err(format!(
                "frame of {} bytes exceeds max_frame_size {}",
                payload.len(),
                self.config.max_frame_size
            ));
        }
        let length = u32::try_from(payload.len())
            .map_err(|_| format!("frame of {} bytes exceeds u32 length", payload.len()))?;

        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    async fn transmit(&mut self, frame: &[u8]) -> Result<(), String> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| "stream not connected".to_string())?;
        stream
            .write_all(frame)
            .await
            .map_err(|e| format!("tcp write failed: {}", e))
    }
}

impl RootProvider for NetworkClient {
    #[instrument(name = "network_client_create_root", skip(self))]
    async fn create_root(
        &mut self,
        book: &str,
        scope: &str,
        label: &str,
    ) -> Result<RootReference, ContractError> {
        let root = new_root(book, scope);
        let frame = self
            .prepare_frame(&Envelope::Root { label, root: &root })
            .map_err(|e| ContractError::root_creation(&self.name, e))?;
        self.transmit(&frame)
            .await
            .map_err(|e| ContractError::root_creation(&self.name, e))?;
        Ok(root)
    }
}

impl DeliveryClient for NetworkClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_client_send",
        skip(self, batch),
        fields(client = %self.name, batch_id = batch.batch_id)
    )]
    async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError> {
        let frame = self
            .prepare_frame(&Envelope::Batch(batch))
            .map_err(|e| ContractError::delivery(&self.name, batch.batch_id, e))?;
        self.transmit(&frame)
            .await
            .map_err(|e| ContractError::delivery(&self.name, batch.batch_id, e))?;

        debug!(client = %self.name, batch_id = batch.batch_id, bytes = frame.len(), "Sent");
        Ok(Ack {
            records: batch.len(),
            bytes: frame.len(),
        })
    }

    #[instrument(name = "network_client_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| ContractError::client_connection(&self.name, e.to_string()))?;
        }
        debug!(client = %self.name, "NetworkClient closed");
        Ok(())
    }
}
