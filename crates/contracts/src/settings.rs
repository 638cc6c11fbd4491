//! UploaderSettings - Config Loader output
//!
//! Describes the box identity (book/scope defaults), the delivery client and
//! the queue capacities between pipeline stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Box identity, read from `box.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BoxConfig {
    /// Box name, default event scope
    #[serde(default)]
    #[validate(length(min = 1, message = "boxName must not be blank"))]
    pub box_name: Option<String>,

    /// Book name, default event book
    #[serde(default)]
    #[validate(length(min = 1, message = "bookName must not be blank"))]
    pub book_name: Option<String>,
}

/// Uploader settings, read from `uploader.toml` / `uploader.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UploaderSettings {
    /// Delivery client
    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryConfig,

    /// Queue capacities
    #[serde(default)]
    #[validate(nested)]
    pub queues: QueueConfig,
}

/// Delivery client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryConfig {
    /// Client name (used for logging/metrics)
    #[serde(default = "default_client_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// Client type
    #[serde(default)]
    pub client: ClientType,

    /// Client-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            client: ClientType::default(),
            params: HashMap::new(),
        }
    }
}

fn default_client_name() -> String {
    "events".to_string()
}

/// Delivery client type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Log batch summaries
    #[default]
    Log,
    /// Append batches to a JSON lines file
    File,
    /// Stream length-prefixed frames over TCP
    Network,
}

/// Queue capacities between pipeline stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct QueueConfig {
    /// Decoded records waiting for the assembler
    #[serde(default = "default_read_buffer_size")]
    #[validate(range(min = 1))]
    pub read_buffer_size: usize,

    /// Sealed batches waiting for the dispatcher
    #[serde(default = "default_batch_buffer_size")]
    #[validate(range(min = 1))]
    pub batch_buffer_size: usize,
}

/// Default capacity of the record queue
pub const DEFAULT_READ_BUFFER_SIZE: usize = 50;

/// Default capacity of the batch queue
pub const DEFAULT_BATCH_BUFFER_SIZE: usize = 10;

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_batch_buffer_size() -> usize {
    DEFAULT_BATCH_BUFFER_SIZE
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            batch_buffer_size: DEFAULT_BATCH_BUFFER_SIZE,
        }
    }
}
