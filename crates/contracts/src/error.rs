//! Layered error definitions
//!
//! Categorized by source: config / decode / root / delivery / channel

use std::sync::Arc;

use thiserror::Error;

/// Error shared between a failed stage, its output queue and the pipeline.
///
/// A stage closes its queue with the same value it returns, so downstream
/// stages re-raise the original cause instead of a copy.
pub type SharedError = Arc<ContractError>;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Input Errors =====
    /// Malformed input line
    #[error("decode error at line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: DecodeError,
    },

    // ===== Delivery Errors =====
    /// Root reference could not be created
    #[error("client '{client}' failed to create root: {message}")]
    RootCreation { client: String, message: String },

    /// Batch delivery error
    #[error("client '{client}' failed to deliver batch {batch_id}: {message}")]
    Delivery {
        client: String,
        batch_id: u64,
        message: String,
    },

    /// Client connection error
    #[error("client '{client}' connection error: {message}")]
    ClientConnection { client: String, message: String },

    // ===== Channel Errors =====
    /// Consumer side of a queue went away while the producer was still sending
    #[error("channel '{channel}' closed by its consumer")]
    ChannelClosed { channel: String },

    /// Producer side of a queue went away without completing or failing it
    #[error("channel '{channel}' abandoned by its producer")]
    ChannelAbandoned { channel: String },

    /// A stage task panicked or was aborted
    #[error("stage '{stage}' terminated abnormally: {message}")]
    StagePanicked { stage: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create root creation error
    pub fn root_creation(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RootCreation {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Create batch delivery error
    pub fn delivery(client: impl Into<String>, batch_id: u64, message: impl Into<String>) -> Self {
        Self::Delivery {
            client: client.into(),
            batch_id,
            message: message.into(),
        }
    }

    /// Create client connection error
    pub fn client_connection(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientConnection {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Whether this error only reports that another stage stopped first.
    ///
    /// Cancellations are never the root cause of a failed run.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::ChannelClosed { .. })
    }
}

/// Failure to decode a single input line into a `Record`
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DecodeError {
    /// Create a decode error without an underlying cause
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error wrapping the parser's error
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable description
    pub fn message(&self) -> &str {
        &self.message
    }
}
