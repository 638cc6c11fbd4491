//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Argument failed validation
    #[error("Invalid value for --{name}: {message}")]
    InvalidArgument { name: String, message: String },

    /// Required value given neither on the command line nor in box.json
    #[error("Missing {name}: pass --{name} or set {config_key} in box.json")]
    MissingOption { name: String, config_key: String },

    /// Pipeline was interrupted by a shutdown signal
    #[error("Interrupted by {signal}")]
    Interrupted { signal: String },
}

impl CliError {
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn missing_option(name: impl Into<String>, config_key: impl Into<String>) -> Self {
        Self::MissingOption {
            name: name.into(),
            config_key: config_key.into(),
        }
    }

    pub fn interrupted(signal: impl Into<String>) -> Self {
        Self::Interrupted {
            signal: signal.into(),
        }
    }
}
