//! Delivery client implementations
//!
//! Contains LogClient, FileClient, and NetworkClient, plus the
//! configuration-driven `ConfiguredClient`.

mod file;
mod log;
mod network;

pub use self::file::{FileClient, FileClientConfig};
pub use self::log::LogClient;
pub use self::network::{NetworkClient, NetworkClientConfig, NetworkFormat};

use chrono::Utc;
use contracts::{
    Ack, Batch, ClientType, ContractError, DeliveryClient, DeliveryConfig, RootProvider,
    RootReference,
};
use serde::Serialize;
use tracing::instrument;

use crate::error::DispatcherError;

/// Message written by the file and network clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope<'a> {
    /// The run's root, sent once before any batch
    Root {
        label: &'a str,
        root: &'a RootReference,
    },
    /// One sealed batch
    Batch(&'a Batch),
}

/// Create a root reference with a time-based unique id
pub(crate) fn new_root(book: &str, scope: &str) -> RootReference {
    let id = Utc::now().format("%Y%m%d%H%M%S%9f").to_string();
    RootReference::new(book, scope, id)
}

/// Client selected by configuration
pub enum ConfiguredClient {
    Log(LogClient),
    File(FileClient),
    Network(NetworkClient),
}

/// Create a delivery client from configuration
#[instrument(
    name = "dispatcher_create_client",
    skip(config),
    fields(client = %config.name, client_type = ?config.client)
)]
pub async fn create_client(config: &DeliveryConfig) -> Result<ConfiguredClient, DispatcherError> {
    match config.client {
        ClientType::Log => Ok(ConfiguredClient::Log(LogClient::new(&config.name))),
        ClientType::File => {
            let client = FileClient::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::client_creation(&config.name, e.to_string()))?;
            Ok(ConfiguredClient::File(client))
        }
        ClientType::Network => {
            let client = NetworkClient::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::client_creation(&config.name, e.to_string()))?;
            Ok(ConfiguredClient::Network(client))
        }
    }
}

impl DeliveryClient for ConfiguredClient {
    fn name(&self) -> &str {
        match self {
            Self::Log(client) => client.name(),
            Self::File(client) => client.name(),
            Self::Network(client) => client.name(),
        }
    }

    async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError> {
        match self {
            Self::Log(client) => client.send(batch).await,
            Self::File(client) => client.send(batch).await,
            Self::Network(client) => client.send(batch).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(client) => client.close().await,
            Self::File(client) => client.close().await,
            Self::Network(client) => client.close().await,
        }
    }
}

impl RootProvider for ConfiguredClient {
    async fn create_root(
        &mut self,
        book: &str,
        scope: &str,
        label: &str,
    ) -> Result<RootReference, ContractError> {
        match self {
            Self::Log(client) => client.create_root(book, scope, label).await,
            Self::File(client) => client.create_root(book, scope, label).await,
            Self::Network(client) => client.create_root(book, scope, label).await,
        }
    }
}
