//! # Dispatcher
//!
//! Batch delivery module.
//!
//! Responsibilities:
//! - Consume sealed `Batch`es in arrival order
//! - Forward each one to a single `DeliveryClient`, no retry
//! - Provide log, file and network clients selected by configuration

pub mod clients;
pub mod dispatcher;
pub mod error;
pub mod metrics;

pub use clients::{
    create_client, ConfiguredClient, FileClient, FileClientConfig, LogClient, NetworkClient,
    NetworkClientConfig, NetworkFormat,
};
pub use contracts::{Batch, DeliveryClient, RootProvider};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::DispatcherError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
