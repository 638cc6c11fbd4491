//! Collaborator traits at the edges of the core pipeline
//!
//! - `RecordDecoder`: turns one input line into a `Record`
//! - `RootProvider`: creates the run's `RootReference`
//! - `DeliveryClient`: Dispatcher output interface

use serde::{Deserialize, Serialize};

use crate::{Batch, ContractError, DecodeError, Record, RootReference};

/// Line decoder used by RecordSource
pub trait RecordDecoder: Send + Sync {
    /// Decode a single line (without its terminator)
    ///
    /// # Errors
    /// Returns a decode error for malformed input; the caller aborts the run.
    fn decode(&self, line: &str) -> Result<Record, DecodeError>;
}

/// Acknowledgement returned for a delivered batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Records accepted
    pub records: usize,

    /// Bytes handed to the transport
    pub bytes: usize,
}

/// Creates the root every batch of a run is nested under
#[trait_variant::make(RootProvider: Send)]
pub trait LocalRootProvider {
    /// Create the run's root reference
    ///
    /// Called exactly once per run, before any record is read.
    ///
    /// # Errors
    /// Returns a root creation or connection error; the run does not start.
    async fn create_root(
        &mut self,
        book: &str,
        scope: &str,
        label: &str,
    ) -> Result<RootReference, ContractError>;
}

/// Batch delivery trait
///
/// All delivery client implementations must implement this trait.
#[trait_variant::make(DeliveryClient: Send)]
pub trait LocalDeliveryClient {
    /// Client name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one sealed batch
    ///
    /// # Errors
    /// Returns delivery error (should include context). Not retried.
    async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError>;

    /// Flush and release the transport
    async fn close(&mut self) -> Result<(), ContractError>;
}
