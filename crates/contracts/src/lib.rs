//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - `RecordSource` produces `Record`s into a [`StageSender`]
//! - `BatchAssembler` folds them into `Batch`es nested under one `RootReference`
//! - `Dispatcher` hands every `Batch` to a `DeliveryClient`

mod batch;
mod channel;
mod delivery;
mod error;
mod record;
mod settings;

pub use batch::*;
pub use channel::{stage_channel, StageReceiver, StageSender};
pub use delivery::*;
pub use error::*;
pub use record::*;
pub use settings::*;
pub use validator::Validate;
