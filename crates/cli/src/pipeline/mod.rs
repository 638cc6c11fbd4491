//! Pipeline orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig, PipelineFailure, PipelineState};
pub use stats::PipelineStats;
