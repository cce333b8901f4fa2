//! Pipeline module.
//!
//! Runs type detection, value cleaning and a list of actions over one
//! table, with progress reporting and cancellation.

mod builder;
pub mod progress;

pub use builder::{CleaningPipeline, CleaningPipelineBuilder};
pub use progress::{
    CancellationToken, CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};

use crate::types::ColumnTypes;
use polars::prelude::*;
use serde::Serialize;

/// Output of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    #[serde(skip)]
    pub data: DataFrame,
    pub column_types: ColumnTypes,
    /// One human-readable line per completed step
    pub steps: Vec<String>,
}
