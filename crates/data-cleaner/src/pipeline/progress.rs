//! Progress reporting and cancellation support for the cleaning pipeline.
//!
//! A pipeline run reports a [`ProgressUpdate`] at every stage boundary and
//! once per applied action. A [`CancellationToken`] can be shared with
//! another thread to stop a run between steps.
//!
//! # Example
//!
//! ```rust,ignore
//! use data_cleaner::{CancellationToken, CleaningPipeline};
//!
//! let token = CancellationToken::new();
//! let result = CleaningPipeline::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| println!("[{:?}] {}", update.stage, update.message))
//!     .build()?
//!     .run(df, None)?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a cleaning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Validating configuration and input
    Initializing,
    /// Detecting column types
    TypeInference,
    /// Normalizing cell values to their column types
    Cleaning,
    /// Applying action descriptions
    Transforming,
    /// Run completed successfully
    Complete,
    /// Run was cancelled
    Cancelled,
    /// Run failed with an error
    Failed,
}

impl CleaningStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::TypeInference => "Inferring Types",
            Self::Cleaning => "Cleaning Values",
            Self::Transforming => "Applying Actions",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run taken by this stage (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.05,
            Self::TypeInference => 0.25,
            Self::Cleaning => 0.20,
            Self::Transforming => 0.50,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::TypeInference => 0.05,
            Self::Cleaning => 0.30,
            Self::Transforming => 0.50,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// A progress report from a running pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: CleaningStage,

    /// Finer-grained position, e.g. `"Action: impute"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: CleaningStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// An update counting items within a stage.
    pub fn with_items(
        stage: CleaningStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(CleaningStage::Cancelled, 0.0, "Pipeline cancelled by user")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Failed, 0.0, message)
    }
}

/// Receives progress updates from a pipeline run.
///
/// Called synchronously from the pipeline thread; implementations should
/// return quickly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag for stopping a pipeline run from another thread.
///
/// The pipeline checks the token between stages and between actions and
/// returns [`CleanerError::Cancelled`](crate::error::CleanerError::Cancelled)
/// once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
