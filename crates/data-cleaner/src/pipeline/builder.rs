//! The cleaning pipeline and its builder.

use crate::actions::{ActionExecutor, CustomActionExecutor};
use crate::cleaner::clean_dataframe;
use crate::config::{CleanerConfig, ConfigValidationError};
use crate::error::{CleanerError, Result};
use crate::pipeline::PipelineResult;
use crate::pipeline::progress::{
    CancellationToken, CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::profiler::infer_column_types;
use crate::types::{ActionDescription, ColumnTypes};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Type detection, value cleaning and action application as one run.
///
/// Use [`CleaningPipeline::builder()`] to configure a pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use data_cleaner::{ActionDescription, ActionType, CleaningPipeline};
///
/// let result = CleaningPipeline::builder()
///     .actions(vec![
///         ActionDescription::new(ActionType::Impute)
///             .with_arguments(["age"])
///             .with_option("strategy", "median"),
///     ])
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()?
///     .run(df, None)?;
/// ```
pub struct CleaningPipeline {
    config: CleanerConfig,
    actions: Vec<ActionDescription>,
    executor: ActionExecutor,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(CleaningPipeline: Send, Sync);

impl CleaningPipeline {
    pub fn builder() -> CleaningPipelineBuilder {
        CleaningPipelineBuilder::default()
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Run the pipeline over `df`.
    ///
    /// Types in `column_types` are kept; the rest are inferred.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Cancelled`] if the token was cancelled, or the
    /// first action error wrapped with the failing action's position.
    pub fn run(&self, df: DataFrame, column_types: Option<&ColumnTypes>) -> Result<PipelineResult> {
        match self.run_internal(df, column_types) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(CleanerError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(
        &self,
        df: DataFrame,
        column_types: Option<&ColumnTypes>,
    ) -> Result<PipelineResult> {
        let start = Instant::now();
        let mut steps = Vec::new();

        info!(
            "Starting cleaning pipeline ({} rows, {} columns, {} actions)",
            df.height(),
            df.width(),
            self.actions.len()
        );
        self.report_progress(ProgressUpdate::new(
            CleaningStage::Initializing,
            0.0,
            "Starting cleaning pipeline...",
        ));
        self.check_cancelled()?;

        self.report_progress(ProgressUpdate::new(
            CleaningStage::TypeInference,
            0.0,
            "Inferring column types...",
        ));
        let mut types = infer_column_types(&df, column_types, &self.config)?;
        steps.push(format!("Inferred types for {} columns", types.len()));
        self.report_progress(ProgressUpdate::new(
            CleaningStage::TypeInference,
            1.0,
            "Type inference complete",
        ));
        self.check_cancelled()?;

        let mut df = if self.config.clean_values {
            self.report_progress(ProgressUpdate::new(
                CleaningStage::Cleaning,
                0.0,
                "Cleaning values...",
            ));
            let cleaned = clean_dataframe(&df, &types, false)?;
            steps.push(format!("Cleaned values in {} columns", types.len()));
            self.report_progress(ProgressUpdate::new(
                CleaningStage::Cleaning,
                1.0,
                "Value cleaning complete",
            ));
            cleaned
        } else {
            info!("Skipping value cleaning (disabled)");
            df
        };

        let total = self.actions.len();
        for (i, action) in self.actions.iter().enumerate() {
            self.check_cancelled()?;
            let label = format!("Action: {}", action.action_type);
            self.report_progress(ProgressUpdate::with_items(
                CleaningStage::Transforming,
                label.clone(),
                i,
                total,
                format!("Applying {} ({}/{})", action.action_type, i + 1, total),
            ));

            let before = (df.height(), df.width());
            df = self
                .executor
                .apply_tracked(df, action, &mut types)
                .map_err(|e| e.with_context(format!("action {} ({})", i + 1, action.action_type)))?;
            steps.push(format!(
                "Applied {} to [{}]: {}x{} -> {}x{}",
                action.action_type,
                action.action_arguments.join(", "),
                before.0,
                before.1,
                df.height(),
                df.width()
            ));
        }
        if total > 0 {
            self.report_progress(ProgressUpdate::with_items(
                CleaningStage::Transforming,
                "Actions",
                total,
                total,
                "All actions applied",
            ));
        }

        info!(
            "Cleaning pipeline finished in {:.2?} ({} rows, {} columns)",
            start.elapsed(),
            df.height(),
            df.width()
        );
        Ok(PipelineResult {
            data: df,
            column_types: types,
            steps,
        })
    }
}

/// Builder for [`CleaningPipeline`].
#[derive(Default)]
pub struct CleaningPipelineBuilder {
    config: Option<CleanerConfig>,
    actions: Vec<ActionDescription>,
    custom_executor: Option<Arc<dyn CustomActionExecutor>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(CleaningPipelineBuilder: Send);

impl CleaningPipelineBuilder {
    pub fn config(mut self, config: CleanerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Actions applied in order after type inference and cleaning.
    pub fn actions(mut self, actions: Vec<ActionDescription>) -> Self {
        self.actions = actions;
        self
    }

    /// Executor for `custom` actions. Without one, `custom` actions fail.
    pub fn custom_executor(mut self, executor: Arc<dyn CustomActionExecutor>) -> Self {
        self.custom_executor = Some(executor);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<CleaningPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut executor = ActionExecutor::new(config.clone());
        if let Some(custom) = self.custom_executor {
            executor = executor.with_custom_executor(custom);
        }

        Ok(CleaningPipeline {
            config,
            actions: self.actions,
            executor,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::TransformerChain;
    use crate::types::{ActionType, ColumnType};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df!(
            "price" => &[Some("$1,000"), Some("20"), None, Some("35")],
            "label" => &[Some("a"), Some("b"), Some("a"), Some("c")],
        )
        .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let pipeline = CleaningPipeline::builder().build().unwrap();
        assert!(pipeline.actions.is_empty());
        assert!(pipeline.config.clean_values);
        assert!(!pipeline.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = CleanerConfig {
            contamination: 2.0,
            ..CleanerConfig::default()
        };
        assert!(CleaningPipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_run_cleans_and_applies_actions() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        let pipeline = CleaningPipeline::builder()
            .actions(vec![
                ActionDescription::new(ActionType::Impute)
                    .with_arguments(["price"])
                    .with_option("strategy", "constant"),
                ActionDescription::new(ActionType::Max)
                    .with_arguments(["price"])
                    .with_output("max_price", ColumnType::Number),
            ])
            .on_progress(move |update| sink.lock().push(update.stage))
            .build()
            .unwrap();

        let result = pipeline.run(sample(), None).unwrap();

        let prices: Vec<Option<i64>> = result.data.column("price").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(prices, vec![Some(1000), Some(20), Some(0), Some(35)]);
        assert_eq!(result.column_types["price"], ColumnType::Number);
        assert_eq!(result.column_types["max_price"], ColumnType::Number);
        assert_eq!(result.steps.len(), 4);

        let stages = updates.lock().clone();
        assert_eq!(stages.first(), Some(&CleaningStage::Initializing));
        assert_eq!(stages.last(), Some(&CleaningStage::Complete));
        assert_eq!(
            stages.iter().filter(|s| **s == CleaningStage::Transforming).count(),
            3
        );
    }

    #[test]
    fn test_known_types_are_kept() {
        let known = ColumnTypes::from([("label".to_string(), ColumnType::Text)]);
        let result = CleaningPipeline::builder()
            .build()
            .unwrap()
            .run(sample(), Some(&known))
            .unwrap();
        assert_eq!(result.column_types["label"], ColumnType::Text);
    }

    #[test]
    fn test_custom_actions_use_registered_executor() {
        let chain = TransformerChain::new().register("first_two", |df: DataFrame| Ok(df.head(Some(2))));
        let pipeline = CleaningPipeline::builder()
            .actions(vec![ActionDescription::new(ActionType::Custom).with_code("first_two")])
            .custom_executor(Arc::new(chain))
            .build()
            .unwrap();
        assert_eq!(pipeline.run(sample(), None).unwrap().data.height(), 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let last = Arc::new(Mutex::new(None));
        let sink = last.clone();
        let pipeline = CleaningPipeline::builder()
            .cancellation_token(token)
            .on_progress(move |update| *sink.lock() = Some(update.stage))
            .build()
            .unwrap();

        let err = pipeline.run(sample(), None).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(*last.lock(), Some(CleaningStage::Cancelled));
    }

    #[test]
    fn test_failure_names_the_action() {
        let pipeline = CleaningPipeline::builder()
            .actions(vec![ActionDescription::new(ActionType::Custom)])
            .build()
            .unwrap();
        let err = pipeline.run(sample(), None).unwrap_err();
        assert_eq!(err.error_code(), "CUSTOM_ACTION_UNAVAILABLE");
        assert!(err.to_string().starts_with("action 1 (custom)"));
    }
}
