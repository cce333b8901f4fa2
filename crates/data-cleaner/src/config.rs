//! Configuration for type detection, cleaning and transformer actions.
//!
//! Use [`CleanerConfig::builder()`] for a validated configuration, or load one
//! from JSON (the CLI's `--config` flag); missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of distinct values a column may have and still be a category.
pub const DEFAULT_CATEGORY_CARDINALITY_THRESHOLD: usize = 255;

/// Default row count above which column types are inferred in parallel.
pub const DEFAULT_PARALLEL_ROW_THRESHOLD: usize = 50_000;

/// Configuration for the cleaning engine.
///
/// # Example
///
/// ```rust,ignore
/// use data_cleaner::CleanerConfig;
///
/// let config = CleanerConfig::builder()
///     .category_cardinality_threshold(100)
///     .parallel_row_threshold(10_000)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Columns with at most this many distinct values are `category`,
    /// otherwise `category_high_cardinality`.
    /// Default: 255
    pub category_cardinality_threshold: usize,

    /// Tables with more rows than this infer column types on a worker pool.
    /// Default: 50,000
    pub parallel_row_threshold: usize,

    /// Size of the inference worker pool. `None` uses one thread per core.
    /// Default: None
    pub worker_threads: Option<usize>,

    /// Seed for random imputation and isolation forests.
    /// Default: 42
    pub random_seed: u64,

    /// Neighborhood size for local outlier factor.
    /// Default: 20
    pub lof_neighbors: usize,

    /// Number of trees in the isolation forest.
    /// Default: 100
    pub isolation_trees: usize,

    /// Sub-sample size per isolation tree.
    /// Default: 256
    pub isolation_sample_size: usize,

    /// Expected share of outliers; bounds how many rows may be removed.
    /// Default: 0.1
    pub contamination: f64,

    /// Interpreter used by the script-style custom action executor.
    /// Default: "python3"
    pub python_executable: String,

    /// Wall-clock limit for one custom action script.
    /// Default: 300
    pub custom_action_timeout_secs: u64,

    /// Whether the pipeline normalizes cell values after type inference.
    /// Default: true
    pub clean_values: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            category_cardinality_threshold: DEFAULT_CATEGORY_CARDINALITY_THRESHOLD,
            parallel_row_threshold: DEFAULT_PARALLEL_ROW_THRESHOLD,
            worker_threads: None,
            random_seed: 42,
            lof_neighbors: 20,
            isolation_trees: 100,
            isolation_sample_size: 256,
            contamination: 0.1,
            python_executable: "python3".to_string(),
            custom_action_timeout_secs: 300,
            clean_values: true,
        }
    }
}

impl CleanerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleanerConfigBuilder {
        CleanerConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CleanerConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::CleanerError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ConfigValidationError::InvalidContamination(
                self.contamination,
            ));
        }

        for (field, value) in [
            ("lof_neighbors", self.lof_neighbors),
            ("isolation_trees", self.isolation_trees),
            ("isolation_sample_size", self.isolation_sample_size),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::MustBePositive {
                    field: field.to_string(),
                });
            }
        }

        if self.worker_threads == Some(0) {
            return Err(ConfigValidationError::MustBePositive {
                field: "worker_threads".to_string(),
            });
        }

        if self.python_executable.trim().is_empty() {
            return Err(ConfigValidationError::EmptyExecutable);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid contamination: {0} (must be in (0.0, 0.5])")]
    InvalidContamination(f64),

    #[error("'{field}' must be at least 1")]
    MustBePositive { field: String },

    #[error("python_executable must not be empty")]
    EmptyExecutable,
}

/// Builder for [`CleanerConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleanerConfigBuilder {
    category_cardinality_threshold: Option<usize>,
    parallel_row_threshold: Option<usize>,
    worker_threads: Option<usize>,
    random_seed: Option<u64>,
    lof_neighbors: Option<usize>,
    isolation_trees: Option<usize>,
    isolation_sample_size: Option<usize>,
    contamination: Option<f64>,
    python_executable: Option<String>,
    custom_action_timeout_secs: Option<u64>,
    clean_values: Option<bool>,
}

impl CleanerConfigBuilder {
    /// Set the distinct-value cutoff between `category` and
    /// `category_high_cardinality`.
    pub fn category_cardinality_threshold(mut self, threshold: usize) -> Self {
        self.category_cardinality_threshold = Some(threshold);
        self
    }

    /// Set the row count above which inference runs in parallel.
    pub fn parallel_row_threshold(mut self, rows: usize) -> Self {
        self.parallel_row_threshold = Some(rows);
        self
    }

    /// Set the size of the inference worker pool.
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Set the seed used by random imputation and isolation forests.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the LOF neighborhood size.
    pub fn lof_neighbors(mut self, k: usize) -> Self {
        self.lof_neighbors = Some(k);
        self
    }

    /// Set the number of isolation trees.
    pub fn isolation_trees(mut self, trees: usize) -> Self {
        self.isolation_trees = Some(trees);
        self
    }

    /// Set the isolation tree sub-sample size.
    pub fn isolation_sample_size(mut self, size: usize) -> Self {
        self.isolation_sample_size = Some(size);
        self
    }

    /// Set the expected outlier share.
    pub fn contamination(mut self, contamination: f64) -> Self {
        self.contamination = Some(contamination);
        self
    }

    /// Set the interpreter for script-style custom actions.
    pub fn python_executable(mut self, executable: impl Into<String>) -> Self {
        self.python_executable = Some(executable.into());
        self
    }

    /// Set the custom action timeout in seconds.
    pub fn custom_action_timeout_secs(mut self, secs: u64) -> Self {
        self.custom_action_timeout_secs = Some(secs);
        self
    }

    /// Enable or disable value cleaning in the pipeline.
    pub fn clean_values(mut self, clean: bool) -> Self {
        self.clean_values = Some(clean);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleanerConfig` or an error if validation fails.
    pub fn build(self) -> Result<CleanerConfig, ConfigValidationError> {
        let defaults = CleanerConfig::default();
        let config = CleanerConfig {
            category_cardinality_threshold: self
                .category_cardinality_threshold
                .unwrap_or(defaults.category_cardinality_threshold),
            parallel_row_threshold: self
                .parallel_row_threshold
                .unwrap_or(defaults.parallel_row_threshold),
            worker_threads: self.worker_threads,
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            lof_neighbors: self.lof_neighbors.unwrap_or(defaults.lof_neighbors),
            isolation_trees: self.isolation_trees.unwrap_or(defaults.isolation_trees),
            isolation_sample_size: self
                .isolation_sample_size
                .unwrap_or(defaults.isolation_sample_size),
            contamination: self.contamination.unwrap_or(defaults.contamination),
            python_executable: self
                .python_executable
                .unwrap_or(defaults.python_executable),
            custom_action_timeout_secs: self
                .custom_action_timeout_secs
                .unwrap_or(defaults.custom_action_timeout_secs),
            clean_values: self.clean_values.unwrap_or(defaults.clean_values),
        };

        config.validate()?;
        Ok(config)
    }
}
