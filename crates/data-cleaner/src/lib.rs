//! Column type detection and data cleaning engine.
//!
//! # Overview
//!
//! This library classifies the columns of a [`polars`] table into semantic
//! types and cleans and transforms them:
//!
//! - **Type detection**: [`infer_column_types`] assigns a [`ColumnType`]
//!   to every column, in parallel for large tables
//! - **Value cleaning**: [`clean_series`] / [`clean_dataframe`] normalize
//!   dirty numbers, dates, phone numbers, zip codes and list literals
//! - **Syntax checks**: [`find_syntax_errors`] flags cells that do not
//!   match their type's canonical pattern
//! - **Actions**: [`ActionExecutor`] applies declarative
//!   [`ActionDescription`]s (aggregations, imputation, reformatting, UDF
//!   columns, outlier removal, custom code, ...)
//! - **Queries**: [`compile_query`] turns a small SQL dialect into a row
//!   filter
//! - **Pipeline**: [`CleaningPipeline`] chains all of the above with
//!   progress reporting and cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use data_cleaner::{ActionDescription, ActionType, CleaningPipeline, ColumnType};
//!
//! let result = CleaningPipeline::builder()
//!     .actions(vec![
//!         ActionDescription::new(ActionType::Impute)
//!             .with_arguments(["price"])
//!             .with_option("strategy", "median"),
//!         ActionDescription::new(ActionType::Average)
//!             .with_arguments(["price"])
//!             .with_option("groupby_columns", serde_json::json!(["store"]))
//!             .with_output("avg_price", ColumnType::NumberWithDecimals),
//!     ])
//!     .build()?
//!     .run(df, None)?;
//!
//! println!("{:?}", result.column_types);
//! ```

pub mod actions;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod imputers;
pub mod outliers;
pub mod patterns;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod query;
pub mod types;
pub mod udf;
pub mod utils;

pub use actions::{
    ActionExecutor, ActionOptions, CustomActionExecutor, PythonScriptExecutor, ReformatKind,
    Transformer, TransformerChain,
};
pub use cleaner::{
    FrozenList, Literal, clean_dataframe, clean_series, lists_to_strings, parse_list,
};
pub use config::{CleanerConfig, CleanerConfigBuilder, ConfigValidationError};
pub use error::{CleanerError, Result as CleanerResult, ResultExt};
pub use imputers::{ImputeOptions, ImputeStrategy, Imputer};
pub use outliers::{OutlierMethod, OutlierRemover};
pub use pipeline::{
    CancellationToken, CleaningPipeline, CleaningPipelineBuilder, CleaningStage,
    ClosureProgressReporter, PipelineResult, ProgressReporter, ProgressUpdate,
};
pub use profiler::{infer_column_type, infer_column_types};
pub use quality::{count_syntax_errors, find_syntax_errors};
pub use query::{CompiledQuery, compile_filter, compile_query};
pub use types::{
    ActionDescription, ActionType, ActionVariable, Axis, ColumnType, ColumnTypes, Feature,
    OutputColumn,
};
pub use udf::Udf;
