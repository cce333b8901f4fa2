//! Column type detection.
//!
//! This module assigns a [`ColumnType`] to every column of a table:
//! - Native temporal, boolean, numeric and list dtypes map directly
//! - Numeric columns are checked for phone numbers and zip codes by range and name
//! - String columns go through a pattern cascade (lists, booleans, numbers,
//!   datetimes, emails, phones, zips, text, categories)
//!
//! Large tables are classified column-by-column on a rayon thread pool.

mod type_inference;

pub use type_inference::{infer_column_type, infer_number_type, infer_object_type};

use crate::config::CleanerConfig;
use crate::error::{CleanerError, Result};
use crate::types::{ColumnType, ColumnTypes};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

/// Infer types for every column not already present in `existing`.
///
/// Entries in `existing` are returned unchanged.
pub fn infer_column_types(
    df: &DataFrame,
    existing: Option<&ColumnTypes>,
    config: &CleanerConfig,
) -> Result<ColumnTypes> {
    let mut column_types = existing.cloned().unwrap_or_default();
    let pending: Vec<Series> = df
        .get_columns()
        .iter()
        .filter(|c| !column_types.contains_key(c.name().as_str()))
        .map(|c| c.as_materialized_series().clone())
        .collect();

    if pending.is_empty() {
        return Ok(column_types);
    }

    let inferred: Vec<(String, ColumnType)> = if df.height() > config.parallel_row_threshold {
        info!(
            "Inferring {} column types in parallel ({} rows)",
            pending.len(),
            df.height()
        );
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| CleanerError::Internal(format!("Failed to build thread pool: {}", e)))?;
        pool.install(|| {
            pending
                .par_iter()
                .map(|series| classify(series, config))
                .collect::<Result<Vec<_>>>()
        })?
    } else {
        pending
            .iter()
            .map(|series| classify(series, config))
            .collect::<Result<Vec<_>>>()?
    };

    column_types.extend(inferred);
    Ok(column_types)
}

fn classify(series: &Series, config: &CleanerConfig) -> Result<(String, ColumnType)> {
    let column_type = infer_column_type(series, config)?;
    debug!("Column '{}' inferred as {}", series.name(), column_type);
    Ok((series.name().to_string(), column_type))
}
