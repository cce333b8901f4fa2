//! Shared utilities for series access and conversion.
//!
//! This module contains the dtype predicates and value extractors that the
//! detector, cleaner and actions all lean on.

use polars::prelude::*;
use std::cmp::Ordering;

use crate::error::{CleanerError, Result};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a physical data type for dispatch purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer types
    Integer,
    /// Floating point types
    Float,
    /// Date, datetime or time types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/object type (including all-null columns)
    String,
    /// List type
    List,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_integer_dtype(dtype) {
        DtypeCategory::Integer
    } else if is_numeric_dtype(dtype) {
        DtypeCategory::Float
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(
        dtype,
        DataType::String | DataType::Categorical(_, _) | DataType::Null
    ) {
        DtypeCategory::String
    } else if matches!(dtype, DataType::List(_)) {
        DtypeCategory::List
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Column Access
// =============================================================================

/// Fetch a column as a materialized series, naming the column on failure.
pub fn column_series(df: &DataFrame, name: &str) -> Result<Series> {
    df.column(name)
        .map(|c| c.as_materialized_series().clone())
        .map_err(|_| CleanerError::ColumnNotFound(name.to_string()))
}

/// Render every cell as an optional string.
///
/// Strings pass through; lists and other nested values use their display form.
pub fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    match series.dtype() {
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()),
        DataType::List(_) => {
            let mut out = Vec::with_capacity(series.len());
            for i in 0..series.len() {
                let value = series.get(i)?;
                out.push(match value {
                    AnyValue::Null => None,
                    other => Some(format!("{}", other)),
                });
            }
            Ok(out)
        }
        _ => {
            let casted = series.cast(&DataType::String)?;
            Ok(casted
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect())
        }
    }
}

/// Cast a numeric or boolean series to `f64` values.
pub fn f64_values(series: &Series) -> Result<Vec<Option<f64>>> {
    if is_datetime_dtype(series.dtype()) {
        return Ok(datetime_millis(series)?
            .into_iter()
            .map(|v| v.map(|ms| ms as f64))
            .collect());
    }
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Epoch milliseconds for every cell of a temporal series.
pub fn datetime_millis(series: &Series) -> Result<Vec<Option<i64>>> {
    let casted = series
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

/// Build a millisecond datetime series from epoch milliseconds.
pub fn millis_to_series(name: PlSmallStr, values: Vec<Option<i64>>) -> Result<Series> {
    Ok(Series::new(name, values).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

/// Convert epoch milliseconds to a naive datetime.
pub fn millis_to_naive(ms: i64) -> Option<chrono::NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

// =============================================================================
// Row Keys
// =============================================================================

/// A totally ordered cell value used for sorting and grouping.
#[derive(Debug, Clone)]
pub enum SortKey {
    Bool(bool),
    Num(f64),
    Str(String),
    Null,
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Num(_) => 1,
            Self::Str(_) => 2,
            Self::Null => 3,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Num(a), Self::Num(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Ordered keys for every cell of a series.
pub fn sort_keys(series: &Series) -> Result<Vec<SortKey>> {
    let dtype = series.dtype();
    let keys = if is_numeric_dtype(dtype) || is_datetime_dtype(dtype) {
        f64_values(series)?
            .into_iter()
            .map(|v| v.map_or(SortKey::Null, SortKey::Num))
            .collect()
    } else if matches!(dtype, DataType::Boolean) {
        series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(SortKey::Null, SortKey::Bool))
            .collect()
    } else {
        string_values(series)?
            .into_iter()
            .map(|v| v.map_or(SortKey::Null, SortKey::Str))
            .collect()
    };
    Ok(keys)
}

/// Row indices as a polars index array.
pub fn to_idx(indices: &[usize]) -> IdxCa {
    IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    )
}

/// Stable sort of row indices by the given keys, nulls last.
pub fn sorted_indices(key_columns: &[Vec<SortKey>], descending: &[bool], len: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.sort_by(|&a, &b| {
        for (col, keys) in key_columns.iter().enumerate() {
            let (ka, kb) = (&keys[a], &keys[b]);
            let ordering = match (ka.is_null(), kb.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ if descending.get(col).copied().unwrap_or(false) => kb.cmp(ka),
                _ => ka.cmp(kb),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    indices
}

/// Keep only rows with no null in the given columns (all columns if `None`).
pub fn drop_null_rows(df: &DataFrame, subset: Option<&[String]>) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];
    let names: Vec<String> = match subset {
        Some(columns) => columns.to_vec(),
        None => df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };
    for name in &names {
        let series = column_series(df, name)?;
        for (i, is_null) in series.is_null().into_iter().enumerate() {
            if is_null.unwrap_or(false) {
                keep[i] = false;
            }
        }
    }
    if keep.iter().all(|k| *k) {
        return Ok(df.clone());
    }
    let mask = BooleanChunked::from_slice("mask".into(), &keep);
    Ok(df.filter(&mask)?)
}

// =============================================================================
// Tests
// =============================================================================
