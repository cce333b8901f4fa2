//! Scalar fills: average, median, constants and literal values.

use crate::cleaner::{FrozenList, Literal, lists_to_series, parse_datetime, parse_number, series_to_lists};
use crate::error::{CleanerError, Result};
use crate::patterns::{MIN_TIMESTAMP_MS, constant_fill_string};
use crate::types::ColumnType;
use crate::utils::{
    DtypeCategory, datetime_millis, f64_values, get_dtype_category, millis_to_naive,
    millis_to_series, string_values,
};
use polars::prelude::*;
use serde_json::Value;

/// A single value written into every missing cell of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    DatetimeMs(i64),
    List(FrozenList),
}

impl FillValue {
    /// Convert a JSON option value. `null` gives `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Array(items) => Some(Self::List(FrozenList::new(
                items.iter().map(json_literal).collect(),
            ))),
            Value::Object(_) => Some(Self::Str(value.to_string())),
        }
    }

    /// Default constant for a column of the given type and dtype.
    pub fn constant_for(column_type: ColumnType, dtype: &DataType) -> Self {
        match column_type {
            ColumnType::Number | ColumnType::NumberWithDecimals => Self::Int(0),
            ColumnType::Datetime => Self::DatetimeMs(MIN_TIMESTAMP_MS),
            ColumnType::List => Self::List(FrozenList::empty()),
            ColumnType::TrueOrFalse => match get_dtype_category(dtype) {
                DtypeCategory::Boolean => Self::Bool(false),
                DtypeCategory::Integer | DtypeCategory::Float => Self::Int(0),
                _ => Self::Str(constant_fill_string(column_type).to_string()),
            },
            _ => Self::Str(constant_fill_string(column_type).to_string()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) | Self::DatetimeMs(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn to_literal(&self) -> Literal {
        match self {
            Self::Int(v) | Self::DatetimeMs(v) => Literal::Int(*v),
            Self::Float(v) => Literal::Float(*v),
            Self::Bool(v) => Literal::Bool(*v),
            Self::Str(v) => Literal::Str(v.clone()),
            Self::List(v) => Literal::List(v.clone()),
        }
    }

    /// Text form used when the column holds strings.
    pub fn to_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Str(v) => v.clone(),
            Self::DatetimeMs(ms) => millis_to_naive(*ms)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            Self::List(v) => v.to_string(),
        }
    }
}

fn json_literal(value: &Value) -> Literal {
    match value {
        Value::Null => Literal::None,
        Value::Bool(b) => Literal::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Literal::Int(i),
            None => n.as_f64().map_or(Literal::Missing, Literal::Float),
        },
        Value::String(s) => Literal::Str(s.clone()),
        Value::Array(items) => Literal::List(FrozenList::new(items.iter().map(json_literal).collect())),
        Value::Object(_) => Literal::Str(value.to_string()),
    }
}

/// Replace every null in `series` with `fill`.
///
/// The column keeps its dtype when the fill fits it; otherwise it is
/// rendered as strings.
pub fn fill_scalar(series: &Series, fill: &FillValue) -> Result<Series> {
    let name = series.name().clone();
    match (get_dtype_category(series.dtype()), fill) {
        (DtypeCategory::List, _) => {
            let replacement = match fill {
                FillValue::List(list) => list.clone(),
                other => FrozenList::singleton(other.to_literal()),
            };
            let cells: Vec<Option<FrozenList>> = series_to_lists(series)?
                .into_iter()
                .map(|cell| Some(cell.unwrap_or_else(|| replacement.clone())))
                .collect();
            Ok(lists_to_series(name, &cells))
        }
        (DtypeCategory::Datetime, FillValue::DatetimeMs(ms) | FillValue::Int(ms)) => {
            fill_millis(series, *ms)
        }
        (DtypeCategory::Datetime, FillValue::Str(s)) if parse_datetime(s).is_some() => {
            let ms = parse_datetime(s)
                .map(|dt| dt.and_utc().timestamp_millis())
                .unwrap_or(MIN_TIMESTAMP_MS);
            fill_millis(series, ms)
        }
        (DtypeCategory::Integer, FillValue::Int(v)) => {
            let values: Vec<Option<i64>> = series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|c| Some(c.unwrap_or(*v)))
                .collect();
            Ok(Series::new(name, values))
        }
        (DtypeCategory::Integer | DtypeCategory::Float, FillValue::Int(_) | FillValue::Float(_) | FillValue::Bool(_)) => {
            let value = fill.as_f64().unwrap_or(0.0);
            fill_float(series, value)
        }
        (DtypeCategory::Boolean, FillValue::Bool(v)) => {
            let values: Vec<Option<bool>> = series
                .bool()?
                .into_iter()
                .map(|c| Some(c.unwrap_or(*v)))
                .collect();
            Ok(Series::new(name, values))
        }
        _ => {
            let text = fill.to_text();
            let values: Vec<Option<String>> = string_values(series)?
                .into_iter()
                .map(|c| Some(c.unwrap_or_else(|| text.clone())))
                .collect();
            Ok(Series::new(name, values))
        }
    }
}

fn fill_millis(series: &Series, ms: i64) -> Result<Series> {
    let values = datetime_millis(series)?
        .into_iter()
        .map(|c| Some(c.unwrap_or(ms)))
        .collect();
    millis_to_series(series.name().clone(), values)
}

/// Fill a numeric column with a float, keeping `Int64` when everything stays integral.
fn fill_float(series: &Series, value: f64) -> Result<Series> {
    let name = series.name().clone();
    let values: Vec<Option<f64>> = f64_values(series)?
        .into_iter()
        .map(|c| Some(c.unwrap_or(value)))
        .collect();
    let is_integer = get_dtype_category(series.dtype()) == DtypeCategory::Integer;
    if is_integer && value.fract() == 0.0 {
        let ints: Vec<Option<i64>> = values.iter().map(|v| v.map(|f| f as i64)).collect();
        return Ok(Series::new(name, ints));
    }
    Ok(Series::new(name, values))
}

/// Numeric view of a column for averaging. Strings must all parse.
pub fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Integer
        | DtypeCategory::Float
        | DtypeCategory::Boolean
        | DtypeCategory::Datetime => f64_values(series),
        DtypeCategory::String => series
            .str()?
            .into_iter()
            .map(|cell| match cell {
                None => Ok(None),
                Some(text) => parse_number(text).map(Some).ok_or_else(|| {
                    CleanerError::TypeConversionFailed {
                        column: series.name().to_string(),
                        target_type: "float".to_string(),
                        reason: format!("could not convert '{}'", text),
                    }
                }),
            })
            .collect(),
        _ => Err(CleanerError::TypeConversionFailed {
            column: series.name().to_string(),
            target_type: "float".to_string(),
            reason: format!("unsupported dtype {:?}", series.dtype()),
        }),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Fill with the mean or median of the column's numeric values.
pub fn fill_statistic(series: &Series, statistic: fn(&[f64]) -> Option<f64>) -> Result<Series> {
    let values = numeric_values(series)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(value) = statistic(&present) else {
        return Ok(series.clone());
    };

    let name = series.name().clone();
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Datetime => fill_millis(series, value.round() as i64),
        DtypeCategory::Integer | DtypeCategory::Float => fill_float(series, value),
        _ => Ok(Series::new(
            name,
            values
                .into_iter()
                .map(|c| Some(c.unwrap_or(value)))
                .collect::<Vec<_>>(),
        )),
    }
}
