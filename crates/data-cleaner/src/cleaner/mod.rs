//! Value cleaning: normalize cell values to match their column type.
//!
//! This module provides functionality for:
//! - Stripping quotes and whitespace from string cells
//! - Parsing dirty numeric strings (currency, grouping, percent)
//! - Permissive date parsing into millisecond datetimes
//! - Normalizing phone numbers, zip codes and list literals
//!
//! Cleaning never fails on a dirty cell: unparseable values become null.
//! Running [`clean_series`] on its own output returns the same series.

mod converters;
pub mod lists;
pub mod literal;

pub use lists::{lists_to_series, lists_to_strings, series_to_lists};
pub use literal::{FrozenDict, FrozenList, Literal, parse_list, parse_list_str, parse_literal};

pub(crate) use converters::{epoch_to_millis, parse_datetime, parse_number};

use crate::error::Result;
use crate::patterns::{TRAILING_FRACTION, strip_quotes};
use crate::types::{ColumnType, ColumnTypes};
use crate::utils::{
    DtypeCategory, drop_null_rows, get_dtype_category, is_datetime_dtype, millis_to_series,
};
use converters::as_exact_i64;
use polars::prelude::*;
use tracing::{debug, info};

/// Clean one column according to its semantic type.
pub fn clean_series(series: &Series, column_type: ColumnType, dropna: bool) -> Result<Series> {
    let mut series = strip_string_cells(series)?;
    if dropna {
        series = series.drop_nulls();
    }

    let cleaned = match column_type {
        ColumnType::Number | ColumnType::NumberWithDecimals => clean_number(&series, column_type)?,
        ColumnType::Datetime => clean_datetime(&series)?,
        ColumnType::PhoneNumber => clean_phone_number(&series)?,
        ColumnType::ZipCode => match series.dtype() {
            DataType::String => series,
            _ => series.cast(&DataType::String)?,
        },
        ColumnType::List => match series.dtype() {
            DataType::List(_) => series,
            _ => lists_to_series(series.name().clone(), &series_to_lists(&series)?),
        },
        _ => series,
    };

    Ok(cleaned)
}

/// Clean every typed column of a table.
///
/// Columns are cleaned without dropping nulls; with `dropna` set, rows with
/// a null in any column are removed afterwards.
pub fn clean_dataframe(
    df: &DataFrame,
    column_types: &ColumnTypes,
    dropna: bool,
) -> Result<DataFrame> {
    let mut df = df.clone();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    for name in &names {
        let Some(column_type) = column_types.get(name) else {
            continue;
        };
        let series = df.column(name)?.as_materialized_series().clone();
        let cleaned = clean_series(&series, *column_type, false)?;
        debug!(
            "Cleaned column '{}' as {} ({:?} -> {:?})",
            name,
            column_type,
            series.dtype(),
            cleaned.dtype()
        );
        df.with_column(cleaned)?;
    }

    if dropna {
        let before = df.height();
        df = drop_null_rows(&df, None)?;
        info!("Dropped {} rows with missing values", before - df.height());
    }

    Ok(df)
}

// =============================================================================
// Per-type cleaners
// =============================================================================

fn strip_string_cells(series: &Series) -> Result<Series> {
    if series.dtype() != &DataType::String {
        return Ok(series.clone());
    }
    let values: Vec<Option<&str>> = series
        .str()?
        .into_iter()
        .map(|v| v.map(strip_quotes).filter(|s| !s.is_empty()))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

fn clean_number(series: &Series, column_type: ColumnType) -> Result<Series> {
    let name = series.name().clone();
    let values: Vec<Option<f64>> = match get_dtype_category(series.dtype()) {
        DtypeCategory::String => {
            let ca = series.str()?;
            let is_percent = ca.into_iter().flatten().any(|s| s.contains('%'));
            ca.into_iter()
                .map(|v| {
                    v.and_then(parse_number)
                        .map(|n| if is_percent { n / 100.0 } else { n })
                })
                .collect()
        }
        DtypeCategory::Integer | DtypeCategory::Boolean => {
            let target = match column_type {
                ColumnType::Number => DataType::Int64,
                _ => DataType::Float64,
            };
            return Ok(series.cast(&target)?);
        }
        DtypeCategory::Float => series.cast(&DataType::Float64)?.f64()?.into_iter().collect(),
        _ => return Ok(series.clone()),
    };

    if column_type == ColumnType::Number {
        let integers: Option<Vec<Option<i64>>> = values
            .iter()
            .map(|v| match v {
                Some(n) => as_exact_i64(*n).map(Some),
                None => Some(None),
            })
            .collect();
        if let Some(integers) = integers {
            return Ok(Series::new(name, integers));
        }
    }

    Ok(Series::new(name, values))
}

fn clean_datetime(series: &Series) -> Result<Series> {
    let name = series.name().clone();
    let dtype = series.dtype();
    if is_datetime_dtype(dtype) {
        return Ok(series.clone());
    }

    let millis: Vec<Option<i64>> = match get_dtype_category(dtype) {
        DtypeCategory::String => series
            .str()?
            .into_iter()
            .map(|v| {
                v.and_then(parse_datetime)
                    .map(|dt| dt.and_utc().timestamp_millis())
            })
            .collect(),
        DtypeCategory::Integer | DtypeCategory::Float => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.and_then(epoch_to_millis))
            .collect(),
        _ => return Ok(series.clone()),
    };

    millis_to_series(name, millis)
}

fn clean_phone_number(series: &Series) -> Result<Series> {
    if series.dtype() == &DataType::String {
        return Ok(series.clone());
    }
    let casted = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| TRAILING_FRACTION.replace(s, "").into_owned()))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(name: &str, values: &[Option<&str>]) -> Series {
        Series::new(name.into(), values)
    }

    #[test]
    fn test_strip_quotes_and_empty_to_null() {
        let series = strings("c", &[Some(" \"a\" "), Some("  "), Some("b")]);
        let cleaned = clean_series(&series, ColumnType::Category, false).unwrap();
        let values: Vec<Option<&str>> = cleaned.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("a"), None, Some("b")]);
    }

    #[test]
    fn test_number_strings_to_integers() {
        let series = strings("n", &[Some("$1,000"), Some("- 5"), Some("abc"), None]);
        let cleaned = clean_series(&series, ColumnType::Number, false).unwrap();
        assert_eq!(cleaned.dtype(), &DataType::Int64);
        let values: Vec<Option<i64>> = cleaned.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1000), Some(-5), None, None]);
    }

    #[test]
    fn test_number_falls_back_to_float() {
        let series = strings("n", &[Some("1"), Some("2.5")]);
        let cleaned = clean_series(&series, ColumnType::Number, false).unwrap();
        assert_eq!(cleaned.dtype(), &DataType::Float64);
    }

    #[test]
    fn test_percent_column_is_scaled() {
        let series = strings("p", &[Some("50%"), Some("25")]);
        let cleaned = clean_series(&series, ColumnType::NumberWithDecimals, false).unwrap();
        let values: Vec<Option<f64>> = cleaned.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0.5), Some(0.25)]);
    }

    #[test]
    fn test_integral_floats_become_integers() {
        let series = Series::new("n".into(), &[Some(1.0f64), None, Some(3.0)]);
        let cleaned = clean_series(&series, ColumnType::Number, false).unwrap();
        assert_eq!(cleaned.dtype(), &DataType::Int64);
    }

    #[test]
    fn test_datetime_strings() {
        let series = strings("d", &[Some("2021-01-05"), Some("garbage"), Some("1/2/2020")]);
        let cleaned = clean_series(&series, ColumnType::Datetime, false).unwrap();
        assert!(matches!(cleaned.dtype(), DataType::Datetime(_, _)));
        assert_eq!(cleaned.null_count(), 1);
    }

    #[test]
    fn test_phone_numbers_from_floats() {
        let series = Series::new("phone".into(), &[Some(5551234567.0f64), None]);
        let cleaned = clean_series(&series, ColumnType::PhoneNumber, false).unwrap();
        assert_eq!(cleaned.str().unwrap().get(0), Some("5551234567"));
        assert_eq!(cleaned.null_count(), 1);
    }

    #[test]
    fn test_zip_codes_cast_to_string() {
        let series = Series::new("zip".into(), &[12345i64, 323]);
        let cleaned = clean_series(&series, ColumnType::ZipCode, false).unwrap();
        assert_eq!(cleaned.str().unwrap().get(1), Some("323"));
    }

    #[test]
    fn test_list_strings_become_list_column() {
        let series = strings("l", &[Some("[1, 2]"), Some("[3]"), None]);
        let cleaned = clean_series(&series, ColumnType::List, false).unwrap();
        assert_eq!(cleaned.dtype(), &DataType::List(Box::new(DataType::Int64)));
    }

    #[test]
    fn test_dropna() {
        let series = strings("c", &[Some("a"), Some(""), None, Some("b")]);
        let cleaned = clean_series(&series, ColumnType::Category, true).unwrap();
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn test_clean_series_is_idempotent_for_every_type() {
        let series = strings(
            "mixed",
            &[
                Some("  '$1,200' "),
                Some("2021-03-04"),
                Some("[1, 'a']"),
                Some("5551234567"),
                Some(""),
                None,
                Some("12%"),
            ],
        );
        for column_type in ColumnType::ALL {
            let once = clean_series(&series, column_type, false).unwrap();
            let twice = clean_series(&once, column_type, false).unwrap();
            assert!(
                once.equals_missing(&twice),
                "not idempotent for {column_type}"
            );
        }
    }

    #[test]
    fn test_clean_dataframe_with_dropna() {
        let df = df!(
            "amount" => &[Some("1"), Some("x"), Some("3")],
            "label" => &[Some("a"), Some("b"), Some("c")],
        )
        .unwrap();
        let types = ColumnTypes::from([
            ("amount".to_string(), ColumnType::Number),
            ("label".to_string(), ColumnType::Category),
        ]);

        let kept = clean_dataframe(&df, &types, false).unwrap();
        assert_eq!(kept.height(), 3);
        assert_eq!(kept.column("amount").unwrap().dtype(), &DataType::Int64);

        let dropped = clean_dataframe(&df, &types, true).unwrap();
        assert_eq!(dropped.height(), 2);
    }
}
