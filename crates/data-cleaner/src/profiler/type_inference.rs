//! Per-column type classification.

use crate::config::CleanerConfig;
use crate::error::Result;
use crate::patterns::{
    DATETIME, DATETIME_MATCH_THRESHOLD, EMAIL, MAX_CATEGORY_WORD_COUNT, NUMBER,
    NUMBER_TYPE_MATCH_THRESHOLD, PHONE_NUMBER, PHONE_NUMBER_RANGE, PHONE_NUMBER_WORDS,
    STRING_TYPE_MATCH_THRESHOLD, TEXT_UNIQUE_RATIO_THRESHOLD, ZIP_CODE, ZIP_CODE_RANGE,
    ZIP_CODE_WORDS, is_list_shaped, name_contains_any, strip_quotes,
};
use crate::types::ColumnType;
use crate::utils::{DtypeCategory, f64_values, get_dtype_category, string_values};
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;

/// Classify one column.
pub fn infer_column_type(series: &Series, config: &CleanerConfig) -> Result<ColumnType> {
    let name = series.name().as_str();
    let column_type = match get_dtype_category(series.dtype()) {
        DtypeCategory::Datetime => ColumnType::Datetime,
        DtypeCategory::Boolean => ColumnType::TrueOrFalse,
        DtypeCategory::Integer | DtypeCategory::Float => infer_number_type(series, name)?,
        DtypeCategory::List => ColumnType::List,
        DtypeCategory::String | DtypeCategory::Other => {
            infer_object_type(&cleaned_strings(series)?, name, config)
        }
    };

    if column_type.is_numeric() && distinct_with_nulls(series)? == 2 {
        return Ok(ColumnType::TrueOrFalse);
    }
    Ok(column_type)
}

/// Classify a native numeric column.
pub fn infer_number_type(series: &Series, column_name: &str) -> Result<ColumnType> {
    let values: Vec<f64> = f64_values(series)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Ok(ColumnType::NumberWithDecimals);
    }

    let (low, high) = PHONE_NUMBER_RANGE;
    let phone_like = values
        .iter()
        .filter(|v| v.fract() == 0.0 && **v >= low && **v < high)
        .count();
    if phone_like as f64 / values.len() as f64 >= NUMBER_TYPE_MATCH_THRESHOLD
        && name_contains_any(column_name, &PHONE_NUMBER_WORDS)
    {
        return Ok(ColumnType::PhoneNumber);
    }

    let is_integer = get_dtype_category(series.dtype()) == DtypeCategory::Integer;
    let (zip_low, zip_high) = ZIP_CODE_RANGE;
    if is_integer
        && values
            .iter()
            .all(|v| *v >= zip_low as f64 && *v <= zip_high as f64)
        && name_contains_any(column_name, &ZIP_CODE_WORDS)
    {
        return Ok(ColumnType::ZipCode);
    }

    Ok(if is_integer {
        ColumnType::Number
    } else {
        ColumnType::NumberWithDecimals
    })
}

/// Classify string cells.
///
/// `values` holds the cells after quote stripping, with empty strings
/// already turned into `None`.
pub fn infer_object_type(
    values: &[Option<String>],
    column_name: &str,
    config: &CleanerConfig,
) -> ColumnType {
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    let distinct: HashSet<&str> = present.iter().copied().collect();

    if !present.is_empty() && present.iter().all(|v| is_list_shaped(v)) {
        return ColumnType::List;
    }

    if distinct.len() <= 2 {
        return ColumnType::TrueOrFalse;
    }

    let is_phone_name = name_contains_any(column_name, &PHONE_NUMBER_WORDS);
    let is_zip_name = name_contains_any(column_name, &ZIP_CODE_WORDS);

    if present.iter().all(|v| NUMBER.is_match(v)) {
        if present.iter().any(|v| v.contains('.') || v.contains('%')) {
            return ColumnType::NumberWithDecimals;
        }
        if is_phone_name && match_ratio(&present, &PHONE_NUMBER) >= NUMBER_TYPE_MATCH_THRESHOLD {
            return ColumnType::PhoneNumber;
        }
        if is_zip_name && match_ratio(&present, &ZIP_CODE) >= NUMBER_TYPE_MATCH_THRESHOLD {
            return ColumnType::ZipCode;
        }
        return ColumnType::Number;
    }

    if match_ratio(&present, &DATETIME) >= DATETIME_MATCH_THRESHOLD {
        return ColumnType::Datetime;
    }
    if match_ratio(&present, &EMAIL) >= STRING_TYPE_MATCH_THRESHOLD {
        return ColumnType::Email;
    }
    if is_phone_name && match_ratio(&present, &PHONE_NUMBER) >= STRING_TYPE_MATCH_THRESHOLD {
        return ColumnType::PhoneNumber;
    }
    if is_zip_name && match_ratio(&present, &ZIP_CODE) >= STRING_TYPE_MATCH_THRESHOLD {
        return ColumnType::ZipCode;
    }

    let has_nulls = present.len() < values.len();
    if distinct.len() + usize::from(has_nulls) == 2 {
        return ColumnType::TrueOrFalse;
    }

    if distinct.len() as f64 / present.len() as f64 >= TEXT_UNIQUE_RATIO_THRESHOLD {
        return ColumnType::Text;
    }
    let max_words = present
        .iter()
        .map(|v| v.split_whitespace().count())
        .max()
        .unwrap_or(0);
    if max_words > MAX_CATEGORY_WORD_COUNT {
        return ColumnType::Text;
    }

    if distinct.len() <= config.category_cardinality_threshold {
        ColumnType::Category
    } else {
        ColumnType::CategoryHighCardinality
    }
}

fn match_ratio(values: &[&str], pattern: &Regex) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| pattern.is_match(v)).count() as f64 / values.len() as f64
}

/// String cells with quotes stripped and empty strings as `None`.
fn cleaned_strings(series: &Series) -> Result<Vec<Option<String>>> {
    Ok(string_values(series)?
        .into_iter()
        .map(|v| {
            v.map(|s| strip_quotes(&s).to_string())
                .filter(|s| !s.is_empty())
        })
        .collect())
}

fn distinct_with_nulls(series: &Series) -> Result<usize> {
    let values = if series.dtype() == &DataType::String {
        cleaned_strings(series)?
    } else {
        string_values(series)?
    };
    let has_nulls = values.iter().any(Option::is_none);
    let distinct: HashSet<String> = values.into_iter().flatten().collect();
    Ok(distinct.len() + usize::from(has_nulls))
}
