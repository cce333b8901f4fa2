//! The `reformat` action: capitalization, currency and date normalization.

use super::ActionOptions;
use crate::cleaner::parse_datetime;
use crate::error::{CleanerError, Result};
use crate::patterns::CURRENCY;
use crate::types::ActionDescription;
use crate::utils::{
    column_series, is_datetime_dtype, is_numeric_dtype, millis_to_series, string_values,
};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

static DATE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[._]").expect("Invalid regex: date separator"));

/// Reformat operation named by the `reformat` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReformatKind {
    CapsStandardization,
    CurrencyToNum,
    DateFormatConversion,
}

impl ReformatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapsStandardization => "caps_standardization",
            Self::CurrencyToNum => "currency_to_num",
            Self::DateFormatConversion => "date_format_conversion",
        }
    }
}

impl fmt::Display for ReformatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReformatKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "caps_standardization" => Ok(Self::CapsStandardization),
            "currency_to_num" => Ok(Self::CurrencyToNum),
            "date_format_conversion" => Ok(Self::DateFormatConversion),
            other => Err(format!("unknown reformat '{}'", other)),
        }
    }
}

pub(super) fn reformat(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let options = ActionOptions::of(action);
    let kind = options
        .required_str("reformat")?
        .parse::<ReformatKind>()
        .map_err(|reason| options.invalid("reformat", reason))?;

    let mut df = df;
    for column in &action.action_arguments {
        let series = column_series(&df, column)?;
        let reformatted = match kind {
            ReformatKind::CapsStandardization => standardize_caps(&series, &options)?,
            ReformatKind::CurrencyToNum => currency_to_num(&series)?,
            ReformatKind::DateFormatConversion => convert_dates(&series)?,
        };
        debug!("Reformatted '{}' with {}", column, kind);
        df.with_column(reformatted)?;
    }
    Ok(df)
}

fn standardize_caps(series: &Series, options: &ActionOptions<'_>) -> Result<Series> {
    let uppercase = match options.required_str("capitalization")? {
        "uppercase" => true,
        "lowercase" => false,
        other => {
            return Err(CleanerError::UnsupportedOption {
                action: options.action().to_string(),
                option: "capitalization".to_string(),
                value: other.to_string(),
            });
        }
    };
    let values: Vec<Option<String>> = string_values(series)?
        .into_iter()
        .map(|v| {
            v.map(|s| {
                if uppercase {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                }
            })
        })
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

/// Strip currency symbols and whitespace, then parse as floats. A single
/// unparseable cell leaves the whole column unchanged.
fn currency_to_num(series: &Series) -> Result<Series> {
    if is_numeric_dtype(series.dtype()) {
        return Ok(series.cast(&DataType::Float64)?);
    }
    if series.dtype() != &DataType::String {
        warn!(
            "Column '{}' has dtype {:?}, not text or numbers; leaving column unchanged",
            series.name(),
            series.dtype()
        );
        return Ok(series.clone());
    }
    let mut parsed = Vec::with_capacity(series.len());
    for cell in series.str()?.into_iter() {
        let Some(text) = cell else {
            parsed.push(None);
            continue;
        };
        let stripped: String = CURRENCY
            .replace_all(text, "")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match stripped.parse::<f64>() {
            Ok(value) => parsed.push(Some(value)),
            Err(_) => {
                warn!(
                    "Could not convert '{}' in column '{}' to a number; leaving column unchanged",
                    text,
                    series.name()
                );
                return Ok(series.clone());
            }
        }
    }
    Ok(Series::new(series.name().clone(), parsed))
}

/// Parse dates permissively, normalizing `.` and `_` separators and month
/// name case. Unparseable values become null.
fn convert_dates(series: &Series) -> Result<Series> {
    if is_datetime_dtype(series.dtype()) {
        return Ok(series.clone());
    }
    let millis: Vec<Option<i64>> = string_values(series)?
        .into_iter()
        .map(|cell| {
            let text = cell?;
            parse_datetime(&text)
                .or_else(|| {
                    let normalized = DATE_SEPARATOR.replace_all(&text, "/").to_lowercase();
                    parse_datetime(&normalized)
                })
                .map(|dt| dt.and_utc().timestamp_millis())
        })
        .collect();
    millis_to_series(series.name().clone(), millis)
}
