//! Imputation module for handling missing values.
//!
//! This module provides the `impute` strategies:
//! - Statistical fills (average, median, per-type constants, literal values)
//! - Donor fills (mode, random sampling, sequential forward fill, another column)
//! - Row removal and a no-op
//!
//! Blank strings count as missing and are turned into nulls before any
//! strategy runs.

mod donor;
mod statistical;

pub use donor::{fill_from_column, fill_mode, fill_random, forward_fill, mode_index};
pub(crate) use donor::gather;
pub use statistical::{FillValue, fill_scalar, fill_statistic, mean, median, numeric_values};

use crate::error::{CleanerError, Result};
use crate::patterns::EMPTY_STRING;
use crate::profiler::infer_column_type;
use crate::types::ColumnTypes;
use crate::config::CleanerConfig;
use crate::utils::{column_series, drop_null_rows, sort_keys, sorted_indices, to_idx};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Imputation strategy named by the `strategy` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeStrategy {
    Average,
    Column,
    Constant,
    Median,
    Mode,
    Noop,
    Random,
    RowRm,
    Sequential,
}

impl ImputeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Column => "column",
            Self::Constant => "constant",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Noop => "noop",
            Self::Random => "random",
            Self::RowRm => "row_rm",
            Self::Sequential => "sequential",
        }
    }
}

impl fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImputeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "average" | "mean" => Ok(Self::Average),
            "column" => Ok(Self::Column),
            "constant" => Ok(Self::Constant),
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            "noop" => Ok(Self::Noop),
            "random" => Ok(Self::Random),
            "row_rm" => Ok(Self::RowRm),
            "sequential" => Ok(Self::Sequential),
            other => Err(other.to_string()),
        }
    }
}

/// Options recognized by `impute`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImputeOptions {
    pub strategy: Option<String>,
    pub value: Option<Value>,
    /// One column name or a list of them.
    #[serde(deserialize_with = "one_or_many")]
    pub timeseries_index: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
        None => Vec::new(),
    })
}

/// Fills missing values in a set of columns.
#[derive(Debug, Clone)]
pub struct Imputer {
    config: CleanerConfig,
}

impl Default for Imputer {
    fn default() -> Self {
        Self::from_config(&CleanerConfig::default())
    }
}

impl Imputer {
    pub fn new(seed: u64) -> Self {
        Self {
            config: CleanerConfig {
                random_seed: seed,
                ..CleanerConfig::default()
            },
        }
    }

    /// Seed and type detection thresholds from `config`.
    pub fn from_config(config: &CleanerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Impute `columns` of `df` according to `options`.
    ///
    /// `column_types` supplies each column's semantic type for constant
    /// fills; columns without an entry are classified on the fly.
    pub fn impute(
        &self,
        df: DataFrame,
        columns: &[String],
        column_types: &ColumnTypes,
        options: &ImputeOptions,
    ) -> Result<DataFrame> {
        let mut df = df;
        for column in columns {
            let series = blank_to_null(&column_series(&df, column)?)?;
            df.with_column(series)?;
        }

        let strategy_name = options.strategy.as_deref().unwrap_or_default();
        let strategy = strategy_name.parse::<ImputeStrategy>().ok();
        let value = options.value.as_ref().filter(|v| !v.is_null());

        match strategy {
            Some(ImputeStrategy::Average) => self.map_columns(df, columns, |s| fill_statistic(s, mean)),
            Some(ImputeStrategy::Median) => self.map_columns(df, columns, |s| fill_statistic(s, median)),
            Some(ImputeStrategy::Column) => {
                let donor_name = value
                    .and_then(Value::as_str)
                    .ok_or_else(|| CleanerError::missing_option("impute", "value"))?;
                let donor = column_series(&df, donor_name)?;
                self.map_columns(df, columns, |s| fill_from_column(s, &donor))
            }
            _ if value.is_some() => {
                let fill = value
                    .and_then(FillValue::from_json)
                    .ok_or_else(|| CleanerError::missing_option("impute", "value"))?;
                self.map_columns(df, columns, |s| fill_scalar(s, &fill))
            }
            Some(ImputeStrategy::Random) => {
                let mut rng = StdRng::seed_from_u64(self.config.random_seed);
                self.map_columns(df, columns, |s| fill_random(s, &mut rng))
            }
            Some(ImputeStrategy::Sequential) => {
                if options.timeseries_index.is_empty() {
                    return Err(CleanerError::missing_option("impute", "timeseries_index"));
                }
                let keys = options
                    .timeseries_index
                    .iter()
                    .map(|c| column_series(&df, c).and_then(|s| sort_keys(&s)))
                    .collect::<Result<Vec<_>>>()?;
                let order = sorted_indices(&keys, &[], df.height());
                let sorted = df.take(&to_idx(&order))?;
                self.map_columns(sorted, columns, forward_fill)
            }
            Some(ImputeStrategy::Constant) => self.map_columns(df, columns, |s| {
                let column_type = match column_types.get(s.name().as_str()) {
                    Some(t) => *t,
                    None => infer_column_type(s, &self.config)?,
                };
                fill_scalar(s, &FillValue::constant_for(column_type, s.dtype()))
            }),
            Some(ImputeStrategy::Mode) => self.map_columns(df, columns, fill_mode),
            Some(ImputeStrategy::Noop) => Ok(df),
            Some(ImputeStrategy::RowRm) => {
                let before = df.height();
                let df = drop_null_rows(&df, Some(columns))?;
                info!("Removed {} rows with missing values", before - df.height());
                Ok(df)
            }
            None => Err(CleanerError::UnsupportedStrategy {
                column: columns.join(", "),
                strategy: strategy_name.to_string(),
            }),
        }
    }

    fn map_columns<F>(&self, df: DataFrame, columns: &[String], mut fill: F) -> Result<DataFrame>
    where
        F: FnMut(&Series) -> Result<Series>,
    {
        let mut df = df;
        for column in columns {
            let series = column_series(&df, column)?;
            let before = series.null_count();
            let filled = fill(&series)?;
            debug!(
                "Imputed column '{}': {} -> {} missing",
                column,
                before,
                filled.null_count()
            );
            df.with_column(filled)?;
        }
        Ok(df)
    }
}

fn blank_to_null(series: &Series) -> Result<Series> {
    if series.dtype() != &DataType::String {
        return Ok(series.clone());
    }
    let values: Vec<Option<&str>> = series
        .str()?
        .into_iter()
        .map(|v| v.filter(|s| !EMPTY_STRING.is_match(s)))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;
    use pretty_assertions::assert_eq;

    fn options(strategy: &str) -> ImputeOptions {
        ImputeOptions {
            strategy: Some(strategy.to_string()),
            ..Default::default()
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_average_and_median() {
        let df = df!("n" => &[Some(1.0f64), None, Some(5.0), Some(6.0)]).unwrap();
        let imputer = Imputer::default();

        let averaged = imputer
            .impute(df.clone(), &columns(&["n"]), &ColumnTypes::new(), &options("average"))
            .unwrap();
        assert_eq!(averaged.column("n").unwrap().f64().unwrap().get(1), Some(4.0));

        let medianed = imputer
            .impute(df, &columns(&["n"]), &ColumnTypes::new(), &options("median"))
            .unwrap();
        assert_eq!(medianed.column("n").unwrap().f64().unwrap().get(1), Some(5.0));
    }

    #[test]
    fn test_constant_uses_column_type() {
        let df = df!(
            "city" => &[Some("a"), Some("  "), None],
            "zip" => &[Some("94107"), None, Some("10001")],
        )
        .unwrap();
        let types = ColumnTypes::from([
            ("city".to_string(), ColumnType::Category),
            ("zip".to_string(), ColumnType::ZipCode),
        ]);
        let result = Imputer::default()
            .impute(df, &columns(&["city", "zip"]), &types, &options("constant"))
            .unwrap();

        let city: Vec<Option<&str>> = result.column("city").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(city, vec![Some("a"), Some("missing"), Some("missing")]);
        assert_eq!(result.column("zip").unwrap().str().unwrap().get(1), Some("0"));
    }

    #[test]
    fn test_literal_value_overrides_strategy() {
        let df = df!("n" => &[Some(1i64), None]).unwrap();
        let opts = ImputeOptions {
            strategy: Some("mode".to_string()),
            value: Some(Value::from(7)),
            ..Default::default()
        };
        let result = Imputer::default()
            .impute(df, &columns(&["n"]), &ColumnTypes::new(), &opts)
            .unwrap();
        assert_eq!(result.column("n").unwrap().i64().unwrap().get(1), Some(7));
    }

    #[test]
    fn test_sequential_sorts_then_forward_fills() {
        let df = df!(
            "t" => &[3i64, 1, 2],
            "v" => &[None, Some("x"), None],
        )
        .unwrap();
        let opts = ImputeOptions {
            strategy: Some("sequential".to_string()),
            timeseries_index: vec!["t".to_string()],
            ..Default::default()
        };
        let result = Imputer::default()
            .impute(df, &columns(&["v"]), &ColumnTypes::new(), &opts)
            .unwrap();

        let t: Vec<Option<i64>> = result.column("t").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(t, vec![Some(1), Some(2), Some(3)]);
        let v: Vec<Option<&str>> = result.column("v").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(v, vec![Some("x"), Some("x"), Some("x")]);
    }

    #[test]
    fn test_timeseries_index_accepts_one_or_many() {
        let one: ImputeOptions =
            serde_json::from_value(serde_json::json!({"strategy": "sequential", "timeseries_index": "t"}))
                .unwrap();
        assert_eq!(one.timeseries_index, vec!["t".to_string()]);

        let many: ImputeOptions =
            serde_json::from_value(serde_json::json!({"timeseries_index": ["t", "u"]})).unwrap();
        assert_eq!(many.timeseries_index, vec!["t".to_string(), "u".to_string()]);

        let absent: ImputeOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(absent.timeseries_index.is_empty());
    }

    #[test]
    fn test_from_config_uses_config_seed() {
        let df = df!("n" => &[Some(1i64), None, Some(2), None, Some(3)]).unwrap();
        let config = CleanerConfig::builder().random_seed(7).build().unwrap();
        let from_config = Imputer::from_config(&config)
            .impute(df.clone(), &columns(&["n"]), &ColumnTypes::new(), &options("random"))
            .unwrap();
        let seeded = Imputer::new(7)
            .impute(df, &columns(&["n"]), &ColumnTypes::new(), &options("random"))
            .unwrap();
        assert!(from_config.equals_missing(&seeded));
    }

    #[test]
    fn test_random_is_seeded() {
        let df = df!("n" => &[Some(1i64), None, Some(2), None, Some(3)]).unwrap();
        let run = || {
            Imputer::new(7)
                .impute(df.clone(), &columns(&["n"]), &ColumnTypes::new(), &options("random"))
                .unwrap()
        };
        assert!(run().equals_missing(&run()));
        assert_eq!(run().column("n").unwrap().null_count(), 0);
    }

    #[test]
    fn test_row_rm_and_noop() {
        let df = df!("a" => &[Some(1i64), None], "b" => &[None::<i64>, None]).unwrap();
        let removed = Imputer::default()
            .impute(df.clone(), &columns(&["a"]), &ColumnTypes::new(), &options("row_rm"))
            .unwrap();
        assert_eq!(removed.height(), 1);

        let untouched = Imputer::default()
            .impute(df.clone(), &columns(&["a"]), &ColumnTypes::new(), &options("noop"))
            .unwrap();
        assert!(untouched.equals_missing(&df));
    }

    #[test]
    fn test_unknown_strategy_fails() {
        let df = df!("n" => &[Some(1i64), None]).unwrap();
        let error = Imputer::default()
            .impute(df, &columns(&["n"]), &ColumnTypes::new(), &options("magic"))
            .unwrap_err();
        assert!(matches!(error, CleanerError::UnsupportedStrategy { .. }));
    }

    #[test]
    fn test_column_strategy() {
        let df = df!("a" => &[Some("x"), None], "b" => &[Some("y"), Some("z")]).unwrap();
        let opts = ImputeOptions {
            strategy: Some("column".to_string()),
            value: Some(Value::from("b")),
            ..Default::default()
        };
        let result = Imputer::default()
            .impute(df, &columns(&["a"]), &ColumnTypes::new(), &opts)
            .unwrap();
        assert_eq!(result.column("a").unwrap().str().unwrap().get(1), Some("z"));
    }
}
