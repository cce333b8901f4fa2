//! Broadcast aggregations: `average`, `count`, `count_distinct`, `first`,
//! `last`, `max`, `median`, `min` and `sum`.
//!
//! The first argument is aggregated, optionally per group and over a
//! filtered subset of rows, and the result is written to every row of the
//! group in the first output column.

use super::ActionOptions;
use super::output_name;
use crate::cleaner::{epoch_to_millis, parse_datetime};
use crate::error::{CleanerError, Result};
use crate::imputers::{gather, mean, median, numeric_values};
use crate::query::compile_filter;
use crate::types::{ActionDescription, ActionType};
use crate::utils::{
    DtypeCategory, SortKey, column_series, datetime_millis, f64_values, get_dtype_category,
    sort_keys, string_values,
};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Aggregate result for one group.
enum Aggregate {
    /// Row to copy the value from.
    Row(Option<usize>),
    Float(Option<f64>),
    Int(Option<i64>),
}

/// Column values prepared once and shared by every group.
struct AggregateInput<'a> {
    series: &'a Series,
    keys: Vec<SortKey>,
    numbers: Vec<Option<f64>>,
    integers: Option<Vec<Option<i64>>>,
}

impl<'a> AggregateInput<'a> {
    fn new(kind: ActionType, series: &'a Series) -> Result<Self> {
        let needs_numbers = matches!(
            kind,
            ActionType::Sum | ActionType::Average | ActionType::Median
        );
        let is_integer = get_dtype_category(series.dtype()) == DtypeCategory::Integer;
        let numbers = if needs_numbers && !(kind == ActionType::Sum && is_integer) {
            numeric_values(series)?
        } else {
            Vec::new()
        };
        let integers = if kind == ActionType::Sum && is_integer {
            Some(series.cast(&DataType::Int64)?.i64()?.into_iter().collect())
        } else {
            None
        };
        Ok(Self {
            series,
            keys: sort_keys(series)?,
            numbers,
            integers,
        })
    }

    /// Aggregate with no contributing rows.
    fn empty(&self, kind: ActionType) -> Aggregate {
        match kind {
            ActionType::Count | ActionType::CountDistinct => Aggregate::Int(None),
            ActionType::Sum if self.integers.is_some() => Aggregate::Int(None),
            ActionType::Sum | ActionType::Average | ActionType::Median => Aggregate::Float(None),
            _ => Aggregate::Row(None),
        }
    }
}

pub(super) fn aggregate(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let Some(column) = action.action_arguments.first() else {
        return Ok(df);
    };
    let options = ActionOptions::of(action);
    let output = output_name(action)?;
    let series = column_series(&df, column)?;
    let input = AggregateInput::new(action.action_type, &series)?;

    let eligible = eligible_rows(&df, action, &options)?;
    let groupby = options.string_list("groupby_columns")?;
    let groups = group_rows(&df, &groupby)?;

    // Groups keep every row for broadcasting; only eligible rows are
    // aggregated, and a group left with none gets a null aggregate.
    let mut per_row: Vec<Option<usize>> = vec![None; df.height()];
    let mut results: Vec<Aggregate> = Vec::with_capacity(groups.len());
    for (group, rows) in groups.into_iter().enumerate() {
        let selected: Vec<usize> = rows.iter().copied().filter(|&r| eligible[r]).collect();
        let result = if selected.is_empty() && !groupby.is_empty() {
            input.empty(action.action_type)
        } else {
            reduce(action.action_type, &input, &selected)?
        };
        results.push(result);
        for row in rows {
            per_row[row] = Some(group);
        }
    }
    debug!(
        "Aggregated '{}' with {} into '{}' over {} groups",
        column,
        action.action_type,
        output,
        results.len()
    );

    let broadcast = broadcast(&series, &results, &per_row)?;
    let mut df = df;
    df.with_column(broadcast.with_name(output.into()))?;
    Ok(df)
}

/// Rows passing the time window and the `action_code` filter.
fn eligible_rows(
    df: &DataFrame,
    action: &ActionDescription,
    options: &ActionOptions<'_>,
) -> Result<Vec<bool>> {
    let mut eligible = vec![true; df.height()];

    let feature_a = options.str("timestamp_feature_a")?;
    let feature_b = options.str("timestamp_feature_b")?;
    let window = options.f64("window")?;
    if let (Some(a), Some(b), Some(window)) = (feature_a, feature_b, window) {
        let a = timestamp_millis(&column_series(df, a)?)?;
        let b = timestamp_millis(&column_series(df, b)?)?;
        let (low, high) = if window >= 0.0 { (0.0, window) } else { (window, 0.0) };
        for (row, keep) in eligible.iter_mut().enumerate() {
            *keep = match (a[row], b[row]) {
                (Some(a), Some(b)) => {
                    let seconds = (a - b) as f64 / 1000.0;
                    seconds >= low && seconds <= high
                }
                _ => false,
            };
        }
    } else if feature_a.is_some() || feature_b.is_some() || window.is_some() {
        let missing = if feature_a.is_none() {
            "timestamp_feature_a"
        } else if feature_b.is_none() {
            "timestamp_feature_b"
        } else {
            "window"
        };
        return Err(options.missing(missing));
    }

    if let Some(code) = action.code() {
        let mask = compile_filter(code)?.mask(df)?;
        for (keep, matched) in eligible.iter_mut().zip(mask.into_iter()) {
            *keep &= matched.unwrap_or(false);
        }
    }
    Ok(eligible)
}

fn timestamp_millis(series: &Series) -> Result<Vec<Option<i64>>> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Datetime => datetime_millis(series),
        DtypeCategory::Integer | DtypeCategory::Float => Ok(f64_values(series)?
            .into_iter()
            .map(|v| v.and_then(epoch_to_millis))
            .collect()),
        _ => Ok(string_values(series)?
            .into_iter()
            .map(|v| {
                v.as_deref()
                    .and_then(parse_datetime)
                    .map(|dt| dt.and_utc().timestamp_millis())
            })
            .collect()),
    }
}

/// Row indices per group, in first-appearance order. Rows with a null key
/// belong to no group.
fn group_rows(df: &DataFrame, groupby: &[String]) -> Result<Vec<Vec<usize>>> {
    if groupby.is_empty() {
        return Ok(vec![(0..df.height()).collect()]);
    }
    let keys = groupby
        .iter()
        .map(|c| column_series(df, c).and_then(|s| sort_keys(&s)))
        .collect::<Result<Vec<_>>>()?;

    let mut index: BTreeMap<Vec<SortKey>, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..df.height() {
        let key: Vec<SortKey> = keys.iter().map(|k| k[row].clone()).collect();
        if key.iter().any(SortKey::is_null) {
            continue;
        }
        let group = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(row);
    }
    Ok(groups)
}

fn reduce(kind: ActionType, input: &AggregateInput<'_>, rows: &[usize]) -> Result<Aggregate> {
    let keys = &input.keys;
    let present: Vec<usize> = rows.iter().copied().filter(|&r| !keys[r].is_null()).collect();

    let aggregate = match kind {
        ActionType::Count => Aggregate::Int(Some(present.len() as i64)),
        ActionType::CountDistinct => {
            let distinct: BTreeSet<&SortKey> = present.iter().map(|&r| &keys[r]).collect();
            Aggregate::Int(Some(distinct.len() as i64))
        }
        ActionType::First => Aggregate::Row(present.first().copied()),
        ActionType::Last => Aggregate::Row(present.last().copied()),
        ActionType::Min => Aggregate::Row(present.iter().copied().min_by(|&a, &b| keys[a].cmp(&keys[b]))),
        ActionType::Max => Aggregate::Row(
            present
                .iter()
                .copied()
                .rev()
                .max_by(|&a, &b| keys[a].cmp(&keys[b])),
        ),
        ActionType::Sum if input.integers.is_some() => {
            let integers = input.integers.as_deref().unwrap_or_default();
            let mut total: i64 = 0;
            for value in present.iter().filter_map(|&r| integers[r]) {
                total = total.checked_add(value).ok_or_else(|| {
                    CleanerError::TypeConversionFailed {
                        column: input.series.name().to_string(),
                        target_type: "Int64".to_string(),
                        reason: "sum overflows a 64-bit integer".to_string(),
                    }
                })?;
            }
            Aggregate::Int(Some(total))
        }
        ActionType::Sum | ActionType::Average | ActionType::Median => {
            let selected: Vec<f64> = present.iter().filter_map(|&r| input.numbers[r]).collect();
            match kind {
                ActionType::Sum => Aggregate::Float(Some(selected.iter().sum())),
                ActionType::Average => Aggregate::Float(mean(&selected)),
                _ => Aggregate::Float(median(&selected)),
            }
        }
        other => {
            return Err(CleanerError::Internal(format!(
                "'{}' is not an aggregation",
                other
            )));
        }
    };
    Ok(aggregate)
}

fn broadcast(series: &Series, results: &[Aggregate], per_row: &[Option<usize>]) -> Result<Series> {
    let name = series.name().clone();
    match results.first() {
        Some(Aggregate::Float(_)) => {
            let values: Vec<Option<f64>> = per_row
                .iter()
                .map(|g| match g.map(|g| &results[g]) {
                    Some(Aggregate::Float(v)) => *v,
                    _ => None,
                })
                .collect();
            Ok(Series::new(name, values))
        }
        Some(Aggregate::Int(_)) => {
            let values: Vec<Option<i64>> = per_row
                .iter()
                .map(|g| match g.map(|g| &results[g]) {
                    Some(Aggregate::Int(v)) => *v,
                    _ => None,
                })
                .collect();
            Ok(Series::new(name, values))
        }
        _ => {
            let indices: Vec<Option<usize>> = per_row
                .iter()
                .map(|g| match g.map(|g| &results[g]) {
                    Some(Aggregate::Row(r)) => *r,
                    _ => None,
                })
                .collect();
            gather(series, &indices)
        }
    }
}
