//! Column actions: projection, shifts, scaling, computed columns, syntax
//! fixes, differences and column-name cleanup.

use super::{ActionOptions, output_name};
use crate::cleaner::clean_series;
use crate::error::{CleanerError, Result};
use crate::imputers::{gather, mean, numeric_values};
use crate::patterns::invalid_placeholder;
use crate::quality::find_syntax_errors;
use crate::types::{ActionDescription, ColumnType, ColumnTypes};
use crate::udf::{UdfInput, parse_udf};
use crate::utils::{SortKey, column_series, is_datetime_dtype, sort_keys, string_values};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

pub(super) fn remove_columns(df: DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut df = df;
    for column in columns {
        df = df
            .drop(column)
            .map_err(|_| CleanerError::ColumnNotFound(column.clone()))?;
    }
    Ok(df)
}

pub(super) fn select(df: DataFrame, columns: &[String]) -> Result<DataFrame> {
    if columns.is_empty() {
        return Ok(df);
    }
    for column in columns {
        column_series(&df, column)?;
    }
    Ok(df.select(columns.iter().map(String::as_str))?)
}

/// Replace cells that fail their type's syntax with the type's placeholder.
pub(super) fn fix_syntax_errors(
    df: DataFrame,
    columns: &[(String, ColumnType)],
) -> Result<DataFrame> {
    let mut df = df;
    for (column, column_type) in columns {
        let Some(placeholder) = invalid_placeholder(*column_type) else {
            continue;
        };
        let series = column_series(&df, column)?;
        let mask = find_syntax_errors(&series, *column_type)?;
        let flagged = mask.into_iter().filter(|v| *v == Some(true)).count();
        if flagged == 0 {
            continue;
        }

        let fixed: Vec<Option<String>> = string_values(&series)?
            .into_iter()
            .zip(mask.into_iter())
            .map(|(value, bad)| {
                if bad.unwrap_or(false) {
                    Some(placeholder.to_string())
                } else {
                    value
                }
            })
            .collect();
        info!("Replaced {} invalid values in '{}'", flagged, column);
        df.with_column(Series::new(series.name().clone(), fixed))?;
    }
    Ok(df)
}

/// Row groups for shifting, keeping row order within each group. Rows with
/// a null key form no group and are left empty.
fn shift_groups(df: &DataFrame, groupby: &[String]) -> Result<Vec<Vec<usize>>> {
    if groupby.is_empty() {
        return Ok(vec![(0..df.height()).collect()]);
    }
    let keys = groupby
        .iter()
        .map(|c| column_series(df, c).and_then(|s| sort_keys(&s)))
        .collect::<Result<Vec<_>>>()?;
    let mut groups: BTreeMap<Vec<SortKey>, Vec<usize>> = BTreeMap::new();
    for row in 0..df.height() {
        let key: Vec<SortKey> = keys.iter().map(|k| k[row].clone()).collect();
        if !key.iter().any(SortKey::is_null) {
            groups.entry(key).or_default().push(row);
        }
    }
    Ok(groups.into_values().collect())
}

fn shift(df: DataFrame, action: &ActionDescription, periods: i64, groupby: &[String]) -> Result<DataFrame> {
    let Some(column) = action.action_arguments.first() else {
        return Ok(df);
    };
    let output = output_name(action)?;
    let series = column_series(&df, column)?;

    let mut sources: Vec<Option<usize>> = vec![None; df.height()];
    for rows in shift_groups(&df, groupby)? {
        for (position, &row) in rows.iter().enumerate() {
            let source = position as i64 - periods;
            if source >= 0 && (source as usize) < rows.len() {
                sources[row] = Some(rows[source as usize]);
            }
        }
    }

    let shifted = gather(&series, &sources)?.with_name(output.into());
    let mut df = df;
    df.with_column(shifted)?;
    Ok(df)
}

/// Shift values down by `periods` rows (default 1), optionally per group.
pub(super) fn shift_down(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let options = ActionOptions::of(action);
    let periods = options.i64("periods")?.unwrap_or(1);
    let groupby = options.string_list("groupby_columns")?;
    shift(df, action, periods, &groupby)
}

/// Shift values up by exactly one row.
pub(super) fn shift_up(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    shift(df, action, -1, &[])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Scaling {
    MinMax,
    ZScore,
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Min-max or z-score scaling. Nulls are ignored and preserved; constant
/// columns become 0.
pub(super) fn scale(df: DataFrame, action: &ActionDescription, scaling: Scaling) -> Result<DataFrame> {
    let in_place = action.outputs.len() != action.action_arguments.len();
    let mut df = df;
    for (i, column) in action.action_arguments.iter().enumerate() {
        let values = numeric_values(&column_series(&df, column)?)?;
        let present: Vec<f64> = values.iter().flatten().copied().collect();

        let transform: Box<dyn Fn(f64) -> f64> = match scaling {
            Scaling::MinMax => {
                let min = present.iter().copied().fold(f64::INFINITY, f64::min);
                let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                if range > 0.0 && range.is_finite() {
                    Box::new(move |v| (v - min) / range)
                } else {
                    Box::new(|_| 0.0)
                }
            }
            Scaling::ZScore => match (mean(&present), sample_std(&present)) {
                (Some(m), Some(s)) if s > 0.0 => Box::new(move |v| (v - m) / s),
                _ => Box::new(|_| 0.0),
            },
        };

        let scaled: Vec<Option<f64>> = values.into_iter().map(|v| v.map(&transform)).collect();
        let target = if in_place {
            column.clone()
        } else {
            action.outputs[i].uuid.clone()
        };
        debug!("Scaled '{}' into '{}' ({:?})", column, target, scaling);
        df.with_column(Series::new(target.into(), scaled))?;
    }
    Ok(df)
}

/// Row-over-row difference of the first argument, `periods` rows apart.
pub(super) fn diff(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let Some(column) = action.action_arguments.first() else {
        return Ok(df);
    };
    let options = ActionOptions::of(action);
    let periods = options.i64("periods")?.unwrap_or(1);
    let output = output_name(action)?;
    let series = column_series(&df, column)?;

    let (values, divisor) = if is_datetime_dtype(series.dtype()) {
        (crate::utils::f64_values(&series)?, 1000.0)
    } else {
        (numeric_values(&series)?, 1.0)
    };

    let len = values.len() as i64;
    let diffs: Vec<Option<f64>> = (0..len)
        .map(|i| {
            let j = i - periods;
            if j < 0 || j >= len {
                return None;
            }
            Some((values[i as usize]? - values[j as usize]?) / divisor)
        })
        .collect();

    let mut df = df;
    df.with_column(Series::new(output.into(), diffs))?;
    Ok(df)
}

/// Run the UDF named by `udf` and store its result, cleaned to the output
/// column's type.
pub(super) fn add_column(
    df: DataFrame,
    action: &ActionDescription,
    column_types: &ColumnTypes,
) -> Result<DataFrame> {
    let options = ActionOptions::of(action);
    let udf = parse_udf(&options)?;
    let output = action
        .outputs
        .first()
        .ok_or_else(|| options.missing("outputs"))?;

    let input = UdfInput {
        df: &df,
        arguments: &action.action_arguments,
        options,
        column_types,
    };
    let result = udf.apply(&input)?;
    let cleaned = clean_series(&result, output.column_type, false)?
        .with_name(output.uuid.as_str().into());
    info!("Added column '{}' with {}", output.uuid, udf);

    let mut df = df;
    df.with_column(cleaned)?;
    Ok(df)
}

/// snake_case a column name: lowercase, punctuation and spaces become
/// single underscores, leading digits get an underscore prefix.
pub fn clean_column_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut pending_underscore = false;
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_underscore && !cleaned.is_empty() {
                cleaned.push('_');
            }
            pending_underscore = false;
            cleaned.push(c);
        } else {
            pending_underscore = true;
        }
    }
    if cleaned.is_empty() {
        return "column".to_string();
    }
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        cleaned.insert(0, '_');
    }
    cleaned
}

/// Clean the names of `columns` (all columns if empty), de-duplicating
/// with numeric suffixes. Returns the table and `(old, new)` pairs.
pub(super) fn clean_column_names(
    df: DataFrame,
    columns: &[String],
) -> Result<(DataFrame, Vec<(String, String)>)> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let targets: HashSet<&str> = if columns.is_empty() {
        names.iter().map(String::as_str).collect()
    } else {
        for column in columns {
            column_series(&df, column)?;
        }
        columns.iter().map(String::as_str).collect()
    };

    let mut taken: HashSet<String> = names
        .iter()
        .filter(|n| !targets.contains(n.as_str()))
        .cloned()
        .collect();
    let mut renames = Vec::new();
    for name in &names {
        if !targets.contains(name.as_str()) {
            continue;
        }
        let base = clean_column_name(name);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        taken.insert(candidate.clone());
        renames.push((name.clone(), candidate));
    }

    let new_names: Vec<String> = names
        .iter()
        .map(|name| {
            renames
                .iter()
                .find(|(old, _)| old == name)
                .map_or_else(|| name.clone(), |(_, new)| new.clone())
        })
        .collect();
    let mut df = df;
    df.set_column_names(new_names.iter().map(String::as_str))?;
    Ok((df, renames))
}
