//! Row actions: filtering, de-duplication, sorting, limits and outlier
//! removal.

use super::ActionOptions;
use crate::config::CleanerConfig;
use crate::error::{CleanerError, Result};
use crate::outliers::{OutlierMethod, OutlierRemover};
use crate::query::compile_filter;
use crate::types::ActionDescription;
use crate::utils::{SortKey, column_series, f64_values, sort_keys, sorted_indices, to_idx};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::info;

fn key_columns(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<SortKey>>> {
    columns
        .iter()
        .map(|c| column_series(df, c).and_then(|s| sort_keys(&s)))
        .collect()
}

fn all_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Keep rows matching the `action_code` condition.
pub(super) fn filter(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let code = action
        .code()
        .ok_or_else(|| CleanerError::missing_option(action.action_type.as_str(), "action_code"))?;
    let mask = compile_filter(code)?.mask(&df)?;
    let filtered = df.filter(&mask)?;
    info!("Filter kept {} of {} rows", filtered.height(), df.height());
    Ok(filtered)
}

/// Drop repeated rows over the argument columns (all columns if none),
/// keeping the `first` (default) or `last` occurrence.
pub(super) fn drop_duplicate(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let options = ActionOptions::of(action);
    let keep_last = match options.str("keep")?.unwrap_or("first") {
        "first" => false,
        "last" => true,
        other => {
            return Err(CleanerError::UnsupportedOption {
                action: options.action().to_string(),
                option: "keep".to_string(),
                value: other.to_string(),
            });
        }
    };

    let subset = if action.action_arguments.is_empty() {
        all_columns(&df)
    } else {
        action.action_arguments.clone()
    };
    let keys = key_columns(&df, &subset)?;

    let mut seen: BTreeSet<Vec<SortKey>> = BTreeSet::new();
    let mut kept: Vec<usize> = Vec::new();
    let rows: Box<dyn Iterator<Item = usize>> = if keep_last {
        Box::new((0..df.height()).rev())
    } else {
        Box::new(0..df.height())
    };
    for row in rows {
        let key: Vec<SortKey> = keys.iter().map(|k| k[row].clone()).collect();
        if seen.insert(key) {
            kept.push(row);
        }
    }
    kept.sort_unstable();

    info!("Removed {} duplicate rows", df.height() - kept.len());
    Ok(df.take(&to_idx(&kept))?)
}

/// Stable sort by the argument columns. `ascending` is one flag per
/// column, defaulting to ascending; nulls sort last.
pub(super) fn sort(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    if action.action_arguments.is_empty() {
        return Ok(df);
    }
    let options = ActionOptions::of(action);
    let ascending = options.bool_list("ascending")?;
    let descending: Vec<bool> = (0..action.action_arguments.len())
        .map(|i| !ascending.get(i).copied().unwrap_or(true))
        .collect();

    let keys = key_columns(&df, &action.action_arguments)?;
    let order = sorted_indices(&keys, &descending, df.height());
    Ok(df.take(&to_idx(&order))?)
}

/// Keep the first `limit` rows.
pub(super) fn limit(df: DataFrame, action: &ActionDescription) -> Result<DataFrame> {
    let options = ActionOptions::of(action);
    let limit = options.usize("limit")?.ok_or_else(|| options.missing("limit"))?;
    Ok(df.head(Some(limit)))
}

/// Remove rows flagged by the outlier remover over `numeric_columns`.
///
/// Rows with a missing value in any of the columns are not scored and
/// always kept.
pub(super) fn remove_outliers(
    df: DataFrame,
    action: &ActionDescription,
    numeric_columns: &[String],
    config: &CleanerConfig,
) -> Result<DataFrame> {
    if numeric_columns.is_empty() {
        return Ok(df);
    }
    let options = ActionOptions::of(action);
    let method = match options.str("method")? {
        Some(name) => name
            .parse::<OutlierMethod>()
            .map_err(|reason| options.invalid("method", reason))?,
        None => OutlierMethod::Auto,
    };
    let mut remover = OutlierRemover::from_config(method, config);
    if let Some(contamination) = options.f64("contamination")? {
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(options.invalid("contamination", "must be in (0, 0.5]"));
        }
        remover = remover.with_contamination(contamination);
    }

    let values = numeric_columns
        .iter()
        .map(|c| column_series(&df, c).and_then(|s| f64_values(&s)))
        .collect::<Result<Vec<_>>>()?;

    let mut scored_rows = Vec::new();
    let mut matrix = Vec::new();
    for row in 0..df.height() {
        let features: Option<Vec<f64>> = values
            .iter()
            .map(|column| column[row].filter(|v| v.is_finite()))
            .collect();
        if let Some(features) = features {
            scored_rows.push(row);
            matrix.push(features);
        }
    }

    let mask = remover.fit_transform(&matrix);
    let mut keep = vec![true; df.height()];
    for (&row, &outlier) in scored_rows.iter().zip(&mask) {
        if outlier {
            keep[row] = false;
        }
    }
    let removed = keep.iter().filter(|k| !**k).count();
    info!(
        "Removed {} outlier rows using {}",
        removed,
        remover.resolve_method(numeric_columns.len())
    );

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        df.column(name).unwrap().i64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_filter() {
        let df = df!("v" => &[1i64, 5, 10]).unwrap();
        let action = ActionDescription::new(ActionType::Filter).with_code("v >= 5");
        assert_eq!(ints(&filter(df.clone(), &action).unwrap(), "v"), vec![Some(5), Some(10)]);

        let missing = ActionDescription::new(ActionType::Filter);
        assert!(matches!(
            filter(df, &missing),
            Err(CleanerError::MissingOption { .. })
        ));
    }

    #[test]
    fn test_drop_duplicate_keep_first_and_last() {
        let df = df!(
            "k" => &["a", "b", "a", "c"],
            "v" => &[1i64, 2, 3, 4],
        )
        .unwrap();
        let first = ActionDescription::new(ActionType::DropDuplicate).with_arguments(["k"]);
        assert_eq!(
            ints(&drop_duplicate(df.clone(), &first).unwrap(), "v"),
            vec![Some(1), Some(2), Some(4)]
        );

        let last = first.clone().with_option("keep", "last");
        assert_eq!(
            ints(&drop_duplicate(df.clone(), &last).unwrap(), "v"),
            vec![Some(2), Some(3), Some(4)]
        );

        let all = ActionDescription::new(ActionType::DropDuplicate);
        assert_eq!(drop_duplicate(df, &all).unwrap().height(), 4);
    }

    #[test]
    fn test_sort_with_ascending_flags() {
        let df = df!(
            "g" => &["b", "a", "b", "a"],
            "v" => &[1i64, 2, 3, 4],
        )
        .unwrap();
        let action = ActionDescription::new(ActionType::Sort)
            .with_arguments(["g", "v"])
            .with_option("ascending", json!([true, false]));
        let sorted = sort(df, &action).unwrap();
        assert_eq!(ints(&sorted, "v"), vec![Some(4), Some(2), Some(3), Some(1)]);
    }

    #[test]
    fn test_limit() {
        let df = df!("v" => &[1i64, 2, 3]).unwrap();
        let action = ActionDescription::new(ActionType::Limit).with_option("limit", 2);
        assert_eq!(limit(df.clone(), &action).unwrap().height(), 2);
        assert!(limit(df, &ActionDescription::new(ActionType::Limit)).is_err());
    }

    fn outlier_df() -> DataFrame {
        let rows = crate::outliers::tests::fixture();
        let mut x: Vec<Option<f64>> = rows.iter().map(|r| Some(r[0])).collect();
        let mut y: Vec<Option<f64>> = rows.iter().map(|r| Some(r[1])).collect();
        x.push(None);
        y.push(Some(-1000.0));
        df!("x" => x, "y" => y).unwrap()
    }

    #[test]
    fn test_remove_outliers_drops_only_the_outlier() {
        let columns = vec!["x".to_string(), "y".to_string()];
        for method in ["lof", "itree"] {
            let action = ActionDescription::new(ActionType::RemoveOutliers)
                .with_arguments(["x", "y"])
                .with_option("method", method);
            let result =
                remove_outliers(outlier_df(), &action, &columns, &CleanerConfig::default()).unwrap();
            assert_eq!(result.height(), 12, "method {method}");
            let x = result.column("x").unwrap().f64().unwrap();
            assert_eq!(x.get(0), Some(50.0));
            assert_eq!(x.get(11), None);
        }
    }

    #[test]
    fn test_remove_outliers_rejects_bad_options() {
        let columns = vec!["x".to_string()];
        let bad_method = ActionDescription::new(ActionType::RemoveOutliers)
            .with_option("method", "kmeans");
        assert!(matches!(
            remove_outliers(outlier_df(), &bad_method, &columns, &CleanerConfig::default()),
            Err(CleanerError::InvalidOption { .. })
        ));

        let bad_contamination = ActionDescription::new(ActionType::RemoveOutliers)
            .with_option("contamination", 0.9);
        assert!(
            remove_outliers(outlier_df(), &bad_contamination, &columns, &CleanerConfig::default())
                .is_err()
        );
    }
}
