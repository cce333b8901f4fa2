//! Fills that copy existing cells: mode, random sampling, forward fill and
//! another column.

use crate::cleaner::{FrozenList, series_to_lists};
use crate::error::{CleanerError, Result};
use crate::utils::{DtypeCategory, SortKey, get_dtype_category, sort_keys, string_values};
use polars::prelude::*;
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashMap};

/// Gather cells by row index; `None` produces a null.
pub(crate) fn gather(series: &Series, indices: &[Option<usize>]) -> Result<Series> {
    let idx = IdxCa::from_iter_options(
        "idx".into(),
        indices.iter().map(|i| i.map(|v| v as IdxSize)),
    );
    Ok(series.take(&idx)?)
}

fn null_flags(series: &Series) -> Vec<bool> {
    series
        .is_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect()
}

/// Row index of the most frequent value. Ties go to the smallest value,
/// or to the first occurrence for list cells.
pub fn mode_index(series: &Series) -> Result<Option<usize>> {
    if matches!(get_dtype_category(series.dtype()), DtypeCategory::List) {
        let mut counts: HashMap<FrozenList, (usize, usize)> = HashMap::new();
        for (i, cell) in series_to_lists(series)?.into_iter().enumerate() {
            if let Some(list) = cell {
                counts.entry(list).or_insert((0, i)).0 += 1;
            }
        }
        return Ok(counts
            .into_values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, first)| first));
    }

    let mut counts: BTreeMap<SortKey, (usize, usize)> = BTreeMap::new();
    for (i, key) in sort_keys(series)?.into_iter().enumerate() {
        if !key.is_null() {
            counts.entry(key).or_insert((0, i)).0 += 1;
        }
    }
    let mut best: Option<(usize, usize)> = None;
    for (count, first) in counts.into_values() {
        if best.is_none_or(|(c, _)| count > c) {
            best = Some((count, first));
        }
    }
    Ok(best.map(|(_, first)| first))
}

/// Fill nulls with the column's mode.
pub fn fill_mode(series: &Series) -> Result<Series> {
    let Some(mode) = mode_index(series)? else {
        return Ok(series.clone());
    };
    let indices: Vec<Option<usize>> = null_flags(series)
        .into_iter()
        .enumerate()
        .map(|(i, is_null)| Some(if is_null { mode } else { i }))
        .collect();
    gather(series, &indices)
}

/// Fill each null with a value sampled, with replacement, from the non-null cells.
pub fn fill_random(series: &Series, rng: &mut StdRng) -> Result<Series> {
    let nulls = null_flags(series);
    if !nulls.iter().any(|n| *n) {
        return Ok(series.clone());
    }
    let donors: Vec<usize> = (0..nulls.len()).filter(|&i| !nulls[i]).collect();
    if donors.is_empty() {
        return Err(CleanerError::NoDonorValues(series.name().to_string()));
    }
    let indices: Vec<Option<usize>> = nulls
        .iter()
        .enumerate()
        .map(|(i, is_null)| {
            Some(if *is_null {
                donors[rng.gen_range(0..donors.len())]
            } else {
                i
            })
        })
        .collect();
    gather(series, &indices)
}

/// Carry the last non-null value forward. Leading nulls stay null.
pub fn forward_fill(series: &Series) -> Result<Series> {
    let mut last = None;
    let indices: Vec<Option<usize>> = null_flags(series)
        .into_iter()
        .enumerate()
        .map(|(i, is_null)| {
            if !is_null {
                last = Some(i);
            }
            last
        })
        .collect();
    gather(series, &indices)
}

/// Fill nulls from the same row of another column.
pub fn fill_from_column(series: &Series, donor: &Series) -> Result<Series> {
    let (target, donor) = if series.dtype() == donor.dtype() {
        (series.clone(), donor.clone())
    } else {
        let both_numeric = matches!(
            (get_dtype_category(series.dtype()), get_dtype_category(donor.dtype())),
            (
                DtypeCategory::Integer | DtypeCategory::Float,
                DtypeCategory::Integer | DtypeCategory::Float
            )
        );
        if both_numeric {
            (
                series.cast(&DataType::Float64)?,
                donor.cast(&DataType::Float64)?,
            )
        } else {
            (
                Series::new(series.name().clone(), string_values(series)?),
                Series::new(donor.name().clone(), string_values(donor)?),
            )
        }
    };
    let mask = target.is_not_null();
    Ok(target.zip_with(&mask, &donor)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    #[test]
    fn test_mode_prefers_smallest_on_tie() {
        let series = Series::new("s".into(), &[Some("b"), Some("a"), None, Some("b"), Some("a")]);
        assert_eq!(mode_index(&series).unwrap(), Some(1));

        let filled = fill_mode(&series).unwrap();
        assert_eq!(filled.str().unwrap().get(2), Some("a"));
    }

    #[test]
    fn test_mode_of_list_cells() {
        let lists = crate::cleaner::clean_series(
            &Series::new("l".into(), &[Some("[1]"), Some("[2, 3]"), None, Some("[2, 3]")]),
            crate::types::ColumnType::List,
            false,
        )
        .unwrap();
        assert_eq!(mode_index(&lists).unwrap(), Some(1));
        let filled = fill_mode(&lists).unwrap();
        let cells = series_to_lists(&filled).unwrap();
        assert_eq!(cells[2], cells[1]);
    }

    #[test]
    fn test_random_fill_draws_from_donors() {
        let series = Series::new("n".into(), &[Some(1i64), None, Some(3), None]);
        let mut rng = StdRng::seed_from_u64(42);
        let filled = fill_random(&series, &mut rng).unwrap();
        assert_eq!(filled.null_count(), 0);
        for value in filled.i64().unwrap().into_iter().flatten() {
            assert!(value == 1 || value == 3);
        }
    }

    #[test]
    fn test_random_fill_without_donors_fails() {
        let series = Series::new("empty".into(), &[None::<i64>, None]);
        let mut rng = StdRng::seed_from_u64(42);
        let error = fill_random(&series, &mut rng).unwrap_err();
        assert!(error.to_string().contains("empty"));
    }

    #[test]
    fn test_forward_fill() {
        let series = Series::new("n".into(), &[None, Some(1i64), None, Some(4), None]);
        let filled = forward_fill(&series).unwrap();
        let values: Vec<Option<i64>> = filled.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![None, Some(1), Some(1), Some(4), Some(4)]);
    }

    #[test]
    fn test_fill_from_column() {
        let target = Series::new("a".into(), &[Some(1i64), None]);
        let donor = Series::new("b".into(), &[Some(9.5f64), Some(2.5)]);
        let filled = fill_from_column(&target, &donor).unwrap();
        let values: Vec<Option<f64>> = filled.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1.0), Some(2.5)]);
        assert_eq!(filled.name().as_str(), "a");
    }
}
