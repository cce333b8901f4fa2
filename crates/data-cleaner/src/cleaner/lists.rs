//! Conversion between list columns and [`FrozenList`] cells.
//!
//! A `list` column is stored as a polars `List` column. The inner dtype is
//! chosen once for the whole column: `Int64` if every element is an integer,
//! `Float64` if every element is numeric, `Boolean` if every element is a
//! bool, otherwise `String` with nested values rendered as literal text.
//! `None` and the missing sentinel are stored as inner nulls.

use super::literal::{FrozenList, Literal, parse_list};
use crate::error::Result;
use crate::utils::{is_integer_dtype, is_numeric_dtype};
use polars::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InnerKind {
    Int,
    Float,
    Bool,
    Str,
}

fn inner_kind<'a>(lists: impl Iterator<Item = &'a FrozenList>) -> InnerKind {
    let mut kind: Option<InnerKind> = None;
    for item in lists.flat_map(|l| l.iter()) {
        let item_kind = match item {
            Literal::None | Literal::Missing => continue,
            Literal::Int(_) => InnerKind::Int,
            Literal::Float(_) => InnerKind::Float,
            Literal::Bool(_) => InnerKind::Bool,
            _ => return InnerKind::Str,
        };
        kind = Some(match (kind, item_kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(InnerKind::Int), InnerKind::Float) | (Some(InnerKind::Float), InnerKind::Int) => {
                InnerKind::Float
            }
            _ => return InnerKind::Str,
        });
    }
    kind.unwrap_or(InnerKind::Str)
}

fn element_text(item: &Literal) -> Option<String> {
    match item {
        Literal::None | Literal::Missing => None,
        other => Some(other.to_string()),
    }
}

/// Build a polars `List` column from list cells.
pub fn lists_to_series(name: PlSmallStr, cells: &[Option<FrozenList>]) -> Series {
    let kind = inner_kind(cells.iter().flatten());
    let inner: Vec<Option<Series>> = cells
        .iter()
        .map(|cell| {
            cell.as_ref().map(|list| match kind {
                InnerKind::Int => Series::new(
                    PlSmallStr::EMPTY,
                    list.iter()
                        .map(|i| match i {
                            Literal::Int(v) => Some(*v),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                ),
                InnerKind::Float => Series::new(
                    PlSmallStr::EMPTY,
                    list.iter().map(Literal::as_f64).collect::<Vec<_>>(),
                ),
                InnerKind::Bool => Series::new(
                    PlSmallStr::EMPTY,
                    list.iter()
                        .map(|i| match i {
                            Literal::Bool(v) => Some(*v),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                ),
                InnerKind::Str => Series::new(
                    PlSmallStr::EMPTY,
                    list.iter().map(element_text).collect::<Vec<_>>(),
                ),
            })
        })
        .collect();

    let ca: ListChunked = inner.into_iter().collect();
    ca.with_name(name).into_series()
}

fn inner_to_literals(inner: &Series) -> Result<FrozenList> {
    let dtype = inner.dtype();
    let items: Vec<Literal> = if is_integer_dtype(dtype) {
        inner
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Literal::None, Literal::Int))
            .collect()
    } else if is_numeric_dtype(dtype) {
        inner
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Literal::None, Literal::Float))
            .collect()
    } else if matches!(dtype, DataType::Boolean) {
        inner
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Literal::None, Literal::Bool))
            .collect()
    } else {
        crate::utils::string_values(inner)?
            .into_iter()
            .map(|v| v.map_or(Literal::None, Literal::Str))
            .collect()
    };
    Ok(FrozenList::new(items))
}

/// Read any column as list cells, parsing list-shaped strings.
///
/// Null cells stay `None`; non-list scalars become one-element lists.
pub fn series_to_lists(series: &Series) -> Result<Vec<Option<FrozenList>>> {
    match series.dtype() {
        DataType::List(_) => {
            let mut out = Vec::with_capacity(series.len());
            for cell in series.list()?.into_iter() {
                out.push(match cell {
                    Some(inner) => Some(inner_to_literals(&inner)?),
                    None => None,
                });
            }
            Ok(out)
        }
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| to_list(parse_list(&Literal::Str(s.to_string())))))
            .collect()),
        dtype if is_integer_dtype(dtype) => Ok(series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(|i| FrozenList::singleton(Literal::Int(i))))
            .collect()),
        dtype if is_numeric_dtype(dtype) => Ok(series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(|f| FrozenList::singleton(Literal::Float(f))))
            .collect()),
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| FrozenList::singleton(Literal::Bool(b))))
            .collect()),
        _ => Ok(crate::utils::string_values(series)?
            .into_iter()
            .map(|v| v.map(|s| FrozenList::singleton(Literal::Str(s))))
            .collect()),
    }
}

fn to_list(value: Literal) -> Option<FrozenList> {
    match value {
        Literal::List(list) => Some(list),
        _ => None,
    }
}

/// Render a list column as literal text, e.g. for CSV output.
pub fn lists_to_strings(series: &Series) -> Result<Series> {
    let rendered: Vec<Option<String>> = series_to_lists(series)?
        .into_iter()
        .map(|cell| cell.map(|l| l.to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), rendered))
}
