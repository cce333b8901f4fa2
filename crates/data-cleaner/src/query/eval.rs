//! Row-wise evaluation of a parsed condition against a table.

use super::lexer::CompareOp;
use super::parser::{Condition, Operand, QueryValue, like_to_regex};
use crate::cleaner::parse_datetime;
use crate::error::{CleanerError, Result};
use crate::utils::{
    DtypeCategory, column_series, datetime_millis, f64_values, get_dtype_category, string_values,
};
use polars::prelude::*;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Null,
    Num(f64),
    Str(String),
    Bool(bool),
    Date(i64),
}

impl Cell {
    fn from_value(value: &QueryValue) -> Self {
        match value {
            QueryValue::Null => Self::Null,
            QueryValue::Bool(b) => Self::Bool(*b),
            QueryValue::Number(n) => Self::Num(*n),
            QueryValue::Str(s) => Self::Str(s.clone()),
            QueryValue::Date(ms) => Self::Date(*ms),
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Num(n) => Some(n.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            Self::Date(ms) => crate::utils::millis_to_naive(*ms)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

struct ColumnCells {
    cells: Vec<Cell>,
    /// Empty strings count as null.
    soft_nulls: bool,
}

fn load_column(series: &Series) -> Result<ColumnCells> {
    let cells: Vec<Cell> = match get_dtype_category(series.dtype()) {
        DtypeCategory::Integer | DtypeCategory::Float => f64_values(series)?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Num))
            .collect(),
        DtypeCategory::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Bool))
            .collect(),
        DtypeCategory::Datetime => datetime_millis(series)?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Date))
            .collect(),
        _ => string_values(series)?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Str))
            .collect(),
    };

    let first = cells.iter().find(|c| match c {
        Cell::Null => false,
        Cell::Str(s) => !s.is_empty(),
        _ => true,
    });
    let soft_nulls = matches!(first, Some(Cell::Str(_)));
    Ok(ColumnCells { cells, soft_nulls })
}

fn compare(a: &Cell, b: &Cell) -> Option<Ordering> {
    match (a, b) {
        (Cell::Null, _) | (_, Cell::Null) => None,
        (Cell::Num(x), Cell::Num(y)) => x.partial_cmp(y),
        (Cell::Str(x), Cell::Str(y)) => Some(x.cmp(y)),
        (Cell::Bool(x), Cell::Bool(y)) => Some(x.cmp(y)),
        (Cell::Date(x), Cell::Date(y)) => Some(x.cmp(y)),
        (Cell::Bool(x), Cell::Num(y)) => (if *x { 1.0 } else { 0.0 }).partial_cmp(y),
        (Cell::Num(_), Cell::Bool(_)) => compare(b, a).map(Ordering::reverse),
        (Cell::Date(x), Cell::Str(s)) => {
            parse_datetime(s).map(|dt| x.cmp(&dt.and_utc().timestamp_millis()))
        }
        (Cell::Str(_), Cell::Date(_)) => compare(b, a).map(Ordering::reverse),
        (Cell::Num(x), Cell::Str(s)) => s.trim().parse::<f64>().ok().and_then(|y| x.partial_cmp(&y)),
        (Cell::Str(_), Cell::Num(_)) => compare(b, a).map(Ordering::reverse),
        (Cell::Bool(x), Cell::Str(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(x.cmp(&true)),
            "false" => Some(x.cmp(&false)),
            _ => None,
        },
        (Cell::Str(_), Cell::Bool(_)) => compare(b, a).map(Ordering::reverse),
        _ => None,
    }
}

fn apply_op(op: CompareOp, ordering: Option<Ordering>) -> bool {
    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Evaluates conditions, loading each referenced column once.
pub(crate) struct Evaluator<'a> {
    df: &'a DataFrame,
    columns: HashMap<String, ColumnCells>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(df: &'a DataFrame) -> Self {
        Self {
            df,
            columns: HashMap::new(),
        }
    }

    /// Row mask for `condition`.
    pub(crate) fn mask(&mut self, condition: &Condition) -> Result<BooleanChunked> {
        let flags = self.eval(condition)?;
        Ok(BooleanChunked::from_slice("mask".into(), &flags))
    }

    fn load(&mut self, operand: &Operand) -> Result<()> {
        if let Operand::Column { name, .. } = operand
            && !self.columns.contains_key(name)
        {
            let cells = load_column(&column_series(self.df, name)?)?;
            self.columns.insert(name.clone(), cells);
        }
        Ok(())
    }

    fn cell(&self, operand: &Operand, row: usize) -> Cell {
        match operand {
            Operand::Literal(value) => Cell::from_value(value),
            Operand::Column { name, .. } => self
                .columns
                .get(name)
                .and_then(|c| c.cells.get(row))
                .cloned()
                .unwrap_or(Cell::Null),
        }
    }

    fn eval(&mut self, condition: &Condition) -> Result<Vec<bool>> {
        let height = self.df.height();
        let flags = match condition {
            Condition::And(a, b) => {
                let left = self.eval(a)?;
                let right = self.eval(b)?;
                left.iter().zip(&right).map(|(x, y)| *x && *y).collect()
            }
            Condition::Or(a, b) => {
                let left = self.eval(a)?;
                let right = self.eval(b)?;
                left.iter().zip(&right).map(|(x, y)| *x || *y).collect()
            }
            Condition::Not(inner) => self.eval(inner)?.into_iter().map(|x| !x).collect(),
            Condition::Compare { left, op, right } => {
                self.load(left)?;
                self.load(right)?;
                (0..height)
                    .map(|row| apply_op(*op, compare(&self.cell(left, row), &self.cell(right, row))))
                    .collect()
            }
            Condition::Null { operand, negated } => {
                self.load(operand)?;
                let soft_nulls = match operand {
                    Operand::Column { name, .. } => {
                        self.columns.get(name).is_some_and(|c| c.soft_nulls)
                    }
                    Operand::Literal(_) => false,
                };
                (0..height)
                    .map(|row| {
                        let is_null = match self.cell(operand, row) {
                            Cell::Null => true,
                            Cell::Str(s) => soft_nulls && s.is_empty(),
                            _ => false,
                        };
                        is_null != *negated
                    })
                    .collect()
            }
            Condition::Between {
                operand,
                low,
                high,
                negated,
            } => {
                self.load(operand)?;
                self.load(low)?;
                self.load(high)?;
                (0..height)
                    .map(|row| {
                        let value = self.cell(operand, row);
                        let inside = apply_op(CompareOp::Ge, compare(&value, &self.cell(low, row)))
                            && apply_op(CompareOp::Le, compare(&value, &self.cell(high, row)));
                        inside != *negated
                    })
                    .collect()
            }
            Condition::In {
                operand,
                values,
                negated,
            } => {
                self.load(operand)?;
                let candidates: Vec<Cell> = values.iter().map(Cell::from_value).collect();
                (0..height)
                    .map(|row| {
                        let value = self.cell(operand, row);
                        let found = candidates
                            .iter()
                            .any(|c| compare(&value, c) == Some(Ordering::Equal));
                        found != *negated
                    })
                    .collect()
            }
            Condition::Like {
                operand,
                pattern,
                negated,
            } => {
                self.load(operand)?;
                let regex = Regex::new(&format!("^(?s:{})$", like_to_regex(pattern))).map_err(
                    |e| CleanerError::QuerySyntax {
                        position: 0,
                        message: format!("invalid LIKE pattern '{}': {}", pattern, e),
                    },
                )?;
                (0..height)
                    .map(|row| match self.cell(operand, row).text() {
                        Some(text) => regex.is_match(&text) != *negated,
                        None => *negated,
                    })
                    .collect()
            }
        };
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compile_filter;
    use pretty_assertions::assert_eq;

    fn people() -> DataFrame {
        df!(
            "Name" => &[Some("Stacy Shah"), Some("Bob Jones"), Some(""), None],
            "age" => &[Some(30i64), None, Some(25), Some(41)],
            "vip" => &[Some(true), Some(false), None, Some(true)],
        )
        .unwrap()
    }

    fn mask(filter: &str) -> Vec<bool> {
        let compiled = compile_filter(filter).unwrap();
        let condition = compiled.filter.unwrap();
        let df = people();
        Evaluator::new(&df)
            .mask(&condition)
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect()
    }

    #[test]
    fn test_like_is_full_match() {
        assert_eq!(mask("Name like '%s'"), vec![false, true, false, false]);
        assert_eq!(mask("Name like '%h'"), vec![true, false, false, false]);
        assert_eq!(mask("Name like '%Shah'"), vec![true, false, false, false]);
        assert_eq!(mask("Name like 'S%'"), vec![true, false, false, false]);
    }

    #[test]
    fn test_null_semantics() {
        assert_eq!(mask("age > 26"), vec![true, false, false, true]);
        assert_eq!(mask("age != 30"), vec![false, true, true, true]);
        assert_eq!(mask("age = 30"), vec![true, false, false, false]);
    }

    #[test]
    fn test_soft_nulls_for_strings() {
        assert_eq!(mask("Name IS NULL"), vec![false, false, true, true]);
        assert_eq!(mask("Name IS NOT NULL"), vec![true, true, false, false]);
        assert_eq!(mask("age IS NULL"), vec![false, true, false, false]);
    }

    #[test]
    fn test_between_in_and_booleans() {
        assert_eq!(mask("age BETWEEN 25 AND 30"), vec![true, false, true, false]);
        assert_eq!(mask("age IN (25, 41)"), vec![false, false, true, true]);
        assert_eq!(mask("age NOT IN (25, 41)"), vec![true, true, false, false]);
        assert_eq!(mask("vip = TRUE AND NOT age < 35"), vec![false, false, false, true]);
        assert_eq!(mask("vip IS FALSE OR age = 25"), vec![false, true, true, false]);
    }

    #[test]
    fn test_missing_column() {
        let compiled = compile_filter("missing = 1").unwrap();
        let df = people();
        let error = Evaluator::new(&df)
            .mask(compiled.filter.as_ref().unwrap())
            .unwrap_err();
        assert!(matches!(error, CleanerError::ColumnNotFound(_)));
    }
}
