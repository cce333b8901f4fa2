//! SQL-like query compiler.
//!
//! Compiles `SELECT <columns|*> FROM df [WHERE <expr>]` into a
//! [`CompiledQuery`]: the selected columns, a dataframe-expression string
//! rendering of the filter, and the filter itself applicable to a table.
//!
//! Used by the `filter` action, aggregation `action_code` filters and the
//! `if_else` UDF.

mod eval;
mod lexer;
mod parser;

pub use lexer::{CompareOp, Keyword, Token, TokenKind, tokenize};
pub use parser::{Condition, Operand, Query, QueryValue, SelectedColumn, like_to_regex};

use crate::error::{CleanerError, Result};
use crate::utils::to_idx;
use eval::Evaluator;
use parser::Parser;
use polars::prelude::*;
use serde::Serialize;

/// A compiled query ready to run against a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Selected column names; empty means all columns.
    pub selection: Vec<String>,
    /// The filter rendered as a dataframe expression (empty if no filter).
    pub expression: String,
    #[serde(skip)]
    pub filter: Option<Condition>,
}

impl CompiledQuery {
    fn from_parts(selection: Vec<String>, filter: Option<Condition>) -> Self {
        let expression = filter.as_ref().map(ToString::to_string).unwrap_or_default();
        Self {
            selection,
            expression,
            filter,
        }
    }

    /// Row mask of the filter; all true without one.
    pub fn mask(&self, df: &DataFrame) -> Result<BooleanChunked> {
        match &self.filter {
            Some(condition) => Evaluator::new(df).mask(condition),
            None => Ok(BooleanChunked::full("mask".into(), true, df.height())),
        }
    }

    /// Indices of matching rows.
    pub fn matching_rows(&self, df: &DataFrame) -> Result<Vec<usize>> {
        Ok(self
            .mask(df)?
            .into_iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.unwrap_or(false).then_some(i))
            .collect())
    }

    /// Filter rows, then project the selected columns.
    pub fn execute(&self, df: &DataFrame) -> Result<DataFrame> {
        for name in &self.selection {
            if df.column(name).is_err() {
                return Err(CleanerError::ColumnNotFound(name.clone()));
            }
        }

        let filtered = match &self.filter {
            Some(_) => df.take(&to_idx(&self.matching_rows(df)?))?,
            None => df.clone(),
        };

        if self.selection.is_empty() {
            Ok(filtered)
        } else {
            Ok(filtered.select(self.selection.iter().map(String::as_str))?)
        }
    }
}

/// Compile a full `SELECT` statement.
pub fn compile_query(text: &str) -> Result<CompiledQuery> {
    let query = Parser::new(text)?.parse_query()?;
    let selection = query.selection.into_iter().map(|c| c.name).collect();
    Ok(CompiledQuery::from_parts(selection, query.filter))
}

/// Compile a bare filter expression, with or without a leading `WHERE`.
///
/// Full `SELECT` statements are accepted too.
pub fn compile_filter(text: &str) -> Result<CompiledQuery> {
    let trimmed = text.trim_start();
    if trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
    {
        return compile_query(text);
    }
    let condition = Parser::new(text)?.parse_filter()?;
    Ok(CompiledQuery::from_parts(Vec::new(), Some(condition)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn people() -> DataFrame {
        df!(
            "Name" => &["Stacy Shah", "Chris Evans", "James", "Ana Ruiz"],
            "age" => &[34i64, 41, 19, 27],
        )
        .unwrap()
    }

    #[test]
    fn test_like_query() {
        let query = compile_query("SELECT * FROM df WHERE Name like \"%s\"").unwrap();
        assert_eq!(query.expression, "Name.str.fullmatch('.*s')");
        assert!(query.selection.is_empty());

        let result = query.execute(&people()).unwrap();
        let names: Vec<&str> = result
            .column("Name")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(names, vec!["Chris Evans", "James"]);
    }

    #[test]
    fn test_selection_and_filter() {
        let query = compile_query("SELECT age FROM df WHERE age >= 27 AND NOT Name = 'Ana Ruiz'")
            .unwrap();
        let result = query.execute(&people()).unwrap();
        assert_eq!(result.get_column_names(), vec!["age"]);
        let ages: Vec<i64> = result
            .column("age")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ages, vec![34, 41]);
    }

    #[test]
    fn test_unknown_selected_column() {
        let query = compile_query("SELECT height FROM df").unwrap();
        assert!(matches!(
            query.execute(&people()),
            Err(CleanerError::ColumnNotFound(name)) if name == "height"
        ));
    }

    #[test]
    fn test_compile_filter_forms() {
        let bare = compile_filter("age < 30").unwrap();
        let with_where = compile_filter("WHERE age < 30").unwrap();
        assert_eq!(bare, with_where);
        assert_eq!(bare.matching_rows(&people()).unwrap(), vec![2, 3]);

        let full = compile_filter("SELECT * FROM df WHERE age < 30").unwrap();
        assert_eq!(full.expression, "age < 30");
    }

    #[test]
    fn test_syntax_error_has_position() {
        match compile_filter("age < ") {
            Err(CleanerError::QuerySyntax { position, .. }) => assert_eq!(position, 6),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
