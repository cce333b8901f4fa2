//! `if_else`: choose between two operands row by row.

use super::{UDF_OUTPUT_NAME, UdfInput, broadcast_value};
use crate::error::Result;
use crate::query::compile_filter;
use crate::utils::{DtypeCategory, column_series, get_dtype_category};
use polars::prelude::*;
use serde_json::Value;

/// How an `if_else` argument is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    Column,
    Value,
}

fn operand_kind(input: &UdfInput<'_>, key: &str) -> Result<OperandKind> {
    match input.options.str(key)? {
        None | Some("column") => Ok(OperandKind::Column),
        Some("value") => Ok(OperandKind::Value),
        Some(other) => Err(input
            .options
            .invalid(key, format!("'{}' is neither 'value' nor 'column'", other))),
    }
}

/// A literal argument as a typed value: integer, float, boolean or string.
fn literal_value(text: &str) -> Value {
    if let Ok(i) = text.trim().parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = text.trim().parse::<f64>()
        && f.is_finite()
    {
        return Value::from(f);
    }
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

fn operand_series(input: &UdfInput<'_>, index: usize, kind: OperandKind) -> Result<Series> {
    let argument = input.argument(index)?;
    match kind {
        OperandKind::Column => column_series(input.df, argument),
        OperandKind::Value => Ok(broadcast_value(&literal_value(argument), input.height())),
    }
}

/// Bring both branches to one dtype: numeric pairs widen to `Float64`,
/// equal dtypes stay, anything else becomes strings.
fn unify(a: Series, b: Series) -> Result<(Series, Series)> {
    if a.dtype() == b.dtype() {
        return Ok((a, b));
    }
    let numeric = |s: &Series| {
        matches!(
            get_dtype_category(s.dtype()),
            DtypeCategory::Integer | DtypeCategory::Float
        )
    };
    let target = if numeric(&a) && numeric(&b) {
        DataType::Float64
    } else {
        DataType::String
    };
    Ok((a.cast(&target)?, b.cast(&target)?))
}

/// Rows matching `condition` take `arguments[0]`, the rest `arguments[1]`.
pub(super) fn if_else(input: &UdfInput<'_>) -> Result<Series> {
    let condition = input.options.required_str("condition")?;
    let query = compile_filter(condition)?;
    let mask = query.mask(input.df)?;

    let when_true = operand_series(input, 0, operand_kind(input, "arg1_type")?)?;
    let when_false = operand_series(input, 1, operand_kind(input, "arg2_type")?)?;
    let (when_true, when_false) = unify(when_true, when_false)?;

    Ok(when_true
        .zip_with(&mask, &when_false)?
        .with_name(UDF_OUTPUT_NAME.into()))
}

#[cfg(test)]
mod tests {
    use super::super::Udf;
    use super::super::tests::run;
    use super::*;
    use crate::error::CleanerError;
    use crate::types::ColumnTypes;
    use crate::utils::string_values;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn frame() -> DataFrame {
        df!(
            "age" => &[Some(15i64), Some(40), None],
            "name" => &["ann", "bob", "cy"],
        )
        .unwrap()
    }

    #[test]
    fn test_if_else_with_values() {
        let series = run(
            Udf::IfElse,
            &frame(),
            &["minor", "adult"],
            json!({"condition": "age < 18", "arg1_type": "value", "arg2_type": "value"}),
            &ColumnTypes::new(),
        )
        .unwrap();
        assert_eq!(
            string_values(&series).unwrap(),
            vec![
                Some("minor".to_string()),
                Some("adult".to_string()),
                Some("adult".to_string())
            ]
        );
    }

    #[test]
    fn test_if_else_mixes_columns_and_values() {
        let series = run(
            Udf::IfElse,
            &frame(),
            &["age", "0"],
            json!({"condition": "age IS NOT NULL", "arg2_type": "value"}),
            &ColumnTypes::new(),
        )
        .unwrap();
        let values: Vec<Option<i64>> = series.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(15), Some(40), Some(0)]);
    }

    #[test]
    fn test_if_else_requires_condition() {
        let error = run(
            Udf::IfElse,
            &frame(),
            &["age", "age"],
            json!({}),
            &ColumnTypes::new(),
        )
        .unwrap_err();
        assert!(matches!(error, CleanerError::MissingOption { .. }));
    }

    #[test]
    fn test_literal_values() {
        assert_eq!(literal_value("3"), json!(3));
        assert_eq!(literal_value("2.5"), json!(2.5));
        assert_eq!(literal_value("True"), json!(true));
        assert_eq!(literal_value("hello"), json!("hello"));
    }
}
