//! Syntax error detection for typed columns.

use crate::error::Result;
use crate::patterns::{invalid_placeholder, is_null_placeholder, syntax_pattern};
use crate::types::ColumnType;
use crate::utils::{DtypeCategory, get_dtype_category, string_values};
use polars::prelude::*;

/// Mask of cells that fail the canonical pattern of `column_type`.
///
/// Nulls, null placeholders and the type's invalid-value placeholder are
/// never flagged. Types without a pattern, and number or datetime types
/// already stored in a native dtype, produce an all-false mask.
pub fn find_syntax_errors(series: &Series, column_type: ColumnType) -> Result<BooleanChunked> {
    let name = series.name().clone();
    let all_false = || BooleanChunked::full(name.clone(), false, series.len());

    let Some(pattern) = syntax_pattern(column_type) else {
        return Ok(all_false());
    };

    let category = get_dtype_category(series.dtype());
    let native = match column_type {
        ColumnType::Number | ColumnType::NumberWithDecimals => {
            matches!(category, DtypeCategory::Integer | DtypeCategory::Float)
        }
        ColumnType::Datetime => category == DtypeCategory::Datetime,
        _ => false,
    };
    if native {
        return Ok(all_false());
    }

    let placeholder = invalid_placeholder(column_type);
    let flags: Vec<bool> = string_values(series)?
        .iter()
        .map(|cell| match cell.as_deref().map(str::trim) {
            None => false,
            Some(value) if Some(value) == placeholder => false,
            Some(value) if is_null_placeholder(value, column_type) => false,
            Some(value) => !pattern.is_match(value),
        })
        .collect();

    Ok(BooleanChunked::from_slice(name, &flags))
}

/// Number of flagged cells per typed column, skipping columns with none.
pub fn count_syntax_errors(
    df: &DataFrame,
    column_types: &crate::types::ColumnTypes,
) -> Result<Vec<(String, usize)>> {
    let mut counts = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        let Some(column_type) = column_types.get(name) else {
            continue;
        };
        let mask = find_syntax_errors(column.as_materialized_series(), *column_type)?;
        let flagged = mask.into_iter().filter(|v| *v == Some(true)).count();
        if flagged > 0 {
            counts.push((name.to_string(), flagged));
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn flags(mask: &BooleanChunked) -> Vec<bool> {
        mask.into_iter().map(|v| v.unwrap_or(false)).collect()
    }

    #[test]
    fn test_email_errors() {
        let series = Series::new(
            "email".into(),
            &[
                Some("test"),
                Some("abc12345@"),
                Some("abc@xyz.com"),
                Some("invalid_email"),
                None,
                Some("nan"),
            ],
        );
        let mask = find_syntax_errors(&series, ColumnType::Email).unwrap();
        assert_eq!(flags(&mask), vec![true, true, false, false, false, false]);
    }

    #[test]
    fn test_number_errors_and_native_numbers() {
        let series = Series::new("n".into(), &["1,000", "12.5", "abc", "0", "invalid_number"]);
        let mask = find_syntax_errors(&series, ColumnType::Number).unwrap();
        assert_eq!(flags(&mask), vec![false, true, true, false, false]);

        let native = Series::new("n".into(), &[1.5f64, 2.0]);
        let mask = find_syntax_errors(&native, ColumnType::Number).unwrap();
        assert_eq!(flags(&mask), vec![false, false]);
    }

    #[test]
    fn test_patternless_types_are_all_false() {
        let series = Series::new("c".into(), &["!!", "??"]);
        for column_type in [
            ColumnType::Category,
            ColumnType::CategoryHighCardinality,
            ColumnType::Text,
            ColumnType::List,
            ColumnType::TrueOrFalse,
        ] {
            let mask = find_syntax_errors(&series, column_type).unwrap();
            assert_eq!(flags(&mask), vec![false, false]);
        }
    }

    #[test]
    fn test_empty_column() {
        let series = Series::new_empty("e".into(), &DataType::String);
        let mask = find_syntax_errors(&series, ColumnType::Email).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn test_count_syntax_errors() {
        let df = df!(
            "zip" => &["94107", "1", "10001"],
            "phone" => &["555-123-4567", "12", "0"],
        )
        .unwrap();
        let types = crate::types::ColumnTypes::from([
            ("zip".to_string(), ColumnType::ZipCode),
            ("phone".to_string(), ColumnType::PhoneNumber),
        ]);
        let mut counts = count_syntax_errors(&df, &types).unwrap();
        counts.sort();
        assert_eq!(
            counts,
            vec![("phone".to_string(), 1), ("zip".to_string(), 1)]
        );
    }
}
