//! String functions: `string_replace`, `string_split`, `substring`.

use super::{UDF_OUTPUT_NAME, UdfInput};
use crate::error::Result;
use crate::utils::string_values;
use polars::prelude::*;
use regex::Regex;

fn map_strings<F>(input: &UdfInput<'_>, mut f: F) -> Result<Series>
where
    F: FnMut(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = string_values(&input.column(0)?)?
        .into_iter()
        .map(|v| v.and_then(|s| f(&s)))
        .collect();
    Ok(Series::new(UDF_OUTPUT_NAME.into(), values))
}

/// Regex replace of every match of `pattern` with `replacement`.
pub(super) fn string_replace(input: &UdfInput<'_>) -> Result<Series> {
    let pattern = input.options.required_str("pattern")?;
    let replacement = input.options.required_str("replacement")?;
    let regex = Regex::new(pattern).map_err(|e| input.options.invalid("pattern", e.to_string()))?;
    map_strings(input, |s| Some(regex.replace_all(s, replacement).into_owned()))
}

/// Split on the literal `separator` and keep part `part_index`.
///
/// Negative indices count from the end; out-of-range parts are null.
pub(super) fn string_split(input: &UdfInput<'_>) -> Result<Series> {
    let separator = input.options.required_str("separator")?;
    let part_index = input
        .options
        .i64("part_index")?
        .ok_or_else(|| input.options.missing("part_index"))?;
    if separator.is_empty() {
        return Err(input.options.invalid("separator", "empty separator"));
    }

    map_strings(input, |s| {
        let parts: Vec<&str> = s.split(separator).collect();
        let index = if part_index < 0 {
            parts.len() as i64 + part_index
        } else {
            part_index
        };
        usize::try_from(index)
            .ok()
            .and_then(|i| parts.get(i))
            .map(|p| p.to_string())
    })
}

/// Character slice `[start, stop)`; negative bounds count from the end.
pub(super) fn substring(input: &UdfInput<'_>) -> Result<Series> {
    let start = input.options.i64("start")?;
    let stop = input.options.i64("stop")?;
    if start.is_none() && stop.is_none() {
        return Err(input.options.missing("start"));
    }

    map_strings(input, |s| {
        let chars: Vec<char> = s.chars().collect();
        let (from, to) = slice_bounds(chars.len(), start, stop);
        Some(chars[from..to].iter().collect())
    })
}

fn slice_bounds(len: usize, start: Option<i64>, stop: Option<i64>) -> (usize, usize) {
    let clamp = |i: i64| -> usize {
        if i < 0 {
            (len as i64 + i).max(0) as usize
        } else {
            (i as usize).min(len)
        }
    };
    let from = start.map_or(0, clamp);
    let to = stop.map_or(len, clamp);
    (from, to.max(from))
}

#[cfg(test)]
mod tests {
    use super::super::Udf;
    use super::super::tests::run;
    use super::*;
    use crate::error::CleanerError;
    use crate::types::ColumnTypes;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn apply(udf: Udf, values: &[Option<&str>], options: Value) -> Result<Vec<Option<String>>> {
        let df = df!("s" => values).unwrap();
        let series = run(udf, &df, &["s"], options, &ColumnTypes::new())?;
        string_values(&series)
    }

    fn owned(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_string_replace_strips_currency() {
        let result = apply(
            Udf::StringReplace,
            &[Some("$1000"), Some("$321.  "), Some("$4,321")],
            json!({"pattern": r"\$|\.|\,|\s*", "replacement": ""}),
        )
        .unwrap();
        assert_eq!(result, owned(&[Some("1000"), Some("321"), Some("4321")]));
    }

    #[test]
    fn test_string_replace_requires_options() {
        let error = apply(Udf::StringReplace, &[Some("a")], json!({"pattern": "a"})).unwrap_err();
        assert!(matches!(
            error,
            CleanerError::MissingOption { ref action, ref option }
                if action == "string_replace" && option == "replacement"
        ));
    }

    #[test]
    fn test_string_split() {
        let values = [Some("a-b-c"), Some("d"), None];
        let second = apply(
            Udf::StringSplit,
            &values,
            json!({"separator": "-", "part_index": 1}),
        )
        .unwrap();
        assert_eq!(second, owned(&[Some("b"), None, None]));

        let last = apply(
            Udf::StringSplit,
            &values,
            json!({"separator": "-", "part_index": -1}),
        )
        .unwrap();
        assert_eq!(last, owned(&[Some("c"), Some("d"), None]));

        let error = apply(Udf::StringSplit, &values, json!({"separator": "-"})).unwrap_err();
        assert!(matches!(error, CleanerError::MissingOption { .. }));
    }

    #[test]
    fn test_substring() {
        let values = [Some("abcdef"), Some("xy")];
        let head = apply(Udf::Substring, &values, json!({"stop": 3})).unwrap();
        assert_eq!(head, owned(&[Some("abc"), Some("xy")]));

        let middle = apply(Udf::Substring, &values, json!({"start": 1, "stop": -1})).unwrap();
        assert_eq!(middle, owned(&[Some("bcde"), Some("")]));

        assert!(apply(Udf::Substring, &values, json!({})).is_err());
    }
}
