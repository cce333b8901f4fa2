//! Column-producing functions for the `add_column` action.
//!
//! The `udf` option names one of the [`Udf`] variants. Each function reads
//! the action's argument columns and options and returns one series of the
//! table's height; `add_column` renames it and coerces it to the declared
//! output type.

mod arithmetic;
mod conditional;
mod dates;
mod strings;

use crate::actions::ActionOptions;
use crate::error::{CleanerError, Result};
use crate::types::{ColumnType, ColumnTypes};
use crate::utils::column_series;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Name given to UDF results before the caller renames them.
pub const UDF_OUTPUT_NAME: &str = "udf";

/// Registered column functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Udf {
    Addition,
    Constant,
    DateTrunc,
    Difference,
    DistanceBetween,
    FormattedDate,
    IfElse,
    Multiply,
    StringReplace,
    StringSplit,
    Substring,
}

impl Udf {
    pub const ALL: [Udf; 11] = [
        Udf::Addition,
        Udf::Constant,
        Udf::DateTrunc,
        Udf::Difference,
        Udf::DistanceBetween,
        Udf::FormattedDate,
        Udf::IfElse,
        Udf::Multiply,
        Udf::StringReplace,
        Udf::StringSplit,
        Udf::Substring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Constant => "constant",
            Self::DateTrunc => "date_trunc",
            Self::Difference => "difference",
            Self::DistanceBetween => "distance_between",
            Self::FormattedDate => "formatted_date",
            Self::IfElse => "if_else",
            Self::Multiply => "multiply",
            Self::StringReplace => "string_replace",
            Self::StringSplit => "string_split",
            Self::Substring => "substring",
        }
    }

    /// Run the function against `input`.
    pub fn apply(&self, input: &UdfInput<'_>) -> Result<Series> {
        let input = UdfInput {
            options: input.options.for_action(self.as_str()),
            ..*input
        };
        let series = match self {
            Self::Addition => arithmetic::addition(&input)?,
            Self::Constant => constant(&input)?,
            Self::DateTrunc => dates::date_trunc(&input)?,
            Self::Difference => arithmetic::difference(&input)?,
            Self::DistanceBetween => dates::distance_between(&input)?,
            Self::FormattedDate => dates::formatted_date(&input)?,
            Self::IfElse => conditional::if_else(&input)?,
            Self::Multiply => arithmetic::multiply(&input)?,
            Self::StringReplace => strings::string_replace(&input)?,
            Self::StringSplit => strings::string_split(&input)?,
            Self::Substring => strings::substring(&input)?,
        };
        Ok(series.with_name(UDF_OUTPUT_NAME.into()))
    }
}

impl fmt::Display for Udf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Udf {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Udf::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| format!("unknown udf '{}'", s))
    }
}

/// Everything a UDF may read.
#[derive(Debug, Clone, Copy)]
pub struct UdfInput<'a> {
    pub df: &'a DataFrame,
    pub arguments: &'a [String],
    pub options: ActionOptions<'a>,
    pub column_types: &'a ColumnTypes,
}

impl<'a> UdfInput<'a> {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Name of the `index`-th argument column.
    pub fn argument(&self, index: usize) -> Result<&'a str> {
        self.arguments
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                self.options.invalid(
                    "action_arguments",
                    format!("expected at least {} arguments", index + 1),
                )
            })
    }

    /// Series of the `index`-th argument column.
    pub fn column(&self, index: usize) -> Result<Series> {
        column_series(self.df, self.argument(index)?)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_types.get(name).copied()
    }

    fn require_arguments(&self, count: usize) -> Result<()> {
        if self.arguments.len() == count {
            Ok(())
        } else {
            Err(self.options.invalid(
                "action_arguments",
                format!("expected {} arguments, got {}", count, self.arguments.len()),
            ))
        }
    }
}

/// A series repeating one JSON scalar.
pub(crate) fn broadcast_value(value: &Value, len: usize) -> Series {
    let name: PlSmallStr = UDF_OUTPUT_NAME.into();
    match value {
        Value::Bool(b) => Series::new(name, vec![*b; len]),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Series::new(name, vec![i; len]),
            None => Series::new(name, vec![n.as_f64(); len]),
        },
        Value::String(s) => Series::new(name, vec![s.as_str(); len]),
        Value::Null => Series::full_null(name, len, &DataType::Null),
        other => Series::new(name, vec![other.to_string(); len]),
    }
}

fn constant(input: &UdfInput<'_>) -> Result<Series> {
    let value = input
        .options
        .get("value")
        .ok_or_else(|| input.options.missing("value"))?;
    Ok(broadcast_value(value, input.height()))
}

/// Parse the `udf` option of an `add_column` action.
pub fn parse_udf(options: &ActionOptions<'_>) -> Result<Udf> {
    let name = options.required_str("udf")?;
    name.parse::<Udf>()
        .map_err(|reason| CleanerError::invalid_option(options.action(), "udf", reason))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};

    pub(crate) fn run(
        udf: Udf,
        df: &DataFrame,
        arguments: &[&str],
        options: Value,
        column_types: &ColumnTypes,
    ) -> Result<Series> {
        let map: Map<String, Value> = match options {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let arguments: Vec<String> = arguments.iter().map(|s| s.to_string()).collect();
        let input = UdfInput {
            df,
            arguments: &arguments,
            options: ActionOptions::new("add_column", &map),
            column_types,
        };
        udf.apply(&input)
    }

    #[test]
    fn test_udf_names() {
        for udf in Udf::ALL {
            assert_eq!(udf.as_str().parse::<Udf>().unwrap(), udf);
        }
        assert!("nope".parse::<Udf>().is_err());
    }

    #[test]
    fn test_constant() {
        let df = df!("a" => &[1i64, 2, 3]).unwrap();
        let series = run(Udf::Constant, &df, &[], json!({"value": 7}), &ColumnTypes::new()).unwrap();
        assert_eq!(series.name().as_str(), UDF_OUTPUT_NAME);
        let values: Vec<Option<i64>> = series.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(7); 3]);

        let error = run(Udf::Constant, &df, &[], json!({}), &ColumnTypes::new()).unwrap_err();
        assert_eq!(error.to_string(), "Action 'constant' requires option 'value'");
    }

    #[test]
    fn test_parse_udf_option() {
        let map = json!({"udf": "multiply"});
        let map = map.as_object().unwrap();
        let options = ActionOptions::new("add_column", map);
        assert_eq!(parse_udf(&options).unwrap(), Udf::Multiply);

        let empty = Map::new();
        let error = parse_udf(&ActionOptions::new("add_column", &empty)).unwrap_err();
        assert!(matches!(error, CleanerError::MissingOption { .. }));
    }
}
