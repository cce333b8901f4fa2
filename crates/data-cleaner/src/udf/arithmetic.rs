//! `addition`, `multiply` and `difference`.

use super::dates::{DurationUnit, temporal_millis};
use super::{UDF_OUTPUT_NAME, UdfInput};
use crate::error::Result;
use crate::imputers::numeric_values;
use crate::utils::{column_series, millis_to_series};
use polars::prelude::*;

pub(super) fn addition(input: &UdfInput<'_>) -> Result<Series> {
    let offset = input.options.f64("value")?.unwrap_or(0.0);
    fold(input, offset, |a, b| a + b)
}

pub(super) fn multiply(input: &UdfInput<'_>) -> Result<Series> {
    let factor = input.options.f64("value")?.unwrap_or(1.0);
    fold(input, factor, |a, b| a * b)
}

fn fold(input: &UdfInput<'_>, init: f64, op: fn(f64, f64) -> f64) -> Result<Series> {
    let mut acc = vec![Some(init); input.height()];
    for name in input.arguments {
        let values = numeric_values(&column_series(input.df, name)?)?;
        for (slot, value) in acc.iter_mut().zip(values) {
            *slot = match (*slot, value) {
                (Some(a), Some(b)) => Some(op(a, b)),
                _ => None,
            };
        }
    }
    Ok(Series::new(UDF_OUTPUT_NAME.into(), acc))
}

/// Right-hand side of a difference.
enum Subtrahend {
    Column(Series),
    Value(f64),
}

/// `arguments[0] - arguments[1]`, or `arguments[0] - value`.
///
/// For datetime minuends, a datetime subtrahend yields the whole number of
/// `time_unit`s between them; a numeric one is subtracted as that many
/// `time_unit`s.
pub(super) fn difference(input: &UdfInput<'_>) -> Result<Series> {
    let minuend = input.column(0)?;
    let subtrahend = if input.arguments.len() > 1 {
        Subtrahend::Column(input.column(1)?)
    } else {
        let value = input
            .options
            .f64("value")?
            .ok_or_else(|| input.options.missing("value"))?;
        Subtrahend::Value(value)
    };

    let Some(left) = temporal_millis(&minuend, input.column_type(input.argument(0)?))? else {
        let left = numeric_values(&minuend)?;
        let right = match &subtrahend {
            Subtrahend::Column(series) => numeric_values(series)?,
            Subtrahend::Value(v) => vec![Some(*v); left.len()],
        };
        let values: Vec<Option<f64>> = left
            .iter()
            .zip(&right)
            .map(|(a, b)| Some((*a)? - (*b)?))
            .collect();
        return Ok(Series::new(UDF_OUTPUT_NAME.into(), values));
    };

    let unit = DurationUnit::from_options(input)?;
    let right_millis = match &subtrahend {
        Subtrahend::Column(series) => {
            let declared = input.arguments.get(1).and_then(|n| input.column_type(n));
            temporal_millis(series, declared)?
        }
        Subtrahend::Value(_) => None,
    };

    if let Some(right) = right_millis {
        let counts: Vec<Option<i64>> = left
            .iter()
            .zip(&right)
            .map(|(a, b)| Some(((*a)? - (*b)?).div_euclid(unit.millis())))
            .collect();
        return Ok(Series::new(UDF_OUTPUT_NAME.into(), counts));
    }

    let offsets: Vec<Option<f64>> = match subtrahend {
        Subtrahend::Column(series) => numeric_values(&series)?,
        Subtrahend::Value(v) => vec![Some(v); left.len()],
    };
    let shifted: Vec<Option<i64>> = left
        .iter()
        .zip(&offsets)
        .map(|(a, b)| Some((*a)? - ((*b)? * unit.millis() as f64).round() as i64))
        .collect();
    millis_to_series(UDF_OUTPUT_NAME.into(), shifted)
}

#[cfg(test)]
mod tests {
    use super::super::Udf;
    use super::super::tests::run;
    use crate::types::{ColumnType, ColumnTypes};
    use crate::utils::datetime_millis;
    use pretty_assertions::assert_eq;
    use polars::prelude::*;
    use serde_json::json;

    fn numbers() -> DataFrame {
        df!(
            "a" => &[Some(1i64), Some(2), None],
            "b" => &[Some(10.0f64), Some(20.0), Some(30.0)],
        )
        .unwrap()
    }

    fn floats(series: &Series) -> Vec<Option<f64>> {
        series.f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_addition_and_multiply() {
        let df = numbers();
        let types = ColumnTypes::new();
        let sum = run(Udf::Addition, &df, &["a", "b"], json!({"value": 1}), &types).unwrap();
        assert_eq!(floats(&sum), vec![Some(12.0), Some(23.0), None]);

        let product = run(Udf::Multiply, &df, &["a", "b"], json!({}), &types).unwrap();
        assert_eq!(floats(&product), vec![Some(10.0), Some(40.0), None]);
    }

    #[test]
    fn test_numeric_difference() {
        let df = numbers();
        let types = ColumnTypes::new();
        let columns = run(Udf::Difference, &df, &["b", "a"], json!({}), &types).unwrap();
        assert_eq!(floats(&columns), vec![Some(9.0), Some(18.0), None]);

        let constant = run(Udf::Difference, &df, &["b"], json!({"value": 5}), &types).unwrap();
        assert_eq!(floats(&constant), vec![Some(5.0), Some(15.0), Some(25.0)]);

        let error = run(Udf::Difference, &df, &["b"], json!({}), &types).unwrap_err();
        assert_eq!(error.to_string(), "Action 'difference' requires option 'value'");
    }

    #[test]
    fn test_datetime_difference_in_days() {
        let df = df!(
            "end" => &["2021-01-10", "2021-01-01"],
            "start" => &["2021-01-01", "2021-01-03 12:00"],
        )
        .unwrap();
        let types = ColumnTypes::from([
            ("end".to_string(), ColumnType::Datetime),
            ("start".to_string(), ColumnType::Datetime),
        ]);
        let days = run(Udf::Difference, &df, &["end", "start"], json!({}), &types).unwrap();
        let values: Vec<Option<i64>> = days.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(9), Some(-3)]);

        let hours = run(
            Udf::Difference,
            &df,
            &["end", "start"],
            json!({"time_unit": "hours"}),
            &types,
        )
        .unwrap();
        assert_eq!(hours.i64().unwrap().get(0), Some(216));
    }

    #[test]
    fn test_datetime_minus_timedelta() {
        let df = df!("end" => &["2021-01-10"]).unwrap();
        let types = ColumnTypes::from([("end".to_string(), ColumnType::Datetime)]);
        let shifted = run(Udf::Difference, &df, &["end"], json!({"value": 2}), &types).unwrap();
        assert_eq!(
            datetime_millis(&shifted).unwrap(),
            vec![Some(1_610_236_800_000 - 2 * 86_400_000)]
        );
    }
}
