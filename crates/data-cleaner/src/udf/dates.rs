//! Date and geo functions: `date_trunc`, `formatted_date`, `distance_between`.

use super::{UDF_OUTPUT_NAME, UdfInput};
use crate::cleaner::parse_datetime;
use crate::error::{CleanerError, Result};
use crate::imputers::numeric_values;
use crate::types::ColumnType;
use crate::utils::{datetime_millis, is_datetime_dtype, millis_to_naive, string_values};
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, Duration};
use polars::prelude::*;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Unit for datetime differences (`time_unit` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl DurationUnit {
    pub(super) fn from_options(input: &UdfInput<'_>) -> Result<Self> {
        let Some(name) = input.options.str("time_unit")? else {
            return Ok(Self::Days);
        };
        match name.to_ascii_lowercase().trim_end_matches('s') {
            "second" => Ok(Self::Seconds),
            "minute" => Ok(Self::Minutes),
            "hour" => Ok(Self::Hours),
            "day" => Ok(Self::Days),
            "week" => Ok(Self::Weeks),
            _ => Err(CleanerError::UnsupportedOption {
                action: input.options.action().to_string(),
                option: "time_unit".to_string(),
                value: name.to_string(),
            }),
        }
    }

    pub(super) fn millis(&self) -> i64 {
        match self {
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
            Self::Weeks => 604_800_000,
        }
    }
}

/// Epoch milliseconds of a temporal column.
///
/// Native temporal dtypes always qualify; string columns only when declared
/// `datetime`, parsed permissively. Anything else gives `None`.
pub(super) fn temporal_millis(
    series: &Series,
    declared: Option<ColumnType>,
) -> Result<Option<Vec<Option<i64>>>> {
    if is_datetime_dtype(series.dtype()) {
        return datetime_millis(series).map(Some);
    }
    if declared != Some(ColumnType::Datetime) {
        return Ok(None);
    }
    Ok(Some(
        string_values(series)?
            .into_iter()
            .map(|v| {
                v.as_deref()
                    .and_then(parse_datetime)
                    .map(|dt| dt.and_utc().timestamp_millis())
            })
            .collect(),
    ))
}

fn datetimes(input: &UdfInput<'_>) -> Result<Vec<Option<chrono::NaiveDateTime>>> {
    let series = input.column(0)?;
    let millis = temporal_millis(&series, Some(ColumnType::Datetime))?.unwrap_or_default();
    Ok(millis
        .into_iter()
        .map(|ms| ms.and_then(millis_to_naive))
        .collect())
}

/// Truncate to the Monday of the ISO week, as `YYYY-MM-DD`.
pub(super) fn date_trunc(input: &UdfInput<'_>) -> Result<Series> {
    let part = input.options.required_str("date_part")?;
    if !part.eq_ignore_ascii_case("week") {
        return Err(CleanerError::UnsupportedOption {
            action: input.options.action().to_string(),
            option: "date_part".to_string(),
            value: part.to_string(),
        });
    }

    let values: Vec<Option<String>> = datetimes(input)?
        .into_iter()
        .map(|dt| {
            dt.map(|dt| {
                let date = dt.date();
                let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                monday.format("%Y-%m-%d").to_string()
            })
        })
        .collect();
    Ok(Series::new(UDF_OUTPUT_NAME.into(), values))
}

/// Parse the column as dates and render them with the `format` pattern.
pub(super) fn formatted_date(input: &UdfInput<'_>) -> Result<Series> {
    let format = input.options.required_str("format")?;
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(input
            .options
            .invalid("format", format!("'{}' is not a valid strftime pattern", format)));
    }

    let values: Vec<Option<String>> = datetimes(input)?
        .into_iter()
        .map(|dt| dt.map(|dt| dt.format_with_items(items.iter()).to_string()))
        .collect();
    Ok(Series::new(UDF_OUTPUT_NAME.into(), values))
}

/// Great-circle distance in kilometers between `(lat1, lng1)` and `(lat2, lng2)`.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Arguments are `lat1, lng1, lat2, lng2` columns.
pub(super) fn distance_between(input: &UdfInput<'_>) -> Result<Series> {
    input.require_arguments(4)?;
    let columns = (0..4)
        .map(|i| input.column(i).and_then(|s| numeric_values(&s)))
        .collect::<Result<Vec<_>>>()?;

    let distances: Vec<Option<f64>> = (0..input.height())
        .map(|row| {
            Some(haversine_km(
                columns[0][row]?,
                columns[1][row]?,
                columns[2][row]?,
                columns[3][row]?,
            ))
        })
        .collect();
    Ok(Series::new(UDF_OUTPUT_NAME.into(), distances))
}

#[cfg(test)]
mod tests {
    use super::super::Udf;
    use super::super::tests::run;
    use super::*;
    use crate::types::ColumnTypes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn strings(series: &Series) -> Vec<Option<String>> {
        string_values(series).unwrap()
    }

    #[test]
    fn test_date_trunc_week() {
        let df = df!("d" => &[Some("2021-01-07"), Some("2021-01-04"), Some("junk"), None]).unwrap();
        let series = run(
            Udf::DateTrunc,
            &df,
            &["d"],
            json!({"date_part": "week"}),
            &ColumnTypes::new(),
        )
        .unwrap();
        assert_eq!(
            strings(&series),
            vec![
                Some("2021-01-04".to_string()),
                Some("2021-01-04".to_string()),
                None,
                None
            ]
        );
    }

    #[test]
    fn test_date_trunc_other_parts_unsupported() {
        let df = df!("d" => &["2021-01-07"]).unwrap();
        let error = run(
            Udf::DateTrunc,
            &df,
            &["d"],
            json!({"date_part": "month"}),
            &ColumnTypes::new(),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            CleanerError::UnsupportedOption { ref value, .. } if value == "month"
        ));
    }

    #[test]
    fn test_formatted_date() {
        let df = df!("d" => &["Jan 5, 2021", "2021-12-31 08:30"]).unwrap();
        let series = run(
            Udf::FormattedDate,
            &df,
            &["d"],
            json!({"format": "%d/%m/%Y"}),
            &ColumnTypes::new(),
        )
        .unwrap();
        assert_eq!(
            strings(&series),
            vec![Some("05/01/2021".to_string()), Some("31/12/2021".to_string())]
        );

        let error = run(
            Udf::FormattedDate,
            &df,
            &["d"],
            json!({"format": "%Q"}),
            &ColumnTypes::new(),
        )
        .unwrap_err();
        assert!(matches!(error, CleanerError::InvalidOption { .. }));
    }

    #[test]
    fn test_distance_between() {
        let df = df!(
            "lat1" => &[51.5007f64, 0.0],
            "lng1" => &[-0.1246f64, 0.0],
            "lat2" => &[40.6892f64, 0.0],
            "lng2" => &[-74.0445f64, 0.0],
        )
        .unwrap();
        let series = run(
            Udf::DistanceBetween,
            &df,
            &["lat1", "lng1", "lat2", "lng2"],
            json!({}),
            &ColumnTypes::new(),
        )
        .unwrap();
        let values: Vec<f64> = series.f64().unwrap().into_no_null_iter().collect();
        assert!((values[0] - 5574.8).abs() < 1.0, "got {}", values[0]);
        assert_eq!(values[1], 0.0);

        let error = run(Udf::DistanceBetween, &df, &["lat1"], json!({}), &ColumnTypes::new())
            .unwrap_err();
        assert!(matches!(error, CleanerError::InvalidOption { .. }));
    }

    #[test]
    fn test_unknown_time_unit() {
        let df = df!("d" => &["2021-01-07"]).unwrap();
        let types = ColumnTypes::from([("d".to_string(), ColumnType::Datetime)]);
        let error = run(
            Udf::Difference,
            &df,
            &["d", "d"],
            json!({"time_unit": "fortnights"}),
            &types,
        )
        .unwrap_err();
        assert!(matches!(error, CleanerError::UnsupportedOption { .. }));
    }
}
