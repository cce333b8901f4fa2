//! Scalar converters used by the value cleaner.
//!
//! Numbers and dates arrive as dirty strings; these functions turn them into
//! typed values or `None`, never an error.

use crate::patterns::CURRENCY;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d)(st|nd|rd|th)\b").expect("Invalid regex: ordinal suffix"));

static MONTH_ABBREVIATION_DOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|jun|jul|aug|sep|sept|oct|nov|dec)\.")
        .expect("Invalid regex: month abbreviation")
});

const DATETIME_FORMATS: [&str; 14] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
    "%B %d %Y %H:%M:%S",
];

const YEAR_FIRST_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

// `%y` rejects trailing digits but `%Y` reads `21` as year 21, so two-digit
// years go first. Month-first wins over day-first.
const DATE_FORMATS: [&str; 15] = [
    "%m/%d/%y",
    "%d/%m/%y",
    "%m-%d-%y",
    "%d-%m-%y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Strip currency markers, grouping commas, percent signs and whitespace.
pub(crate) fn clean_numeric_string(value: &str) -> String {
    CURRENCY
        .replace_all(value, "")
        .chars()
        .filter(|c| *c != ',' && *c != '%' && !c.is_whitespace())
        .collect()
}

/// Parse a dirty numeric string. Percent signs are stripped, not applied.
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(value);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whether a value fits `i64` exactly.
pub(crate) fn as_exact_i64(value: f64) -> Option<i64> {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Parse a date or datetime string permissively.
pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    let normalized = ORDINAL_SUFFIX.replace_all(trimmed, "$1");
    let normalized = MONTH_ABBREVIATION_DOT.replace_all(&normalized, "$1");
    let normalized = normalized.trim_end_matches('Z').replace(',', ", ");
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = normalized.replace(" ,", ",");

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(dt);
        }
    }

    let year_first = match (normalized.get(..4), normalized.get(4..)) {
        (Some(head), Some(rest)) => {
            head.chars().all(|c| c.is_ascii_digit())
                && rest.starts_with(|c: char| !c.is_ascii_digit())
        }
        _ => false,
    };
    let formats: &[&str] = if year_first {
        &YEAR_FIRST_DATE_FORMATS
    } else {
        &DATE_FORMATS
    };
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    None
}

/// Interpret an epoch number as milliseconds, guessing seconds or millis by magnitude.
pub(crate) fn epoch_to_millis(value: f64) -> Option<i64> {
    let abs = value.abs();
    if !value.is_finite() {
        None
    } else if abs < 1e11 {
        Some((value * 1000.0).round() as i64)
    } else if abs < 1e14 {
        Some(value.round() as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
        assert_eq!(clean_numeric_string("- Rs   345.2"), "-345.2");
        assert_eq!(clean_numeric_string("12 %"), "12");
        assert_eq!(clean_numeric_string("100 CAD"), "100");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("€ 1,000"), Some(1000.0));
        assert_eq!(parse_number("-3.5"), Some(-3.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let iso = parse_datetime("2021-03-04T05:06:07.5Z").unwrap();
        assert_eq!((iso.year(), iso.month(), iso.day()), (2021, 3, 4));
        assert_eq!(iso.hour(), 5);

        let us = parse_datetime("3/4/2021").unwrap();
        assert_eq!((us.month(), us.day()), (3, 4));

        let day_first = parse_datetime("25/12/2020").unwrap();
        assert_eq!((day_first.month(), day_first.day()), (12, 25));

        let textual = parse_datetime("September 21st, 2019").unwrap();
        assert_eq!((textual.year(), textual.month(), textual.day()), (2019, 9, 21));

        let abbreviated = parse_datetime("Jan. 5 2020").unwrap();
        assert_eq!((abbreviated.month(), abbreviated.day()), (1, 5));
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("13/13/2020").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn test_epoch_to_millis() {
        assert_eq!(epoch_to_millis(1_600_000_000.0), Some(1_600_000_000_000));
        assert_eq!(epoch_to_millis(1_600_000_000_000.0), Some(1_600_000_000_000));
        assert_eq!(epoch_to_millis(1e18), None);
    }
}
