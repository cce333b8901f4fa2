//! Pattern library: compiled regexes, placeholder sets and thresholds.
//!
//! These patterns are the contract between the type detector, the syntax
//! error finder and the value cleaner. They are compiled once on first use.

use crate::types::ColumnType;
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// Regexes
// =============================================================================

/// Signed amount with optional currency prefix/suffix, grouping, decimals and `%`.
pub static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*-?\s*(?:[$€¥₹£]|Rs|CAD)?\s*(?:(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d*)?|\.\d+)\s*(?:[元€$]|CAD)?\s*%?\s*$",
    )
    .expect("Invalid regex: number")
});

/// Same as [`NUMBER`] without a fractional part.
pub static INTEGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*-?\s*(?:[$€¥₹£]|Rs|CAD)?\s*(?:\d{1,3}(?:,\d{3})+|\d+)\s*(?:[元€$]|CAD)?\s*%?\s*$",
    )
    .expect("Invalid regex: integer")
});

pub static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+#-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$").expect("Invalid regex: email")
});

pub static PHONE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\+?\d{1,3})?[-. (]*\d{3}[-. )]*\d{3}[-. ]*\d{4}(?:\s*x\d+)?\s*$")
        .expect("Invalid regex: phone number")
});

pub static ZIP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3,5}(?:-\d{4})?$").expect("Invalid regex: zip code"));

/// ISO, `D/M/Y`, `D-M-Y`, `Y/M/D` and `Month DD, YYYY` date or datetime strings.
pub static DATETIME: Lazy<Regex> = Lazy::new(|| {
    let time = r"(?:[T ]\d{1,2}:\d{2}(?::\d{2}(?:\.\d{1,6})?)?)?Z?";
    let month = r"(?i:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
    let pattern = format!(
        r"^\s*(?:\d{{4}}-\d{{1,2}}-\d{{1,2}}{time}|\d{{1,2}}[/-]\d{{1,2}}[/-]\d{{2,4}}{time}|\d{{4}}/\d{{1,2}}/\d{{1,2}}{time}|{month}\.?\s+\d{{1,2}}(?i:st|nd|rd|th)?,?\s+\d{{4}})\s*$"
    );
    Regex::new(&pattern).expect("Invalid regex: datetime")
});

/// Currency markers removed before numeric parsing.
pub static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€¥₹£元]|Rs|CAD").expect("Invalid regex: currency"));

/// Cells that count as missing before imputation.
pub static EMPTY_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*$").expect("Invalid regex: empty string"));

/// Float artifacts on phone numbers, e.g. `5551234567.0`.
pub static TRAILING_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\d*$").expect("Invalid regex: trailing fraction"));

// =============================================================================
// Column Name Heuristics
// =============================================================================

pub const PHONE_NUMBER_WORDS: [&str; 1] = ["phone"];

pub const ZIP_CODE_WORDS: [&str; 4] = ["zip", "postal", "zipcode", "postcode"];

/// Whether a column name contains one of the given words, case-insensitively.
pub fn name_contains_any(column_name: &str, words: &[&str]) -> bool {
    let lower = column_name.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

// =============================================================================
// Thresholds
// =============================================================================

/// Share of values that must look like phone/zip numbers in a numeric column.
pub const NUMBER_TYPE_MATCH_THRESHOLD: f64 = 0.8;

/// Share of values that must look like datetimes.
pub const DATETIME_MATCH_THRESHOLD: f64 = 0.5;

/// Share of values that must look like emails, phones or zips.
pub const STRING_TYPE_MATCH_THRESHOLD: f64 = 0.3;

/// Distinct-to-total ratio at which strings are free text.
pub const TEXT_UNIQUE_RATIO_THRESHOLD: f64 = 0.8;

/// Word count above which a cell is free text.
pub const MAX_CATEGORY_WORD_COUNT: usize = 40;

/// Integer range that phone numbers stored as numbers fall into.
pub const PHONE_NUMBER_RANGE: (f64, f64) = (1e9, 1e12);

/// Integer range that zip codes stored as numbers fall into.
pub const ZIP_CODE_RANGE: (i64, i64) = (100, 99_999);

// =============================================================================
// Placeholders
// =============================================================================

/// Tokens every type treats as a null.
pub const NULL_TOKENS: [&str; 12] = [
    "", "None", "none", "NULL", "null", "nan", "NaN", "NA", "N/A", "n/a", "<NA>", "NaT",
];

/// Earliest timestamp used as the constant fill for datetimes (milliseconds).
pub const MIN_TIMESTAMP_MS: i64 = i64::MIN / 1_000_000;

/// Value written over a cell that fails its type's syntax check.
pub fn invalid_placeholder(column_type: ColumnType) -> Option<&'static str> {
    match column_type {
        ColumnType::Number | ColumnType::NumberWithDecimals => Some("invalid_number"),
        ColumnType::Datetime => Some("invalid_datetime"),
        ColumnType::Email => Some("invalid_email"),
        ColumnType::PhoneNumber => Some("invalid_phone_number"),
        ColumnType::ZipCode => Some("invalid_zip_code"),
        _ => None,
    }
}

/// Constant used by `impute` with the `constant` strategy on string data.
pub fn constant_fill_string(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::PhoneNumber | ColumnType::ZipCode => "0",
        ColumnType::Number | ColumnType::NumberWithDecimals => "0",
        _ => "missing",
    }
}

/// Whether a string is a null placeholder for the given type.
pub fn is_null_placeholder(value: &str, column_type: ColumnType) -> bool {
    NULL_TOKENS.contains(&value) || value == constant_fill_string(column_type)
}

/// Canonical syntax for a type, if it has one.
pub fn syntax_pattern(column_type: ColumnType) -> Option<&'static Regex> {
    match column_type {
        ColumnType::Number => Some(&INTEGER),
        ColumnType::NumberWithDecimals => Some(&NUMBER),
        ColumnType::Datetime => Some(&DATETIME),
        ColumnType::Email => Some(&EMAIL),
        ColumnType::PhoneNumber => Some(&PHONE_NUMBER),
        ColumnType::ZipCode => Some(&ZIP_CODE),
        _ => None,
    }
}

/// Strip surrounding quote and whitespace characters.
pub fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
}

/// Whether a string is shaped like a list or tuple literal.
pub fn is_list_shaped(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() >= 2
        && (trimmed.starts_with('[') || trimmed.starts_with('('))
        && (trimmed.ends_with(']') || trimmed.ends_with(')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_pattern() {
        for value in [
            "- Rs   345.23423523",
            "1,000",
            "$1,234.50",
            "12%",
            "-3.5",
            ".5",
            "100 CAD",
            "€ 20",
            "20元",
        ] {
            assert!(NUMBER.is_match(value), "expected number: {value}");
        }
        for value in ["1-111-111-111", "abc", "12a", "1,00", "", "-"] {
            assert!(!NUMBER.is_match(value), "expected non-number: {value}");
        }
    }

    #[test]
    fn test_integer_pattern_rejects_decimals() {
        assert!(INTEGER.is_match("1,234"));
        assert!(INTEGER.is_match("$ 12"));
        assert!(!INTEGER.is_match("12.5"));
    }

    #[test]
    fn test_email_pattern() {
        assert!(EMAIL.is_match("abc@xyz.com"));
        assert!(EMAIL.is_match("first.last+tag@mail-host.co.uk"));
        assert!(!EMAIL.is_match("test"));
        assert!(!EMAIL.is_match("abc12345@"));
    }

    #[test]
    fn test_phone_pattern() {
        assert!(PHONE_NUMBER.is_match("555-123-4567"));
        assert!(PHONE_NUMBER.is_match("(555) 123-4567"));
        assert!(PHONE_NUMBER.is_match("+1 555.123.4567 x12"));
        assert!(PHONE_NUMBER.is_match("5551234567"));
        assert!(!PHONE_NUMBER.is_match("1-111-111-111"));
        assert!(!PHONE_NUMBER.is_match("12345"));
    }

    #[test]
    fn test_zip_pattern() {
        assert!(ZIP_CODE.is_match("323"));
        assert!(ZIP_CODE.is_match("94107-1234"));
        assert!(!ZIP_CODE.is_match("12"));
        assert!(!ZIP_CODE.is_match("123456"));
    }

    #[test]
    fn test_datetime_pattern() {
        for value in [
            "2021-01-05",
            "2021-01-05T10:20:30.123Z",
            "2021-1-5 10:20",
            "5/1/2021",
            "05-01-21",
            "2021/01/05",
            "Jan 5, 2021",
            "September 21st, 2019",
        ] {
            assert!(DATETIME.is_match(value), "expected datetime: {value}");
        }
        for value in ["555-123-4567", "12345", "hello", "2021"] {
            assert!(!DATETIME.is_match(value), "expected non-datetime: {value}");
        }
    }

    #[test]
    fn test_name_contains_any() {
        assert!(name_contains_any("Home_Phone", &PHONE_NUMBER_WORDS));
        assert!(name_contains_any("postal_area", &ZIP_CODE_WORDS));
        assert!(!name_contains_any("bad_column_name_two", &ZIP_CODE_WORDS));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("  \"hello\" "), "hello");
        assert_eq!(strip_quotes("'a b'"), "a b");
    }
}
