//! Integration tests for the data cleaning engine.
//!
//! These tests run detection, cleaning, actions and queries end to end on
//! the CSV fixtures.

use data_cleaner::{
    ActionDescription, ActionExecutor, ActionType, CancellationToken, CleanerConfig,
    CleanerError, CleaningPipeline, ColumnType, ColumnTypes, TransformerChain, clean_dataframe,
    clean_series, compile_query, count_syntax_errors, infer_column_types, lists_to_strings,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn load_actions(filename: &str) -> Vec<ActionDescription> {
    let content = std::fs::read_to_string(fixtures_path().join(filename))
        .expect("Failed to read actions file");
    serde_json::from_str(&content).expect("Invalid actions JSON")
}

fn customer_types() -> ColumnTypes {
    infer_column_types(&load_csv("customers.csv"), None, &CleanerConfig::default()).unwrap()
}

// ============================================================================
// Detection and Cleaning
// ============================================================================

#[test]
fn test_infer_customer_types() {
    let types = customer_types();
    let expected = ColumnTypes::from([
        ("name".to_string(), ColumnType::Text),
        ("email".to_string(), ColumnType::Email),
        ("phone".to_string(), ColumnType::PhoneNumber),
        ("zip_code".to_string(), ColumnType::ZipCode),
        ("signup_date".to_string(), ColumnType::Datetime),
        ("spend".to_string(), ColumnType::NumberWithDecimals),
        ("tags".to_string(), ColumnType::List),
        ("active".to_string(), ColumnType::TrueOrFalse),
    ]);
    assert_eq!(types, expected);
}

#[test]
fn test_parallel_inference_matches_sequential() {
    let df = load_csv("customers.csv");
    let config = CleanerConfig::builder()
        .parallel_row_threshold(0)
        .build()
        .unwrap();
    assert_eq!(
        infer_column_types(&df, None, &config).unwrap(),
        customer_types()
    );
}

#[test]
fn test_clean_customers() {
    let df = load_csv("customers.csv");
    let cleaned = clean_dataframe(&df, &customer_types(), false).unwrap();

    let spend: Vec<Option<f64>> = cleaned.column("spend").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(
        spend,
        vec![Some(1200.5), Some(35.0), Some(410.25), Some(0.99), None, Some(88.1)]
    );
    assert!(matches!(
        cleaned.column("signup_date").unwrap().dtype(),
        DataType::Datetime(_, _)
    ));
    assert_eq!(cleaned.column("signup_date").unwrap().null_count(), 1);
    assert!(matches!(cleaned.column("tags").unwrap().dtype(), DataType::List(_)));
    assert_eq!(
        cleaned.column("zip_code").unwrap().str().unwrap().get(5),
        Some("2139")
    );

    let tags = lists_to_strings(cleaned.column("tags").unwrap().as_materialized_series()).unwrap();
    assert_eq!(tags.str().unwrap().get(0), Some("['vip', 'early']"));
    assert_eq!(tags.str().unwrap().get(2), Some("[]"));
}

#[test]
fn test_cleaning_is_idempotent_on_fixture() {
    let df = load_csv("customers.csv");
    let types = customer_types();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let column_type = types[column.name().as_str()];
        let once = clean_series(series, column_type, false).unwrap();
        let twice = clean_series(&once, column_type, false).unwrap();
        assert!(once.equals_missing(&twice), "column {}", column.name());
    }
}

#[test]
fn test_syntax_errors_in_fixture() {
    let df = load_csv("customers.csv");
    let counts = count_syntax_errors(&df, &customer_types()).unwrap();
    assert_eq!(counts, vec![("email".to_string(), 1)]);
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_pipeline_with_actions_file() {
    let result = CleaningPipeline::builder()
        .actions(load_actions("actions.json"))
        .build()
        .unwrap()
        .run(load_csv("customers.csv"), None)
        .unwrap();
    let data = &result.data;

    let spend = data.column("spend").unwrap().f64().unwrap();
    assert_eq!(spend.get(4), Some(88.1));
    assert_eq!(spend.null_count(), 0);

    let email = data.column("email").unwrap().str().unwrap();
    assert_eq!(email.get(2), Some("invalid_email"));

    let weeks: Vec<Option<&str>> = data.column("signup_week").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(
        weeks,
        vec![
            Some("2021-01-04"),
            Some("2021-02-08"),
            Some("2021-03-01"),
            None,
            Some("2021-05-17"),
            Some("2021-06-28"),
        ]
    );

    assert_eq!(result.column_types["signup_week"], ColumnType::Category);
    assert_eq!(result.column_types.len(), data.width());
    assert_eq!(result.steps.len(), 6);
}

#[test]
fn test_grouped_aggregation_on_sales() {
    let action = ActionDescription::new(ActionType::Average)
        .with_arguments(["amount"])
        .with_option("groupby_columns", serde_json::json!(["store"]))
        .with_output("avg_amount", ColumnType::NumberWithDecimals);
    let result = ActionExecutor::default()
        .apply(load_csv("sales.csv"), &action, &ColumnTypes::new())
        .unwrap();
    let averages: Vec<Option<f64>> = result.column("avg_amount").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(
        averages,
        vec![Some(15.0), Some(15.0), Some(6.0), Some(6.0), Some(100.0)]
    );
}

#[test]
fn test_custom_transformers_in_pipeline() {
    let chain = TransformerChain::new()
        .register("drop_east", |df: DataFrame| {
            let mask = df.column("store")?.str()?.not_equal("east");
            Ok(df.filter(&mask)?)
        })
        .register("double", |mut df: DataFrame| {
            let doubled = df.column("amount")?.as_materialized_series() * 2;
            df.with_column(doubled)?;
            Ok(df)
        });
    let result = CleaningPipeline::builder()
        .actions(vec![ActionDescription::new(ActionType::Custom)])
        .custom_executor(Arc::new(chain))
        .build()
        .unwrap()
        .run(load_csv("sales.csv"), None)
        .unwrap();
    let amounts: Vec<Option<i64>> = result.data.column("amount").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(amounts, vec![Some(20), Some(40), Some(10), Some(14)]);
}

#[test]
fn test_cancelled_pipeline() {
    let token = CancellationToken::new();
    token.cancel();
    let err = CleaningPipeline::builder()
        .cancellation_token(token)
        .build()
        .unwrap()
        .run(load_csv("sales.csv"), None)
        .unwrap_err();
    assert!(matches!(err, CleanerError::Cancelled));
}

#[test]
fn test_error_payload() {
    let action = ActionDescription::new(ActionType::AddColumn)
        .with_arguments(["amount"])
        .with_option("udf", "string_replace")
        .with_output("out", ColumnType::Text);
    let err = ActionExecutor::default()
        .apply(load_csv("sales.csv"), &action, &ColumnTypes::new())
        .unwrap_err();
    assert!(err.is_configuration_error());

    let payload = serde_json::to_value(&err).unwrap();
    assert_eq!(payload["code"], "MISSING_OPTION");
    assert!(payload["message"].as_str().unwrap().contains("pattern"));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_query_on_sales() {
    let query = compile_query(
        "SELECT store, amount FROM df WHERE amount BETWEEN 6 AND 50 AND store != 'east'",
    )
    .unwrap();
    let result = query.execute(&load_csv("sales.csv")).unwrap();

    assert_eq!(result.get_column_names(), vec!["store", "amount"]);
    let amounts: Vec<Option<i64>> = result.column("amount").unwrap().i64().unwrap().into_iter().collect();
    assert_eq!(amounts, vec![Some(10), Some(20), Some(7)]);
}

#[test]
fn test_query_like_on_names() {
    let query = compile_query("SELECT * FROM df WHERE name LIKE '%s'").unwrap();
    let result = query.execute(&load_csv("customers.csv")).unwrap();
    let names: Vec<Option<&str>> = result.column("name").unwrap().str().unwrap().into_iter().collect();
    assert_eq!(names, vec![Some("Tom Jones")]);
}

#[test]
fn test_query_syntax_error() {
    let err = compile_query("SELECT FROM df").unwrap_err();
    assert_eq!(err.error_code(), "QUERY_SYNTAX");
}
