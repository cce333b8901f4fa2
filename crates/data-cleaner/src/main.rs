//! CLI entry point for the data cleaning engine.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use data_cleaner::{
    ActionDescription, CleanerConfig, CleaningPipeline, ColumnTypes, PythonScriptExecutor,
    compile_query, count_syntax_errors, infer_column_types, lists_to_strings,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Column type detection and data cleaning",
    long_about = "Detects semantic column types, cleans values and applies \
                  declarative transformation actions to CSV data.\n\n\
                  EXAMPLES:\n  \
                  data-cleaner infer -i data.csv --json\n  \
                  data-cleaner clean -i data.csv -o clean.csv\n  \
                  data-cleaner apply -i data.csv --actions actions.json -o out.csv\n  \
                  data-cleaner query -i data.csv \"SELECT name FROM df WHERE age > 30\""
)]
struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Engine configuration as JSON
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected type of every column
    Infer {
        #[arg(short, long)]
        input: PathBuf,

        /// Print a JSON object instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Detect types and clean every column's values
    Clean {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Drop rows that still contain missing values
        #[arg(long)]
        dropna: bool,
    },

    /// Apply a JSON list of action descriptions
    Apply {
        #[arg(short, long)]
        input: PathBuf,

        /// JSON file with an array of action descriptions
        #[arg(short, long)]
        actions: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// JSON object of known column types
        #[arg(long)]
        types: Option<PathBuf>,
    },

    /// Run a `SELECT ... FROM df [WHERE ...]` query
    Query {
        #[arg(short, long)]
        input: PathBuf,

        sql: String,

        /// Write the result here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count cells that do not match their column type's syntax
    SyntaxErrors {
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// Initialize the tracing subscriber. Logs go to stderr so stdout stays
/// clean for JSON and table output.
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match &args.config {
        Some(path) => CleanerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CleanerConfig::default(),
    };

    match args.command {
        Command::Infer { input, json } => run_infer(&input, json, &config),
        Command::Clean {
            input,
            output,
            dropna,
        } => run_clean(&input, &output, dropna, config),
        Command::Apply {
            input,
            actions,
            output,
            types,
        } => run_apply(&input, &actions, &output, types.as_deref(), config),
        Command::Query { input, sql, output } => run_query(&input, &sql, output.as_deref()),
        Command::SyntaxErrors { input } => run_syntax_errors(&input, &config),
    }
}

fn run_infer(input: &Path, json: bool, config: &CleanerConfig) -> Result<()> {
    let df = load_csv_with_fallbacks(input)?;
    let types = infer_column_types(&df, None, config)?;

    if json {
        let ordered: BTreeMap<&String, _> = types.iter().collect();
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    println!("{:<30} {:<28} {:<10}", "Column", "Type", "Missing");
    println!("{}", "-".repeat(70));
    for column in df.get_columns() {
        let name = column.name().as_str();
        let column_type = types
            .get(name)
            .map(|t| t.as_str())
            .unwrap_or("unknown");
        println!(
            "{:<30} {:<28} {:<10}",
            truncate_str(name, 29),
            column_type,
            column.null_count()
        );
    }
    Ok(())
}

fn run_clean(input: &Path, output: &Path, dropna: bool, config: CleanerConfig) -> Result<()> {
    let df = load_csv_with_fallbacks(input)?;
    let config = CleanerConfig {
        clean_values: true,
        ..config
    };
    let result = CleaningPipeline::builder().config(config).build()?.run(df, None)?;

    let mut data = result.data;
    if dropna {
        let before = data.height();
        data = data_cleaner::utils::drop_null_rows(&data, None)?;
        info!("Dropped {} rows with missing values", before - data.height());
    }
    write_csv(data, output)
}

fn run_apply(
    input: &Path,
    actions_path: &Path,
    output: &Path,
    types_path: Option<&Path>,
    config: CleanerConfig,
) -> Result<()> {
    let df = load_csv_with_fallbacks(input)?;
    let actions: Vec<ActionDescription> = read_json(actions_path)?;
    let known: Option<ColumnTypes> = types_path.map(read_json).transpose()?;
    info!("Loaded {} actions from {}", actions.len(), actions_path.display());

    let python = PythonScriptExecutor::from_config(&config);
    let pipeline = CleaningPipeline::builder()
        .config(config)
        .actions(actions)
        .custom_executor(Arc::new(python))
        .on_progress(|update| {
            debug!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()?;

    let result = pipeline.run(df, known.as_ref())?;
    for step in &result.steps {
        info!("{}", step);
    }
    write_csv(result.data, output)
}

fn run_query(input: &Path, sql: &str, output: Option<&Path>) -> Result<()> {
    let df = load_csv_with_fallbacks(input)?;
    let query = compile_query(sql)?;
    debug!("Compiled query: {}", query.expression);
    let result = query.execute(&df)?;
    info!("Query matched {} of {} rows", result.height(), df.height());

    match output {
        Some(path) => write_csv(result, path),
        None => {
            println!("{}", result);
            Ok(())
        }
    }
}

fn run_syntax_errors(input: &Path, config: &CleanerConfig) -> Result<()> {
    let df = load_csv_with_fallbacks(input)?;
    let types = infer_column_types(&df, None, config)?;
    let counts = count_syntax_errors(&df, &types)?;

    if counts.is_empty() {
        println!("No syntax errors found");
        return Ok(());
    }
    for (column, count) in counts {
        let column_type = types.get(&column).map(|t| t.as_str()).unwrap_or("unknown");
        println!("{:<30} {:<22} {}", truncate_str(&column, 29), column_type, count);
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Write a table as CSV, rendering list columns as literal text.
fn write_csv(mut df: DataFrame, path: &Path) -> Result<()> {
    let list_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::List(_)))
        .map(|c| c.name().to_string())
        .collect();
    for name in list_columns {
        let rendered = lists_to_strings(df.column(&name)?.as_materialized_series())?;
        df.with_column(rendered)?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Load a CSV file, retrying without quote handling and then on
/// pre-cleaned content.
fn load_csv_with_fallbacks(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    info!("Loading dataset from: {}", path.display());

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(None))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Loading without quotes failed: {}", e),
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let cleaned = clean_csv_content(&content);
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .into_reader_with_file_handle(std::io::Cursor::new(cleaned))
        .finish()
        .map_err(|e| anyhow!("Could not parse {}: {}", path.display(), e))
}

fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
