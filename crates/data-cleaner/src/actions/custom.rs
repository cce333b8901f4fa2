//! User-supplied transformation code for the `custom` action.
//!
//! Custom code sits outside the engine's safety boundary: nothing here
//! sandboxes it. Two executors are provided:
//! - [`TransformerChain`]: named Rust closures, chained in registration order
//! - [`PythonScriptExecutor`]: a pandas script run in a Python subprocess
//!
//! Both serialize their invocations.

use crate::config::CleanerConfig;
use crate::error::{CleanerError, Result};
use parking_lot::Mutex;
use polars::prelude::*;
use std::io::Cursor;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Environment variable overriding the Python interpreter.
pub const PYTHON_ENV: &str = "DATA_CLEANER_PYTHON";

/// Environment variable overriding the script timeout, in seconds.
pub const TIMEOUT_ENV: &str = "DATA_CLEANER_CUSTOM_TIMEOUT_SECS";

/// Runs `custom` action code against a table.
pub trait CustomActionExecutor: Send + Sync {
    fn execute(&self, df: DataFrame, code: &str) -> Result<DataFrame>;
}

/// A registered transformation step.
pub type Transformer = Arc<dyn Fn(DataFrame) -> Result<DataFrame> + Send + Sync>;

/// Named Rust transformers applied as a chain.
///
/// The action code lists transformer names (comma or newline separated) to
/// run in that order. Blank code runs every transformer in registration
/// order.
#[derive(Default)]
pub struct TransformerChain {
    transformers: Vec<(String, Transformer)>,
    lock: Mutex<()>,
}

impl TransformerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformer under `name`.
    pub fn register<F>(mut self, name: impl Into<String>, transformer: F) -> Self
    where
        F: Fn(DataFrame) -> Result<DataFrame> + Send + Sync + 'static,
    {
        self.transformers.push((name.into(), Arc::new(transformer)));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.transformers.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    fn resolve(&self, code: &str) -> Result<Vec<&(String, Transformer)>> {
        let requested: Vec<&str> = code
            .split([',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if requested.is_empty() {
            return Ok(self.transformers.iter().collect());
        }
        requested
            .into_iter()
            .map(|name| {
                self.transformers
                    .iter()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| {
                        CleanerError::CustomActionFailed(format!("unknown transformer '{}'", name))
                    })
            })
            .collect()
    }
}

impl CustomActionExecutor for TransformerChain {
    fn execute(&self, df: DataFrame, code: &str) -> Result<DataFrame> {
        let _guard = self.lock.lock();
        let mut df = df;
        for (name, transformer) in self.resolve(code)? {
            debug!("Running transformer '{}'", name);
            df = transformer(df).map_err(|e| e.with_context(format!("transformer '{}'", name)))?;
        }
        Ok(df)
    }
}

// Reads CSV on stdin, binds `df`, runs the script from the environment and
// writes the result as CSV. Decorated functions run as a chain.
const PYTHON_HARNESS: &str = r#"
import io, os, sys
import pandas as pd

_transformers = []

def transformer_action(fn):
    _transformers.append(fn)
    return fn

df = pd.read_csv(io.StringIO(sys.stdin.read()))
_scope = {"df": df, "pd": pd, "transformer_action": transformer_action}
exec(os.environ["DATA_CLEANER_SCRIPT"], _scope)
df = _scope["df"]
for _fn in _transformers:
    df = _fn(df)
df.to_csv(sys.stdout, index=False)
"#;

/// Runs pandas scripts in a Python subprocess, one at a time.
pub struct PythonScriptExecutor {
    python: String,
    timeout: Duration,
    lock: Mutex<()>,
}

impl PythonScriptExecutor {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
            lock: Mutex::new(()),
        }
    }

    /// Interpreter and timeout from `config`, overridable by environment.
    pub fn from_config(config: &CleanerConfig) -> Self {
        let python = std::env::var(PYTHON_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| config.python_executable.clone());
        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(config.custom_action_timeout_secs);
        Self::new(python, Duration::from_secs(timeout))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn run(&self, input: Vec<u8>, code: &str) -> Result<Vec<u8>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_async(input, code))
    }

    async fn run_async(&self, input: Vec<u8>, code: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(PYTHON_HARNESS)
            .env("DATA_CLEANER_SCRIPT", code)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CleanerError::CustomActionFailed(format!("failed to spawn {}: {}", self.python, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CleanerError::Internal("failed to open stdin".to_string()))?;
        let write = async move {
            if let Err(e) = stdin.write_all(&input).await {
                debug!("Script closed stdin early: {}", e);
            }
        };

        // Dropping the child on timeout kills it.
        let output = match timeout(self.timeout, async {
            let ((), output) = tokio::join!(write, child.wait_with_output());
            output
        })
        .await
        {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    "Custom script timed out after {} seconds",
                    self.timeout.as_secs()
                );
                return Err(CleanerError::CustomActionFailed(format!(
                    "script timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            return Err(CleanerError::CustomActionFailed(format!(
                "script exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl CustomActionExecutor for PythonScriptExecutor {
    fn execute(&self, df: DataFrame, code: &str) -> Result<DataFrame> {
        let _guard = self.lock.lock();
        info!("Running custom script with {}", self.python);

        let mut df = df;
        let mut input = Vec::new();
        CsvWriter::new(&mut input).finish(&mut df)?;

        let output = self.run(input, code)?;
        let result = CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(output))
            .finish()?;
        debug!("Custom script returned {} rows", result.height());
        Ok(result)
    }
}

static_assertions::assert_impl_all!(TransformerChain: Send, Sync);
static_assertions::assert_impl_all!(PythonScriptExecutor: Send, Sync);
