//! Multivariate outlier detection.
//!
//! [`OutlierRemover`] scores each row of a numeric matrix and marks the
//! highest-scoring rows as outliers:
//! - Local outlier factor for low-dimensional data
//! - Isolation forest for wider data
//!
//! At most `max(1, floor(contamination * n))` rows are marked, and only
//! rows whose score exceeds the method's threshold.

mod isolation_forest;
mod lof;

use crate::config::CleanerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// LOF score above which a row may be an outlier.
pub const LOF_THRESHOLD: f64 = 1.5;

/// Isolation forest anomaly score above which a row may be an outlier.
pub const ISOLATION_THRESHOLD: f64 = 0.5;

/// Widest matrix for which `auto` picks local outlier factor.
pub const AUTO_LOF_MAX_COLUMNS: usize = 5;

/// Outlier scoring method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Lof,
    #[serde(rename = "itree", alias = "isolation_forest")]
    IsolationForest,
    #[default]
    Auto,
}

impl FromStr for OutlierMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lof" => Ok(Self::Lof),
            "itree" | "isolation_forest" => Ok(Self::IsolationForest),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown outlier method '{}'", other)),
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lof => "lof",
            Self::IsolationForest => "itree",
            Self::Auto => "auto",
        })
    }
}

/// Row-level outlier detector.
#[derive(Debug, Clone)]
pub struct OutlierRemover {
    pub method: OutlierMethod,
    pub n_neighbors: usize,
    pub trees: usize,
    pub sample_size: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for OutlierRemover {
    fn default() -> Self {
        Self::from_config(OutlierMethod::Auto, &CleanerConfig::default())
    }
}

impl OutlierRemover {
    /// Create a remover with the given method and default settings.
    pub fn new(method: OutlierMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Create a remover whose settings come from the engine configuration.
    pub fn from_config(method: OutlierMethod, config: &CleanerConfig) -> Self {
        Self {
            method,
            n_neighbors: config.lof_neighbors,
            trees: config.isolation_trees,
            sample_size: config.isolation_sample_size,
            contamination: config.contamination,
            seed: config.random_seed,
        }
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Method actually used for a matrix with `columns` features.
    pub fn resolve_method(&self, columns: usize) -> OutlierMethod {
        match self.method {
            OutlierMethod::Auto if columns <= AUTO_LOF_MAX_COLUMNS => OutlierMethod::Lof,
            OutlierMethod::Auto => OutlierMethod::IsolationForest,
            method => method,
        }
    }

    /// Mark outlier rows. `true` means the row should be removed.
    ///
    /// Every row must have the same number of finite features.
    pub fn fit_transform(&self, rows: &[Vec<f64>]) -> Vec<bool> {
        let n = rows.len();
        let mut mask = vec![false; n];
        if n < 3 {
            return mask;
        }

        let columns = rows[0].len();
        let method = self.resolve_method(columns);
        let (scores, threshold) = match method {
            OutlierMethod::Lof => (lof::scores(rows, self.n_neighbors), LOF_THRESHOLD),
            _ => (
                isolation_forest::scores(rows, self.trees, self.sample_size, self.seed),
                ISOLATION_THRESHOLD,
            ),
        };

        let mut candidates: Vec<usize> = (0..n).filter(|&i| scores[i] > threshold).collect();
        candidates.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

        let limit = ((self.contamination * n as f64).floor() as usize).max(1);
        for &i in candidates.iter().take(limit) {
            mask[i] = true;
        }

        debug!(
            "{} marked {} of {} rows as outliers",
            method,
            mask.iter().filter(|m| **m).count(),
            n
        );
        mask
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
