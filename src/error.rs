//! Error types for the ROP batch.
//!
//! Batch-fatal failures (bad input, bad configuration, cancellation) are
//! returned as errors. Per-item estimation failures are not: the pipeline
//! turns them into needs-review results so the rest of the batch survives.

use std::path::PathBuf;
use thiserror::Error;

/// Transaction input could not be turned into a usable dataset.
#[derive(Debug, Error)]
pub enum InputError {
    /// A required column is absent from a file header.
    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: PathBuf, column: String },

    /// A data row could not be parsed.
    #[error("{file}:{line}: {reason}")]
    InvalidRow {
        file: PathBuf,
        line: u64,
        reason: String,
    },

    /// No transaction rows were found.
    #[error("no transactions found in {0}")]
    EmptyDataset(PathBuf),

    /// No input files matched.
    #[error("no CSV files found under {0}")]
    NoInputFiles(PathBuf),

    /// Average monthly quantity has no denominator.
    #[error("dataset spans zero calendar months")]
    NoMonths,

    #[error("failed to read {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {file}: {source}")]
    Csv {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A configuration value is outside its accepted range.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn out_of_range(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// A single item could not be estimated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EstimationError {
    /// The weekly demand series has no entries to resample.
    #[error("item {item_id} has an empty weekly demand series")]
    EmptySeries { item_id: String },
}

/// The batch stopped before every item was processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("run cancelled after {completed} of {total} items")]
    Cancelled { completed: usize, total: usize },

    #[error("estimation worker failed: {0}")]
    Worker(String),
}
