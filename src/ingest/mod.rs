//! Transaction ingestion from CSV exports.
//!
//! This module turns one CSV file, or a directory tree of them, into
//! validated `Transaction` records. Header and row problems are fatal for
//! the whole batch and name the offending file and line.

use crate::config::InputConfig;
use crate::error::InputError;
use crate::models::Transaction;
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Positions of the configured columns within a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    item: usize,
    date: usize,
    quantity: usize,
    branch: Option<usize>,
}

impl ColumnIndex {
    fn resolve(
        headers: &csv::StringRecord,
        config: &InputConfig,
        file: &Path,
    ) -> Result<Self, InputError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| InputError::MissingColumn {
                file: file.to_path_buf(),
                column: name.to_string(),
            })
        };

        Ok(Self {
            item: require(&config.item_column)?,
            date: require(&config.date_column)?,
            quantity: require(&config.quantity_column)?,
            branch: find(&config.branch_column),
        })
    }
}

/// Loads transactions according to an input column layout.
pub struct TransactionLoader {
    config: InputConfig,
}

impl TransactionLoader {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Load a single CSV file or every `*.csv` file below a directory.
    pub fn load_path(&self, path: &Path) -> Result<Vec<Transaction>, InputError> {
        let files = if path.is_dir() {
            discover_csv_files(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut transactions = Vec::new();
        for file in &files {
            let loaded = self.load_file(file)?;
            debug!("Loaded {} transactions from {}", loaded.len(), file.display());
            transactions.extend(loaded);
        }

        if transactions.is_empty() {
            return Err(InputError::EmptyDataset(path.to_path_buf()));
        }

        info!(
            "Loaded {} transactions from {} file(s)",
            transactions.len(),
            files.len()
        );
        Ok(transactions)
    }

    /// Load one CSV file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Transaction>, InputError> {
        let file = std::fs::File::open(path).map_err(|source| InputError::Io {
            file: path.to_path_buf(),
            source,
        })?;
        self.load_reader(file, path)
    }

    /// Parse transactions from any reader; `source` only labels errors.
    pub fn load_reader<R: Read>(&self, reader: R, source: &Path) -> Result<Vec<Transaction>, InputError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| csv_error(source, e))?
            .clone();
        let columns = ColumnIndex::resolve(&headers, &self.config, source)?;

        let mut transactions = Vec::new();
        for result in csv_reader.records() {
            let record = result.map_err(|e| csv_error(source, e))?;
            let line = record.position().map_or(0, |p| p.line());
            let transaction = self
                .parse_record(&record, columns)
                .map_err(|reason| InputError::InvalidRow {
                    file: source.to_path_buf(),
                    line,
                    reason,
                })?;
            transactions.push(transaction);
        }

        Ok(transactions)
    }

    fn parse_record(&self, record: &csv::StringRecord, columns: ColumnIndex) -> Result<Transaction, String> {
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let item_id = field(columns.item);
        if item_id.is_empty() {
            return Err(format!("empty {}", self.config.item_column));
        }

        let date = parse_date(field(columns.date), &self.config.date_formats)
            .ok_or_else(|| format!("unparseable {} '{}'", self.config.date_column, field(columns.date)))?;

        let raw_quantity = field(columns.quantity);
        let quantity: f64 = raw_quantity
            .parse()
            .map_err(|_| format!("unparseable {} '{}'", self.config.quantity_column, raw_quantity))?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(format!(
                "{} must be a non-negative number, got {}",
                self.config.quantity_column, raw_quantity
            ));
        }

        let branch_id = columns
            .branch
            .map(field)
            .filter(|b| !b.is_empty())
            .unwrap_or(self.config.default_branch.as_str())
            .to_string();

        Ok(Transaction {
            item_id: item_id.to_string(),
            branch_id,
            date,
            quantity,
        })
    }
}

fn csv_error(file: &Path, source: csv::Error) -> InputError {
    InputError::Csv {
        file: file.to_path_buf(),
        source,
    }
}

/// Parse a date cell, accepting date-time values by keeping their date part.
fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(raw, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(raw, fmt).ok().map(|dt| dt.date()))
    })
}

/// Every `*.csv` file under `root`, sorted by path so loads are reproducible.
fn discover_csv_files(root: &Path) -> Result<Vec<PathBuf>, InputError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| InputError::Io {
            file: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("directory loop")),
        })?;

        let is_hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
        if is_hidden || !entry.file_type().is_file() {
            continue;
        }

        let is_csv = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(InputError::NoInputFiles(root.to_path_buf()));
    }

    files.sort();
    Ok(files)
}
