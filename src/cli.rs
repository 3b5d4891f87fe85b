//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::{DateTime, Local};
use clap::Parser;
use std::path::PathBuf;

/// ropcalc - reorder points from transaction history
///
/// Aggregates a transaction export per item, splits items into qualified
/// and needs-review groups, ranks qualified items into ABC tiers and
/// estimates each one's reorder point by bootstrap resampling of weekly
/// demand.
///
/// Examples:
///   ropcalc --input transactions.csv
///   ropcalc --input exports/ --lead-time-days 10 --format json
///   ropcalc --input transactions.csv --seed 42 --service-level-a 0.98
///   ropcalc --input transactions.csv --dry-run
///   ropcalc --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Transaction CSV file, or a directory searched for *.csv files
    ///
    /// Required columns (names configurable): item_number, calendar_date, quantity.
    /// branch_number is optional.
    #[arg(short, long, value_name = "PATH", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to rop_results_<timestamp> with an extension matching --format.
    /// With --format csv two files are written: <stem>_results.csv and
    /// <stem>_needs_review.csv.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ropcalc.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Replenishment lead time in days
    #[arg(long, value_name = "DAYS")]
    pub lead_time_days: Option<f64>,

    /// Working days per week (1-7)
    #[arg(long, value_name = "DAYS")]
    pub working_days: Option<u32>,

    /// Bootstrap draws per item (1000+ recommended)
    #[arg(long, value_name = "COUNT")]
    pub bootstrap_samples: Option<usize>,

    /// Service level for class A items (0.70 - 0.99)
    #[arg(long, value_name = "LEVEL")]
    pub service_level_a: Option<f64>,

    /// Service level for class B items (0.70 - 0.99)
    #[arg(long, value_name = "LEVEL")]
    pub service_level_b: Option<f64>,

    /// Service level for class C items (0.70 - 0.99)
    #[arg(long, value_name = "LEVEL")]
    pub service_level_c: Option<f64>,

    /// Batch seed for reproducible ROPs
    ///
    /// When unset a random seed is drawn and printed in the report.
    #[arg(long, value_name = "SEED", env = "ROPCALC_SEED")]
    pub seed: Option<u64>,

    /// Number of qualified items ranked for ABC
    #[arg(long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Number of items estimated concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load, aggregate, qualify and rank without bootstrapping
    ///
    /// Prints the qualified / needs-review split and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any item ends up needing review
    #[arg(long)]
    pub fail_on_review: bool,

    /// Generate a default .ropcalc.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Two CSV tables
    Csv,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input path does not exist: {}", input.display()));
            }
            None => return Err("--input is required".to_string()),
            _ => {}
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.bootstrap_samples == Some(0) {
            return Err("Bootstrap samples must be at least 1".to_string());
        }

        if let Some(days) = self.working_days {
            if !(1..=7).contains(&days) {
                return Err("Working days per week must be between 1 and 7".to_string());
            }
        }

        if let Some(days) = self.lead_time_days {
            if !days.is_finite() || days < 1.0 {
                return Err("Lead time must be at least 1 day".to_string());
            }
        }

        for level in [self.service_level_a, self.service_level_b, self.service_level_c]
            .into_iter()
            .flatten()
        {
            if !(level > 0.0 && level < 1.0) {
                return Err(format!("Service level {} must be between 0 and 1", level));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` comes from `[general] verbose`; `--quiet` still wins.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The input path; callers validate first.
    pub fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_default()
    }

    /// Output path: explicit flag, then config value, then a timestamped default.
    pub fn output_path(&self, configured: &str, now: DateTime<Local>) -> PathBuf {
        if let Some(ref output) = self.output {
            return output.clone();
        }
        if !configured.is_empty() {
            return PathBuf::from(configured);
        }
        PathBuf::from(format!(
            "rop_results_{}.{}",
            now.format("%Y%m%d_%H%M%S"),
            self.format.extension()
        ))
    }
}
