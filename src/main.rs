//! ropcalc - reorder point calculator
//!
//! A CLI tool that turns a transaction history into per-item reorder
//! points: items are aggregated, qualified, ranked into ABC tiers and
//! estimated by bootstrap resampling of weekly demand.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, bad configuration, cancelled run, etc.)
//!   2 - Items need review and --fail-on-review was set

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use chrono::Local;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use ingest::TransactionLoader;
use models::{Report, ReportMetadata};
use pipeline::{CancelFlag, RunOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config(Path::new(CONFIG_FILE));
    }

    // Configuration errors are fatal before any data is touched
    let (config, config_source) = match load_config(&args, Path::new(CONFIG_FILE)) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, config.general.verbose);

    info!("ropcalc v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run_batch(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: write a default config file, refusing to overwrite.
fn handle_init_config(path: &Path) -> Result<()> {
    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    write_default_config(path)?;

    println!("✅ Created {} with default settings.", path.display());
    println!("   Edit it to customize lead time, service levels and input columns.");
    Ok(())
}

fn write_default_config(path: &Path) -> Result<()> {
    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from the explicit path, then `default_path`, then defaults.
///
/// Returns the config and the file it came from. A file that exists but
/// cannot be parsed is an error, never a silent fallback to defaults.
fn load_config(args: &Args, default_path: &Path) -> Result<(Config, Option<PathBuf>)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path).context("Invalid configuration")?;
        return Ok((config, Some(config_path.clone())));
    }

    match Config::load_if_exists(default_path).context("Invalid configuration")? {
        Some(config) => Ok((config, Some(default_path.to_path_buf()))),
        None => Ok((Config::default(), None)),
    }
}

/// Run the complete batch. Returns exit code (0 or 2).
async fn run_batch(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();
    let run_date = Local::now();

    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    // Step 1: Load transactions
    let input = args.input_path();
    println!("📥 Loading transactions: {}", input.display());
    let transactions = TransactionLoader::new(config.input.clone())
        .load_path(&input)
        .context("Failed to load transactions")?;

    if args.dry_run {
        return handle_dry_run(&transactions, &config);
    }

    // Step 2: Estimate
    let batch_seed = config.policy.seed.unwrap_or_else(rand::random);
    let policy = &config.policy;

    println!("🧮 Estimating reorder points...");
    println!(
        "   Lead time: {} days ({:.2} weeks)",
        policy.lead_time_days,
        policy.lead_time_weeks()
    );
    println!(
        "   Service levels: A {:.2} | B {:.2} | C {:.2}",
        config.service_levels.a, config.service_levels.b, config.service_levels.c
    );
    println!("   Bootstrap samples: {}", policy.bootstrap_samples);
    println!("   Seed: {}", batch_seed);

    let cancel = CancelFlag::new();
    spawn_ctrl_c_handler(cancel.clone());

    let options = RunOptions {
        concurrency: config.general.concurrency,
        cancel,
        show_progress: !args.quiet,
        ..RunOptions::new(batch_seed)
    };

    let results = pipeline::run(&transactions, policy, &config.service_levels, &options).await?;

    // Step 3: Build and write the report
    let metadata = ReportMetadata {
        input: input.display().to_string(),
        run_date,
        lead_time_days: policy.lead_time_days,
        working_days_per_week: policy.working_days_per_week,
        lead_time_weeks: policy.lead_time_weeks(),
        bootstrap_samples: policy.bootstrap_samples,
        seed: batch_seed,
        service_level_a: config.service_levels.a,
        service_level_b: config.service_levels.b,
        service_level_c: config.service_levels.c,
        transactions: transactions.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    let report = Report::new(metadata, results);

    let output = args.output_path(&config.general.output, run_date);
    let written = match args.format {
        OutputFormat::Markdown => {
            write_text(&output, &report::generate_markdown_report(&report))?;
            vec![output]
        }
        OutputFormat::Json => {
            write_text(&output, &report::generate_json_report(&report)?)?;
            vec![output]
        }
        OutputFormat::Csv => report::write_csv_report(&report, &output)?,
    };

    // Print summary
    let summary = &report.summary;
    println!("\n📊 Run Summary:");
    println!("   Items: {}", summary.total_items);
    println!(
        "   Qualified: {} (A {} | B {} | C {})",
        summary.qualified, summary.class_a, summary.class_b, summary.class_c
    );
    println!("   Needs review: {}", summary.needs_review);
    if summary.estimation_failures > 0 {
        println!(
            "   ⚠️  {} qualified item(s) could not be estimated",
            summary.estimation_failures
        );
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    for path in &written {
        println!("\n✅ Saved: {}", path.display());
    }

    if args.fail_on_review && summary.needs_review > 0 {
        eprintln!(
            "\n⛔ {} item(s) need review. Failing (exit code 2).",
            summary.needs_review
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: show the qualification split without bootstrapping.
fn handle_dry_run(transactions: &[models::Transaction], config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: aggregating and ranking (no bootstrap)...\n");

    let batch = pipeline::prepare(transactions, &config.policy)?;

    println!("   Transactions: {}", transactions.len());
    println!("   Items: {}", batch.items.len());
    println!("   Qualified: {}", batch.qualified);
    println!("   Needs review: {}", batch.items.len() - batch.qualified);
    println!("   Ranked for ABC: {}", batch.abc.len());

    let ranked_total = batch.abc.ranked.last().map_or(0.0, |r| r.cumulative_quantity);
    for ranked in batch.abc.ranked.iter().take(10) {
        let share = if ranked_total > 0.0 {
            100.0 * ranked.cumulative_quantity / ranked_total
        } else {
            0.0
        };
        println!(
            "     {} {} ({} units, cumulative {:.1}%)",
            ranked.class, ranked.item_id, ranked.total_quantity, share
        );
    }

    println!("\n✅ Dry run complete. No reorder points were estimated.");
    Ok(0)
}

/// Flip the cancel flag on Ctrl-C; the pipeline stops before the next item.
fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight items");
            cancel.cancel();
        }
    });
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn args_with(extra: &[&str]) -> Args {
        let mut argv = vec!["ropcalc", "--input", "tx.csv"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_load_config_rejects_malformed_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[policy]\nlead_time_days = \"ten\"\nworking_days_per_week = 3\n\n[service_levels]\na = 0.99\n",
        )
        .unwrap();

        let err = load_config(&args_with(&[]), &path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid configuration"));
    }

    #[test]
    fn test_load_config_rejects_malformed_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[general\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let args = args_with(&["--config", path_arg.as_str()]);
        assert!(load_config(&args, &temp_dir.path().join(CONFIG_FILE)).is_err());
    }

    #[test]
    fn test_load_config_reads_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[general]\nverbose = true\n\n[policy]\nworking_days_per_week = 3\n").unwrap();

        let (config, source) = load_config(&args_with(&[]), &path).unwrap();
        assert_eq!(source, Some(path));
        assert_eq!(config.policy.working_days_per_week, 3);
        assert!(config.general.verbose);
    }

    #[test]
    fn test_load_config_without_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let (config, source) =
            load_config(&args_with(&[]), &temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(source, None);
        assert_eq!(config.policy, config::PolicyConfig::default());
    }

    #[test]
    fn test_write_default_config_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);

        write_default_config(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded.policy, config::PolicyConfig::default());
        assert_eq!(loaded.service_levels, config::ServiceLevels::default());
        assert_eq!(loaded.input, config::InputConfig::default());
    }
}
