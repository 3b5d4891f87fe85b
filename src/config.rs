//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.ropcalc.toml` files.

use crate::error::ConfigError;
use crate::models::AbcClass;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".ropcalc.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Estimation policy.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Service level per ABC class.
    #[serde(default)]
    pub service_levels: ServiceLevels,

    /// Input column layout.
    #[serde(default)]
    pub input: InputConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path. Empty means a timestamped name.
    #[serde(default)]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of items estimated concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: String::new(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Qualification, ranking and bootstrap parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Replenishment lead time in days.
    #[serde(default = "default_lead_time_days")]
    pub lead_time_days: f64,

    /// Working days per week, used to convert lead time to weeks.
    #[serde(default = "default_working_days")]
    pub working_days_per_week: u32,

    /// Number of bootstrap draws per item.
    #[serde(default = "default_bootstrap_samples")]
    pub bootstrap_samples: usize,

    /// Fixed batch seed. When unset a random one is drawn per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Minimum average monthly quantity to qualify.
    #[serde(default = "default_min_avg_monthly")]
    pub min_avg_monthly_quantity: f64,

    /// Minimum number of transactions to qualify.
    #[serde(default = "default_min_transactions")]
    pub min_transaction_count: usize,

    /// Number of qualified items ranked for ABC.
    #[serde(default = "default_top_n")]
    pub abc_top_n: usize,

    /// Cumulative share of volume covered by class A.
    #[serde(default = "default_a_share")]
    pub abc_a_share: f64,

    /// Cumulative share of volume covered by classes A and B.
    #[serde(default = "default_b_share")]
    pub abc_b_share: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            lead_time_days: default_lead_time_days(),
            working_days_per_week: default_working_days(),
            bootstrap_samples: default_bootstrap_samples(),
            seed: None,
            min_avg_monthly_quantity: default_min_avg_monthly(),
            min_transaction_count: default_min_transactions(),
            abc_top_n: default_top_n(),
            abc_a_share: default_a_share(),
            abc_b_share: default_b_share(),
        }
    }
}

fn default_lead_time_days() -> f64 {
    5.0
}

fn default_working_days() -> u32 {
    5
}

fn default_bootstrap_samples() -> usize {
    2000
}

fn default_min_avg_monthly() -> f64 {
    0.5
}

fn default_min_transactions() -> usize {
    10
}

fn default_top_n() -> usize {
    500
}

fn default_a_share() -> f64 {
    0.80
}

fn default_b_share() -> f64 {
    0.95
}

impl PolicyConfig {
    /// Lead time expressed in working weeks; not necessarily integral.
    pub fn lead_time_weeks(&self) -> f64 {
        self.lead_time_days / f64::from(self.working_days_per_week)
    }

    /// Reject values that would make the estimation meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.lead_time_days.is_finite() || self.lead_time_days < 1.0 {
            return Err(ConfigError::out_of_range(
                "policy.lead_time_days",
                self.lead_time_days,
                ">= 1",
            ));
        }
        if !(1..=7).contains(&self.working_days_per_week) {
            return Err(ConfigError::out_of_range(
                "policy.working_days_per_week",
                self.working_days_per_week,
                "1..=7",
            ));
        }
        if self.bootstrap_samples == 0 {
            return Err(ConfigError::out_of_range(
                "policy.bootstrap_samples",
                self.bootstrap_samples,
                ">= 1",
            ));
        }
        if self.bootstrap_samples < 1000 {
            warn!(
                "bootstrap_samples = {} is below the recommended 1000; ROPs will be noisy",
                self.bootstrap_samples
            );
        }
        if !self.min_avg_monthly_quantity.is_finite() || self.min_avg_monthly_quantity < 0.0 {
            return Err(ConfigError::out_of_range(
                "policy.min_avg_monthly_quantity",
                self.min_avg_monthly_quantity,
                ">= 0",
            ));
        }
        if self.abc_top_n == 0 {
            return Err(ConfigError::out_of_range("policy.abc_top_n", self.abc_top_n, ">= 1"));
        }
        if !(self.abc_a_share > 0.0 && self.abc_a_share <= 1.0) {
            return Err(ConfigError::out_of_range(
                "policy.abc_a_share",
                self.abc_a_share,
                "(0, 1]",
            ));
        }
        if !(self.abc_b_share >= self.abc_a_share && self.abc_b_share <= 1.0) {
            return Err(ConfigError::out_of_range(
                "policy.abc_b_share",
                self.abc_b_share,
                "[abc_a_share, 1]",
            ));
        }
        Ok(())
    }
}

/// Target service level per ABC class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevels {
    #[serde(default = "default_level_a")]
    pub a: f64,
    #[serde(default = "default_level_b")]
    pub b: f64,
    #[serde(default = "default_level_c")]
    pub c: f64,
}

impl Default for ServiceLevels {
    fn default() -> Self {
        Self {
            a: default_level_a(),
            b: default_level_b(),
            c: default_level_c(),
        }
    }
}

fn default_level_a() -> f64 {
    0.95
}

fn default_level_b() -> f64 {
    0.85
}

fn default_level_c() -> f64 {
    0.75
}

/// Range the planners are expected to pick service levels from.
const ADVISORY_SERVICE_RANGE: std::ops::RangeInclusive<f64> = 0.70..=0.99;

impl ServiceLevels {
    /// Service level for a class.
    pub fn for_class(&self, class: AbcClass) -> f64 {
        match class {
            AbcClass::A => self.a,
            AbcClass::B => self.b,
            AbcClass::C => self.c,
        }
    }

    /// Levels must lie strictly inside (0, 1).
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("service_levels.a", self.a),
            ("service_levels.b", self.b),
            ("service_levels.c", self.c),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::out_of_range(field, value, "(0, 1)"));
            }
            if !ADVISORY_SERVICE_RANGE.contains(&value) {
                warn!("{} = {} is outside the usual 0.70..=0.99 range", field, value);
            }
        }
        Ok(())
    }
}

/// Column layout of the transaction files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_item_column")]
    pub item_column: String,

    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default = "default_quantity_column")]
    pub quantity_column: String,

    /// Optional column; missing or blank values get `default_branch`.
    #[serde(default = "default_branch_column")]
    pub branch_column: String,

    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// chrono formats tried in order for the date column.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            item_column: default_item_column(),
            date_column: default_date_column(),
            quantity_column: default_quantity_column(),
            branch_column: default_branch_column(),
            default_branch: default_branch(),
            date_formats: default_date_formats(),
        }
    }
}

fn default_item_column() -> String {
    "item_number".to_string()
}

fn default_date_column() -> String {
    "calendar_date".to_string()
}

fn default_quantity_column() -> String {
    "quantity".to_string()
}

fn default_branch_column() -> String {
    "branch_number".to_string()
}

fn default_branch() -> String {
    "BRANCH".to_string()
}

fn default_date_formats() -> Vec<String> {
    vec!["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y", "%d.%m.%Y"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if it exists. A file that exists but fails to parse is an error.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(days) = args.lead_time_days {
            self.policy.lead_time_days = days;
        }
        if let Some(days) = args.working_days {
            self.policy.working_days_per_week = days;
        }
        if let Some(samples) = args.bootstrap_samples {
            self.policy.bootstrap_samples = samples;
        }
        if let Some(seed) = args.seed {
            self.policy.seed = Some(seed);
        }
        if let Some(top_n) = args.top_n {
            self.policy.abc_top_n = top_n;
        }

        if let Some(level) = args.service_level_a {
            self.service_levels.a = level;
        }
        if let Some(level) = args.service_level_b {
            self.service_levels.b = level;
        }
        if let Some(level) = args.service_level_c {
            self.service_levels.c = level;
        }

        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Validate every section. Any error is fatal for the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.service_levels.validate()?;
        if self.general.concurrency == 0 {
            return Err(ConfigError::out_of_range(
                "general.concurrency",
                self.general.concurrency,
                ">= 1",
            ));
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.policy.lead_time_days, 5.0);
        assert_eq!(config.policy.working_days_per_week, 5);
        assert_eq!(config.policy.bootstrap_samples, 2000);
        assert_eq!(config.policy.abc_top_n, 500);
        assert_eq!(config.service_levels.for_class(AbcClass::A), 0.95);
        assert_eq!(config.service_levels.for_class(AbcClass::B), 0.85);
        assert_eq!(config.service_levels.for_class(AbcClass::C), 0.75);
        assert_eq!(config.input.default_branch, "BRANCH");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lead_time_weeks_is_fractional() {
        let policy = PolicyConfig {
            lead_time_days: 7.0,
            working_days_per_week: 5,
            ..PolicyConfig::default()
        };
        assert!((policy.lead_time_weeks() - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "rop.json"
concurrency = 2

[policy]
lead_time_days = 10.0
working_days_per_week = 6
seed = 42
min_transaction_count = 8

[service_levels]
a = 0.97

[input]
item_column = "sku"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "rop.json");
        assert_eq!(config.general.concurrency, 2);
        assert_eq!(config.policy.lead_time_days, 10.0);
        assert_eq!(config.policy.working_days_per_week, 6);
        assert_eq!(config.policy.seed, Some(42));
        assert_eq!(config.policy.min_transaction_count, 8);
        assert_eq!(config.policy.bootstrap_samples, 2000);
        assert_eq!(config.service_levels.a, 0.97);
        assert_eq!(config.service_levels.b, 0.85);
        assert_eq!(config.input.item_column, "sku");
        assert_eq!(config.input.date_column, "calendar_date");
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = Config::default();
        config.policy.lead_time_days = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.policy.working_days_per_week = 8;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.service_levels.b = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "service_levels.b", .. })
        ));

        let mut config = Config::default();
        config.policy.abc_b_share = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_if_exists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        assert!(Config::load_if_exists(&path).unwrap().is_none());

        std::fs::write(&path, "[policy]\nworking_days_per_week = 3\n").unwrap();
        let loaded = Config::load_if_exists(&path).unwrap().unwrap();
        assert_eq!(loaded.policy.working_days_per_week, 3);

        std::fs::write(&path, "[policy]\nlead_time_days = \"ten\"\n").unwrap();
        assert!(Config::load_if_exists(&path).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[policy]"));
        assert!(toml_str.contains("[service_levels]"));
        assert!(toml_str.contains("[input]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.policy, PolicyConfig::default());
    }
}
