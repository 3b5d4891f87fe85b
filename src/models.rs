//! Data models for the reorder point calculator.
//!
//! This module contains the records that flow through the batch:
//! raw transactions, per-item demand metrics, ABC classes and the
//! final per-item ROP results handed to the report writers.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A single inventory movement from the transaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub item_id: String,
    /// Branch the movement belongs to, or the configured sentinel.
    pub branch_id: String,
    pub date: NaiveDate,
    /// Always finite and non-negative.
    pub quantity: f64,
}

/// Whether an item has enough demand signal for automated estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemandGroup {
    Qualified,
    #[serde(rename = "Human check needed")]
    HumanCheck,
}

impl fmt::Display for DemandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandGroup::Qualified => write!(f, "Qualified"),
            DemandGroup::HumanCheck => write!(f, "Human check needed"),
        }
    }
}

/// Pareto tier of a qualified item, A being the highest volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    /// Class used for qualified items that fell outside the ranked top-N.
    pub const FALLBACK: AbcClass = AbcClass::C;
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbcClass::A => write!(f, "A"),
            AbcClass::B => write!(f, "B"),
            AbcClass::C => write!(f, "C"),
        }
    }
}

/// Label for an optional class: the class letter, or `N/A` for unqualified items.
pub fn class_label(class: Option<AbcClass>) -> String {
    class.map_or_else(|| "N/A".to_string(), |c| c.to_string())
}

fn serialize_class<S: Serializer>(class: &Option<AbcClass>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&class_label(*class))
}

/// One calendar-week bucket of an item's demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyDemand {
    /// First day of the bucket.
    pub week_start: NaiveDate,
    /// Summed quantity, zero for weeks without transactions.
    pub quantity: f64,
}

/// Per-item summary derived from the transaction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetrics {
    pub item_id: String,
    pub total_quantity: f64,
    pub avg_monthly_quantity: f64,
    pub transaction_count: usize,
    pub weeks_without_demand: usize,
    pub demand_group: DemandGroup,
}

/// Metrics plus the zero-filled weekly series they were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDemand {
    pub metrics: ItemMetrics,
    pub weekly: Vec<WeeklyDemand>,
}

impl ItemDemand {
    /// Weekly quantities in chronological order.
    pub fn weekly_quantities(&self) -> Vec<f64> {
        self.weekly.iter().map(|w| w.quantity).collect()
    }
}

/// Why an item landed in the needs-review group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Too little volume or too few transactions.
    InsufficientHistory,
    /// Qualified, but the estimator could not produce a value.
    EstimationFailed(String),
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewReason::InsufficientHistory => write!(f, "insufficient history"),
            ReviewReason::EstimationFailed(detail) => write!(f, "estimation failed: {}", detail),
        }
    }
}

/// The final record for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RopResult {
    #[serde(rename = "item_number")]
    pub item_id: String,
    #[serde(serialize_with = "serialize_class")]
    pub abc_class: Option<AbcClass>,
    /// Present exactly when the item was qualified and estimated.
    pub rop: Option<u64>,
    pub demand_group: DemandGroup,
    #[serde(rename = "total_qty")]
    pub total_quantity: f64,
    pub transaction_count: usize,
    pub weeks_without_demand: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<ReviewReason>,
}

/// Results partitioned for export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Qualified items with an ROP.
    pub results: Vec<RopResult>,
    /// Everything that needs a human to look at it.
    pub needs_review: Vec<RopResult>,
}

impl ResultSet {
    /// Total number of items across both groups.
    pub fn len(&self) -> usize {
        self.results.len() + self.needs_review.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every record, results first.
    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = &RopResult> {
        self.results.iter().chain(self.needs_review.iter())
    }
}

/// Counts across a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_items: usize,
    pub qualified: usize,
    pub needs_review: usize,
    pub class_a: usize,
    pub class_b: usize,
    pub class_c: usize,
    /// Qualified items that were re-flagged because estimation failed.
    pub estimation_failures: usize,
}

impl ResultSummary {
    /// Creates a summary from a partitioned result set.
    pub fn from_results(set: &ResultSet) -> Self {
        let mut summary = Self {
            total_items: set.len(),
            qualified: set.results.len(),
            needs_review: set.needs_review.len(),
            ..Self::default()
        };

        for result in &set.results {
            match result.abc_class {
                Some(AbcClass::A) => summary.class_a += 1,
                Some(AbcClass::B) => summary.class_b += 1,
                Some(AbcClass::C) => summary.class_c += 1,
                None => {}
            }
        }

        summary.estimation_failures = set
            .needs_review
            .iter()
            .filter(|r| matches!(r.review_reason, Some(ReviewReason::EstimationFailed(_))))
            .count();

        summary
    }
}

/// Parameters and bookkeeping for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Input file or directory.
    pub input: String,
    pub run_date: DateTime<Local>,
    pub lead_time_days: f64,
    pub working_days_per_week: u32,
    pub lead_time_weeks: f64,
    pub bootstrap_samples: usize,
    /// Batch seed; rerunning with it reproduces every ROP.
    pub seed: u64,
    pub service_level_a: f64,
    pub service_level_b: f64,
    pub service_level_c: f64,
    pub transactions: usize,
    pub duration_seconds: f64,
}

/// The complete ROP report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: ResultSummary,
    pub results: Vec<RopResult>,
    pub needs_review: Vec<RopResult>,
}

impl Report {
    /// Builds a report from the partitioned results.
    pub fn new(metadata: ReportMetadata, set: ResultSet) -> Self {
        let summary = ResultSummary::from_results(&set);
        Self {
            metadata,
            summary,
            results: set.results,
            needs_review: set.needs_review,
        }
    }
}
