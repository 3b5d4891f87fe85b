//! Report generation.
//!
//! This module renders the two result groups as Markdown, JSON, or a pair
//! of CSV tables (one for ROP results, one for items needing review).

use crate::models::{class_label, Report, ReportMetadata, ResultSummary, RopResult};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column order shared by the CSV tables.
const CSV_HEADER: [&str; 8] = [
    "item_number",
    "abc_class",
    "rop",
    "demand_group",
    "total_qty",
    "transaction_count",
    "weeks_without_demand",
    "review_reason",
];

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Reorder Point Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_results_table("ROP Results", &report.results));
    output.push_str(&generate_results_table("Needs Review", &report.needs_review));
    output.push_str("---\n\n*Generated by ropcalc*\n");

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S")
    ));
    section.push_str(&format!("- **Transactions:** {}\n", metadata.transactions));
    section.push_str(&format!(
        "- **Lead Time:** {} days / {} working days per week = {:.2} weeks\n",
        metadata.lead_time_days, metadata.working_days_per_week, metadata.lead_time_weeks
    ));
    section.push_str(&format!(
        "- **Bootstrap Samples:** {}\n",
        metadata.bootstrap_samples
    ));
    section.push_str(&format!(
        "- **Service Levels:** A {:.2} | B {:.2} | C {:.2}\n",
        metadata.service_level_a, metadata.service_level_b, metadata.service_level_c
    ));
    section.push_str(&format!("- **Seed:** {}\n", metadata.seed));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &ResultSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Qualified | Needs Review | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | **{}** |\n\n",
        summary.qualified, summary.needs_review, summary.total_items
    ));

    section.push_str("| Class A | Class B | Class C |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        summary.class_a, summary.class_b, summary.class_c
    ));

    if summary.estimation_failures > 0 {
        section.push_str(&format!(
            "> {} qualified item(s) could not be estimated and were moved to Needs Review.\n\n",
            summary.estimation_failures
        ));
    }

    section
}

/// Generate one result table.
fn generate_results_table(title: &str, results: &[RopResult]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    if results.is_empty() {
        section.push_str("No items.\n\n");
        return section;
    }

    section.push_str("| Item | ABC | ROP | Demand Group | Total Qty | Transactions | Weeks w/o Demand | Reason |\n");
    section.push_str("|:---|:---:|---:|:---|---:|---:|---:|:---|\n");

    for r in results {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} | {} | {} |\n",
            r.item_id,
            class_label(r.abc_class),
            r.rop.map_or_else(|| "-".to_string(), |v| v.to_string()),
            r.demand_group,
            r.total_quantity,
            r.transaction_count,
            r.weeks_without_demand,
            r.review_reason
                .as_ref()
                .map_or_else(String::new, |reason| reason.to_string()),
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write one CSV table of results.
pub fn write_csv_table<W: Write>(writer: W, results: &[RopResult]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for r in results {
        csv_writer.write_record([
            r.item_id.clone(),
            class_label(r.abc_class),
            r.rop.map(|v| v.to_string()).unwrap_or_default(),
            r.demand_group.to_string(),
            r.total_quantity.to_string(),
            r.transaction_count.to_string(),
            r.weeks_without_demand.to_string(),
            r.review_reason
                .as_ref()
                .map(|reason| reason.to_string())
                .unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Paths of the two CSV tables derived from an output path.
pub fn csv_paths(output: &Path) -> (PathBuf, PathBuf) {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "rop_results".to_string());
    let dir = output.parent().unwrap_or_else(|| Path::new(""));

    (
        dir.join(format!("{}_results.csv", stem)),
        dir.join(format!("{}_needs_review.csv", stem)),
    )
}

/// Write both CSV tables next to `output`. Returns the paths written.
pub fn write_csv_report(report: &Report, output: &Path) -> Result<Vec<PathBuf>> {
    let (results_path, review_path) = csv_paths(output);

    for (path, rows) in [
        (&results_path, &report.results),
        (&review_path, &report.needs_review),
    ] {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv_table(file, rows)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(vec![results_path, review_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AbcClass, DemandGroup, ResultSet, ReviewReason};
    use chrono::Local;
    use tempfile::TempDir;

    fn create_test_report() -> Report {
        let metadata = ReportMetadata {
            input: "transactions.csv".to_string(),
            run_date: Local::now(),
            lead_time_days: 5.0,
            working_days_per_week: 5,
            lead_time_weeks: 1.0,
            bootstrap_samples: 2000,
            seed: 42,
            service_level_a: 0.95,
            service_level_b: 0.85,
            service_level_c: 0.75,
            transactions: 120,
            duration_seconds: 0.4,
        };

        let set = ResultSet {
            results: vec![RopResult {
                item_id: "SKU-1".to_string(),
                abc_class: Some(AbcClass::A),
                rop: Some(14),
                demand_group: DemandGroup::Qualified,
                total_quantity: 310.0,
                transaction_count: 40,
                weeks_without_demand: 2,
                review_reason: None,
            }],
            needs_review: vec![RopResult {
                item_id: "SKU-9".to_string(),
                abc_class: None,
                rop: None,
                demand_group: DemandGroup::HumanCheck,
                total_quantity: 3.0,
                transaction_count: 2,
                weeks_without_demand: 5,
                review_reason: Some(ReviewReason::InsufficientHistory),
            }],
        };

        Report::new(metadata, set)
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Reorder Point Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## ROP Results"));
        assert!(markdown.contains("## Needs Review"));
        assert!(markdown.contains("| `SKU-1` | A | 14 | Qualified |"));
        assert!(markdown.contains("| `SKU-9` | N/A | - | Human check needed |"));
        assert!(markdown.contains("- **Seed:** 42"));
    }

    #[test]
    fn test_empty_group_renders_placeholder() {
        let table = generate_results_table("Needs Review", &[]);
        assert!(table.contains("No items."));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["qualified"], 1);
        assert_eq!(value["results"][0]["rop"], 14);
        assert_eq!(value["needs_review"][0]["abc_class"], "N/A");
        assert_eq!(value["needs_review"][0]["demand_group"], "Human check needed");
    }

    #[test]
    fn test_csv_paths() {
        let (results, review) = csv_paths(Path::new("out/rop_results_20240101.csv"));
        assert_eq!(results, Path::new("out/rop_results_20240101_results.csv"));
        assert_eq!(review, Path::new("out/rop_results_20240101_needs_review.csv"));
    }

    #[test]
    fn test_write_csv_report() {
        let temp_dir = TempDir::new().unwrap();
        let report = create_test_report();

        let written = write_csv_report(&report, &temp_dir.path().join("run.csv")).unwrap();
        assert_eq!(written.len(), 2);

        let results = std::fs::read_to_string(&written[0]).unwrap();
        let mut lines = results.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER.join(",").as_str()));
        assert_eq!(lines.next(), Some("SKU-1,A,14,Qualified,310,40,2,"));

        let review = std::fs::read_to_string(&written[1]).unwrap();
        assert!(review.contains("SKU-9,N/A,,Human check needed,3,2,5,insufficient history"));
    }
}
