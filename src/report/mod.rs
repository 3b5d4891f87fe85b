//! Report writers for the two result groups.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report, write_csv_report};
