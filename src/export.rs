//! Export search history as CSV or JSON.
//!
//! CSV columns follow the dashboard download: URL, Domain Authority,
//! Page Authority, Spam Score, Backlinks, Domain Age, Check Date.
//! Fields are quoted per RFC 4180 when they contain a comma, quote, or
//! line break.

use anyhow::{bail, Result};
use std::path::Path;
use std::str::FromStr;

use dapa_checker_core::models::SearchRecord;

pub const CSV_HEADER: [&str; 7] = [
    "URL",
    "Domain Authority",
    "Page Authority",
    "Spam Score",
    "Backlinks",
    "Domain Age",
    "Check Date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => bail!("Unknown export format: '{}'. Must be csv or json.", other),
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(records: &[SearchRecord]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");
    for r in records {
        let row = [
            csv_field(&r.url),
            r.domain_authority.to_string(),
            r.page_authority.to_string(),
            r.spam_score.to_string(),
            r.backlinks.to_string(),
            csv_field(&r.domain_age),
            r.check_timestamp.to_rfc3339(),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

pub fn render(records: &[SearchRecord], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => Ok(to_csv(records)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
    }
}

/// Export `records` in `format`.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(records: &[SearchRecord], format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let body = render(records, format)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &body)?;
            eprintln!("Exported {} searches to {}", records.len(), path.display());
        }
        None => {
            print!("{}", body);
        }
    }
    Ok(())
}
