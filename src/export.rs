use crate::models::{ListingRecord, RunSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

const CSV_HEADER: [&str; 21] = [
    "Region ID",
    "Region",
    "Name",
    "Address",
    "Full address",
    "Country",
    "Postal code",
    "Phone",
    "All phones",
    "Website",
    "All websites",
    "Rating",
    "Reviews",
    "Rating count",
    "Categories",
    "Working hours",
    "Social links",
    "Latitude",
    "Longitude",
    "Photo",
    "Map link",
];

/// Files produced by one export
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub summary: PathBuf,
}

/// Writes collected records into an explicit output directory
#[derive(Debug, Clone)]
pub struct ResultSink {
    output_dir: PathBuf,
}

impl ResultSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `clubs-<label>-<ts>.json`, `.csv` and `summary-<label>-<ts>.json`
    pub async fn write(
        &self,
        label: &str,
        records: &[ListingRecord],
        summary: &RunSummary,
    ) -> Result<ExportPaths> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        let stem = format!(
            "{}-{}",
            sanitize_label(label),
            Utc::now().format("%Y-%m-%dT%H-%M-%S")
        );
        let paths = ExportPaths {
            json: self.output_dir.join(format!("clubs-{}.json", stem)),
            csv: self.output_dir.join(format!("clubs-{}.csv", stem)),
            summary: self.output_dir.join(format!("summary-{}.json", stem)),
        };

        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&paths.json, json)
            .await
            .with_context(|| format!("Failed to write {}", paths.json.display()))?;
        info!("💾 Saved {} clubs to {}", records.len(), paths.json.display());

        tokio::fs::write(&paths.csv, to_csv(records))
            .await
            .with_context(|| format!("Failed to write {}", paths.csv.display()))?;
        info!("📊 Saved CSV to {}", paths.csv.display());

        let summary_json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&paths.summary, summary_json)
            .await
            .with_context(|| format!("Failed to write {}", paths.summary.display()))?;

        Ok(paths)
    }
}

/// Render records as CSV with a header row
pub fn to_csv(records: &[ListingRecord]) -> String {
    let mut out = String::new();
    write_row(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));
    for record in records {
        write_row(&mut out, csv_row(record));
    }
    out
}

fn csv_row(record: &ListingRecord) -> Vec<String> {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    let num = |value: Option<String>| value.unwrap_or_default();
    let joined = |values: &[String], fallback: &Option<String>| {
        if values.is_empty() {
            opt(fallback)
        } else {
            values.join("; ")
        }
    };

    vec![
        num(record.region_id.map(|id| id.to_string())),
        opt(&record.region_name),
        record.name.clone(),
        record.address.clone(),
        opt(&record.full_address),
        opt(&record.country),
        opt(&record.postal_code),
        opt(&record.phone),
        joined(&record.phones, &record.phone),
        opt(&record.website),
        joined(&record.websites, &record.website),
        num(record.rating.map(|r| r.to_string())),
        num(record.reviews.map(|r| r.to_string())),
        num(record.rating_count.map(|r| r.to_string())),
        record.categories.join("; "),
        opt(&record.working_hours),
        record
            .social_links
            .iter()
            .map(|link| format!("{}: {}", link.kind, link.url))
            .collect::<Vec<_>>()
            .join("; "),
        num(record.coordinates.map(|c| c.lat.to_string())),
        num(record.coordinates.map(|c| c.lon.to_string())),
        opt(&record.photo),
        opt(&record.org_url),
    ]
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row(out: &mut String, row: impl IntoIterator<Item = String>) {
    let mut first = true;
    for cell in row {
        if !first {
            out.push(',');
        }
        first = false;
        if needs_quotes(&cell) {
            let _ = write!(out, "\"{}\"", cell.replace('"', "\"\""));
        } else {
            out.push_str(&cell);
        }
    }
    out.push('\n');
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "run".to_string()
    } else {
        cleaned
    }
}
