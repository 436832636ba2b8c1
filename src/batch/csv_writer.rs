//! CSV writer for batch results.
//!
//! Writes one row per processed photo in append-only mode, so rows written
//! before a crash or an aborted batch are kept.
//! Each row contains: timestamp, file name, temperature, humidity and the validity flag.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::ocr::{format_reading, ValidationResult};

/// CSV header row.
const CSV_HEADER: &str = "timestamp,filename,temperature,humidity,valid";

/// One processed photo.
#[derive(Clone, Debug)]
pub struct BatchRecord {
    pub processed_at: DateTime<Local>,
    pub filename: String,
    pub result: ValidationResult,
}

/// Initializes CSV file with header if it doesn't exist or is empty.
///
/// If the file exists and has content, this does nothing (preserves existing data).
pub fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    Ok(())
}

/// Quotes a field if it contains a separator, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Absent readings are written as empty fields.
fn format_value(value: Option<f64>) -> String {
    value.map(format_reading).unwrap_or_default()
}

fn format_row(record: &BatchRecord) -> String {
    format!(
        "{},{},{},{},{}",
        record.processed_at.format("%Y-%m-%d %H:%M:%S"),
        escape_field(&record.filename),
        format_value(record.result.temperature),
        format_value(record.result.humidity),
        record.result.valid,
    )
}

/// Appends one result row to the CSV file.
pub fn append_to_csv(path: &Path, record: &BatchRecord) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open CSV for append")?;

    writeln!(file, "{}", format_row(record)).context("Failed to write CSV row")?;
    Ok(())
}
