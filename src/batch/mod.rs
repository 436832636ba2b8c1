//! Folder processing with CSV export.
//!
//! This module provides:
//! - Discovery of photos in a folder
//! - Sequential processing with per-image error isolation
//! - Append-only CSV output
//! - Optional debug image archival

pub mod csv_writer;
pub mod debug;

pub use csv_writer::BatchRecord;

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::{HygrometerReader, RegionSpec};

/// Extensions accepted as photos (compared case-insensitively).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Result of a batch run.
#[derive(Debug)]
pub struct BatchSummary {
    pub csv_path: PathBuf,
    pub records: Vec<BatchRecord>,
    /// Photos that could not be decoded or cropped
    pub skipped: Vec<PathBuf>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Lists photo files in `dir`, sorted by name. Subdirectories are not searched.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read folder {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Processes every photo in `dir` and writes `results_<timestamp>.csv` to `output_dir`.
///
/// A photo that cannot be read is logged and skipped. An unavailable OCR
/// engine aborts the run; rows written so far stay in the CSV.
pub fn run_batch(
    reader: &HygrometerReader,
    dir: &Path,
    regions: &RegionSpec,
    output_dir: &Path,
    debug_dir: Option<&Path>,
) -> Result<BatchSummary> {
    let images = list_images(dir)?;
    log::info!("Found {} images in {}", images.len(), dir.display());

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output folder {}", output_dir.display()))?;
    let csv_path = output_dir.join(format!(
        "results_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    csv_writer::init_csv(&csv_path)?;

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (idx, path) in images.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        log::info!("[{}/{}] {}", idx + 1, images.len(), filename);

        let reading = match reader.process_image(path, regions) {
            Ok(reading) => reading,
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| {
                    format!("Batch aborted at {} ({} rows written)", filename, records.len())
                });
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", filename, e);
                skipped.push(path.clone());
                continue;
            }
        };

        let processed_at = Local::now();
        if let Some(debug_dir) = debug_dir {
            let tag = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string());
            if let Err(e) = debug::save_debug_images(debug_dir, &tag, &reading, &processed_at) {
                log::warn!("Could not save debug images for {}: {:#}", filename, e);
            }
        }

        let record = BatchRecord {
            processed_at,
            filename,
            result: reading.result,
        };
        csv_writer::append_to_csv(&csv_path, &record)?;
        records.push(record);
    }

    let valid = records.iter().filter(|r| r.result.valid).count();
    log::info!(
        "Batch complete: {} processed ({} valid), {} skipped. Results: {}",
        records.len(),
        valid,
        skipped.len(),
        csv_path.display()
    );

    Ok(BatchSummary {
        csv_path,
        records,
        skipped,
    })
}
