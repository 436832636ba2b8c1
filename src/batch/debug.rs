//! Debug image archival.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::ImageReading;

/// Saves the original photo, the binarized image and both ROIs as PNG.
///
/// File names are `<tag>_<kind>_<YYYYmmdd_HHMMSS>.png`. Returns the written paths.
pub fn save_debug_images(
    dir: &Path,
    tag: &str,
    reading: &ImageReading,
    at: &DateTime<Local>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create debug directory {}", dir.display()))?;

    let timestamp = at.format("%Y%m%d_%H%M%S");
    let path_for = |kind: &str| dir.join(format!("{}_{}_{}.png", tag, kind, timestamp));

    let mut written = Vec::with_capacity(4);

    let original = path_for("original");
    reading
        .original
        .save(&original)
        .with_context(|| format!("Failed to save {}", original.display()))?;
    written.push(original);

    for (kind, image) in [
        ("processed", &reading.binarized),
        ("temp_roi", &reading.rois.temperature),
        ("humidity_roi", &reading.rois.humidity),
    ] {
        // Zero-sized crops cannot be encoded
        if image.width() == 0 || image.height() == 0 {
            log::debug!("Skipping empty {} debug image", kind);
            continue;
        }
        let path = path_for(kind);
        image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        written.push(path);
    }

    log::info!("Debug images saved to {}", dir.display());
    Ok(written)
}
