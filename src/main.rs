//! HTC-2 Reader
//!
//! Reads temperature and humidity values from photos of an HTC-2 digital
//! hygrometer display using image preprocessing and Tesseract OCR.

mod batch;
mod calibration;
mod cli;
mod config;
mod error;
mod logging;
mod ocr;
mod paths;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::{Path, PathBuf};

use calibration::RoiCoordinates;
use cli::{CliArgs, Command};
use config::AppConfig;
use ocr::{
    format_reading, HygrometerReader, Rectangle, RegionSpec, TesseractEngine, ValidationResult,
};

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log::error!("[PANIC]{} {}", location, msg);
        eprintln!("[PANIC]{} {}", location, msg);
    }));

    let args = CliArgs::parse();

    let log_file = match paths::ensure_directories() {
        Ok(()) => Some(paths::get_log_file()),
        Err(e) => {
            eprintln!("Cannot create logs directory: {}", e);
            None
        }
    };
    let initial_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let log_handle = logging::init(initial_level, log_file.as_deref())?;

    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);
    if !args.verbose {
        logging::set_level(&log_handle, config.level_filter(), log_file.as_deref())?;
    }

    match args.command {
        Command::Process {
            image,
            roi,
            display,
            debug,
        } => {
            let regions = resolve_regions(display, roi.as_deref().unwrap_or(&config.roi_file))?;
            let reader = build_reader(&config, args.tesseract)?;
            process_single(&reader, &image, &regions, &config, debug)
        }
        Command::Batch { dir, roi, output } => {
            let regions = resolve_regions(None, roi.as_deref().unwrap_or(&config.roi_file))?;
            let reader = build_reader(&config, args.tesseract)?;
            let debug_dir = config.save_debug.then_some(config.debug_dir.as_path());
            let summary = batch::run_batch(&reader, &dir, &regions, &output, debug_dir)?;
            println!(
                "Processed {} images ({} skipped). Results saved to {}",
                summary.records.len(),
                summary.skipped.len(),
                summary.csv_path.display()
            );
            Ok(())
        }
        Command::SaveRoi {
            temperature,
            humidity,
            roi,
        } => {
            let path = roi.unwrap_or_else(|| config.roi_file.clone());
            RoiCoordinates {
                temperature,
                humidity,
            }
            .save(&path)?;
            Ok(())
        }
    }
}

/// Creates the reader backed by Tesseract.
fn build_reader(config: &AppConfig, tesseract: Option<PathBuf>) -> Result<HygrometerReader> {
    let mut settings = config.tesseract_settings();
    if tesseract.is_some() {
        settings.executable = tesseract;
    }
    let engine = TesseractEngine::new(&settings)?;
    Ok(HygrometerReader::new(
        Box::new(engine),
        config.preprocess.clone(),
    ))
}

/// Picks the region mode: an explicit display rectangle wins, then the ROI
/// file if it exists, otherwise automatic detection.
fn resolve_regions(display: Option<Rectangle>, roi_file: &Path) -> Result<RegionSpec> {
    if let Some(display) = display {
        return Ok(RegionSpec::Display(display));
    }
    match RoiCoordinates::load_optional(roi_file)? {
        Some(coords) => {
            log::info!("Using ROI coordinates from {}", roi_file.display());
            Ok(coords.region_spec())
        }
        None => {
            log::debug!("No ROI file at {}, detecting display", roi_file.display());
            Ok(RegionSpec::Auto)
        }
    }
}

fn process_single(
    reader: &HygrometerReader,
    image: &Path,
    regions: &RegionSpec,
    config: &AppConfig,
    debug: bool,
) -> Result<()> {
    let reading = reader.process_image(image, regions)?;

    if debug || config.save_debug {
        let tag = image
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        batch::debug::save_debug_images(&config.debug_dir, &tag, &reading, &Local::now())?;
    }

    print!("{}", format_report(&reading.result));
    Ok(())
}

fn format_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", format_reading(v), unit),
        None => "failed to read".to_string(),
    }
}

/// Human-readable summary of one reading.
fn format_report(result: &ValidationResult) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "Temperature: {}\n",
        format_value(result.temperature, "°C")
    ));
    report.push_str(&format!("Humidity: {}\n", format_value(result.humidity, "%")));
    report.push_str(if result.valid {
        "Status: VALID\n"
    } else {
        "Status: INVALID\n"
    });
    for warning in &result.warnings {
        report.push_str(&format!("  - {}\n", warning));
    }
    report
}
