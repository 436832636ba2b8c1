//! Application configuration.
//!
//! Loads settings from config.json at startup. Provides the OCR engine
//! location, file locations and preprocessing parameters. The loaded value is
//! passed explicitly to whatever needs it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::engine::PSM_SINGLE_LINE;
use crate::ocr::{PreprocessParams, TesseractSettings};

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tesseract executable; auto-detected when absent
    pub tesseract_path: Option<PathBuf>,
    /// Directory holding `<language>.traineddata`
    pub tessdata_dir: Option<PathBuf>,
    /// Tesseract language model
    pub ocr_language: String,
    /// Tesseract page segmentation mode (7 = single text line)
    pub page_segmentation_mode: u8,
    /// ROI coordinate file; auto-detection is used when it does not exist
    pub roi_file: PathBuf,
    /// Where debug images are written
    pub debug_dir: PathBuf,
    /// Write debug images for every processed photo
    pub save_debug: bool,
    /// One of error, warn, info, debug, trace
    pub log_level: String,
    pub preprocess: PreprocessParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            ocr_language: "eng".to_string(),
            page_segmentation_mode: PSM_SINGLE_LINE,
            roi_file: PathBuf::from("roi_config.txt"),
            debug_dir: PathBuf::from("debug_output"),
            save_debug: false,
            log_level: "info".to_string(),
            preprocess: PreprocessParams::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, or returns defaults.
    ///
    /// A missing or broken file is not fatal; the problem is logged and the
    /// defaults are used instead.
    pub fn load(path: &Path) -> Self {
        log::debug!("Looking for config at: {}", path.display());

        if !path.exists() {
            log::info!("{} not found. Using default config.", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Looks for config.json next to the executable, then in the working directory.
    pub fn default_path() -> PathBuf {
        let beside_exe = crate::paths::get_exe_dir().join("config.json");
        if beside_exe.exists() {
            beside_exe
        } else {
            PathBuf::from("config.json")
        }
    }

    pub fn tesseract_settings(&self) -> TesseractSettings {
        TesseractSettings {
            executable: self.tesseract_path.clone(),
            tessdata_dir: self.tessdata_dir.clone(),
            language: self.ocr_language.clone(),
            page_segmentation_mode: self.page_segmentation_mode,
        }
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.preprocess.threshold_block_size, 11);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "tesseract_path": "/opt/tesseract/bin/tesseract",
                "save_debug": true,
                "preprocess": { "threshold_offset": 5 }
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(
            config.tesseract_path,
            Some(PathBuf::from("/opt/tesseract/bin/tesseract"))
        );
        assert!(config.save_debug);
        assert_eq!(config.preprocess.threshold_offset, 5);
        assert_eq!(config.preprocess.clahe_tile_grid, 8);
        assert_eq!(config.ocr_language, "eng");
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn test_tesseract_settings_follow_config() {
        let config = AppConfig {
            ocr_language: "digits_lcd".to_string(),
            page_segmentation_mode: 8,
            ..AppConfig::default()
        };
        let settings = config.tesseract_settings();
        assert_eq!(settings.language, "digits_lcd");
        assert_eq!(settings.page_segmentation_mode, 8);
        assert!(settings.executable.is_none());
    }

    #[test]
    fn test_level_filter() {
        let mut config = AppConfig::default();
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
        config.log_level = "debug".to_string();
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
        config.log_level = "loud".to_string();
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }
}
