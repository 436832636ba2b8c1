//! ROI coordinate file.
//!
//! Stores the calibrated temperature and humidity rectangles as
//! `label=x,y,width,height` lines so a fixed camera setup only has to be
//! measured once.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{ReadingError, Result};
use crate::ocr::{Rectangle, RegionSpec};

const TEMPERATURE_LABEL: &str = "temperature";
const HUMIDITY_LABEL: &str = "humidity";

/// Calibrated rectangles for both readings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoiCoordinates {
    pub temperature: Rectangle,
    pub humidity: Rectangle,
}

impl RoiCoordinates {
    /// Parses the file contents. Blank lines and `#` comments are ignored;
    /// a repeated label overrides the earlier one.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut temperature = None;
        let mut humidity = None;

        for (idx, raw_line) in contents.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (label, value) = line.split_once('=').ok_or_else(|| ReadingError::RoiConfig {
                line: line_num,
                message: format!("expected label=x,y,width,height, got '{}'", line),
            })?;

            let rect: Rectangle = value.parse().map_err(|message| ReadingError::RoiConfig {
                line: line_num,
                message,
            })?;
            if rect.width == 0 || rect.height == 0 {
                return Err(ReadingError::RoiConfig {
                    line: line_num,
                    message: format!("rectangle {} has zero size", rect),
                });
            }

            match label.trim() {
                TEMPERATURE_LABEL => temperature = Some(rect),
                HUMIDITY_LABEL => humidity = Some(rect),
                other => {
                    return Err(ReadingError::RoiConfig {
                        line: line_num,
                        message: format!("unknown label '{}'", other),
                    });
                }
            }
        }

        let missing = |label: &str| ReadingError::RoiConfig {
            line: 0,
            message: format!("missing '{}' entry", label),
        };
        Ok(Self {
            temperature: temperature.ok_or_else(|| missing(TEMPERATURE_LABEL))?,
            humidity: humidity.ok_or_else(|| missing(HUMIDITY_LABEL))?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like [`Self::load`], but a missing file means "not calibrated".
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        match Self::load(path) {
            Ok(coords) => Ok(Some(coords)),
            Err(ReadingError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn to_file_contents(&self) -> String {
        format!(
            "{}={}\n{}={}\n",
            TEMPERATURE_LABEL, self.temperature, HUMIDITY_LABEL, self.humidity
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_file_contents())?;
        log::info!("ROI coordinates saved to {}", path.display());
        Ok(())
    }

    pub fn region_spec(&self) -> RegionSpec {
        RegionSpec::Separate {
            temperature: self.temperature,
            humidity: self.humidity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_both_labels() {
        let coords = RoiCoordinates::parse("temperature=10,20,100,40\nhumidity=10,70,100,40\n").unwrap();
        assert_eq!(coords.temperature, Rectangle::new(10, 20, 100, 40));
        assert_eq!(coords.humidity, Rectangle::new(10, 70, 100, 40));
    }

    #[test]
    fn test_parse_ignores_comments_and_blank_lines() {
        let contents = "# bench camera\n\n humidity = 1,2,3,4 \ntemperature=5,6,7,8\n";
        let coords = RoiCoordinates::parse(contents).unwrap();
        assert_eq!(coords.humidity, Rectangle::new(1, 2, 3, 4));
        assert_eq!(coords.temperature, Rectangle::new(5, 6, 7, 8));
    }

    #[test]
    fn test_parse_reports_line_numbers() {
        let err = RoiCoordinates::parse("temperature=1,2,3,4\nhumidity=1,2,x,4\n").unwrap_err();
        assert!(matches!(err, ReadingError::RoiConfig { line: 2, .. }));

        let err = RoiCoordinates::parse("temperature=1,2,3,4\npressure=1,2,3,4\n").unwrap_err();
        assert!(matches!(err, ReadingError::RoiConfig { line: 2, .. }));

        let err = RoiCoordinates::parse("temperature 1,2,3,4\n").unwrap_err();
        assert!(matches!(err, ReadingError::RoiConfig { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_missing_label_and_empty_rect() {
        let err = RoiCoordinates::parse("temperature=1,2,3,4\n").unwrap_err();
        assert!(err.to_string().contains("humidity"));

        let err = RoiCoordinates::parse("temperature=1,2,0,4\nhumidity=1,2,3,4\n").unwrap_err();
        assert!(matches!(err, ReadingError::RoiConfig { line: 1, .. }));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("roi_config.txt");
        let coords = RoiCoordinates {
            temperature: Rectangle::new(12, 34, 56, 78),
            humidity: Rectangle::new(12, 120, 56, 70),
        };

        coords.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "temperature=12,34,56,78\nhumidity=12,120,56,70\n");
        assert_eq!(RoiCoordinates::load(&path).unwrap(), coords);
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(RoiCoordinates::load_optional(&dir.path().join("none.txt")).unwrap(), None);
    }

    #[test]
    fn test_region_spec_is_separate() {
        let coords = RoiCoordinates {
            temperature: Rectangle::new(0, 0, 5, 5),
            humidity: Rectangle::new(0, 5, 5, 5),
        };
        assert_eq!(
            coords.region_spec(),
            RegionSpec::Separate {
                temperature: Rectangle::new(0, 0, 5, 5),
                humidity: Rectangle::new(0, 5, 5, 5),
            }
        );
    }
}
