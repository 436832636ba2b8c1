use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::imageops::FilterType;
use image::GrayImage;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::error::{ReadingError, Result};

/// Upscaling factor applied to every ROI before recognition.
/// Seven-segment crops are only a few dozen pixels tall; Tesseract needs more.
pub const UPSCALE_FACTOR: u32 = 3;

/// Tesseract page segmentation mode 7: treat the image as a single text line.
pub const PSM_SINGLE_LINE: u8 = 7;

/// Anything that turns an image into text.
///
/// Implementations must be reusable for many images in sequence. Failing to
/// run at all is reported as [`ReadingError::EngineUnavailable`].
pub trait OcrEngine {
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}

/// How to invoke Tesseract.
#[derive(Clone, Debug)]
pub struct TesseractSettings {
    /// Explicit executable; searched for when `None`
    pub executable: Option<PathBuf>,
    /// Explicit tessdata directory; Tesseract's default when `None`
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    pub page_segmentation_mode: u8,
}

impl Default for TesseractSettings {
    fn default() -> Self {
        Self {
            executable: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            page_segmentation_mode: PSM_SINGLE_LINE,
        }
    }
}

/// Runs the Tesseract CLI in digits-only mode, one process per image.
#[derive(Debug)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractEngine {
    /// Resolves the executable and checks that it actually runs.
    pub fn new(settings: &TesseractSettings) -> Result<Self> {
        let executable = find_tesseract_executable(settings.executable.as_deref())?;
        let tessdata_dir = find_tessdata_dir(settings.tessdata_dir.as_deref(), &settings.language);

        let output = Command::new(&executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                ReadingError::EngineUnavailable(format!(
                    "cannot run {}: {}",
                    executable.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(ReadingError::EngineUnavailable(format!(
                "{} --version exited with {}",
                executable.display(),
                output.status
            )));
        }

        // Tesseract 4 printed its version to stderr, 5 prints to stdout
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).to_string()
        };
        log::info!(
            "Using {} ({})",
            executable.display(),
            banner.lines().next().unwrap_or("unknown version")
        );
        if let Some(dir) = &tessdata_dir {
            log::info!("Using tessdata at {}", dir.display());
        }

        Ok(Self {
            executable,
            tessdata_dir,
            language: settings.language.clone(),
            page_segmentation_mode: settings.page_segmentation_mode,
        })
    }
}

impl TesseractEngine {
    /// Command line for one recognition: `<input> stdout [--tessdata-dir DIR]
    /// -l <language> --psm <mode> digits`.
    fn tesseract_args(&self, input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.into(), "stdout".into()];
        if let Some(dir) = &self.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.into());
        }
        args.push("-l".into());
        args.push(self.language.as_str().into());
        args.push("--psm".into());
        args.push(self.page_segmentation_mode.to_string().into());
        // Restrict output to 0-9, '-' and '.'
        args.push("digits".into());
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .map_err(|e| ReadingError::Io(std::io::Error::other(e)))?;

        let output = Command::new(&self.executable)
            .args(self.tesseract_args(temp_input.path()))
            .output()
            .map_err(|e| {
                ReadingError::EngineUnavailable(format!(
                    "cannot run {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReadingError::EngineUnavailable(format!(
                "Tesseract failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Scales an image by an integer factor with cubic interpolation.
pub fn upscale(image: &GrayImage, factor: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    image::imageops::resize(
        image,
        width * factor,
        height * factor,
        FilterType::CatmullRom,
    )
}

/// Boundary between the pipeline and the OCR engine.
///
/// Upscales each ROI and hands it to the engine, returning the text without
/// interpreting it.
pub struct OcrAdapter {
    engine: Box<dyn OcrEngine>,
}

impl OcrAdapter {
    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Recognizes the digits in one ROI; returns trimmed raw text.
    ///
    /// An empty ROI gives empty text without calling the engine.
    pub fn recognize_digits(&self, roi: &GrayImage) -> Result<String> {
        if roi.width() == 0 || roi.height() == 0 {
            return Ok(String::new());
        }
        let resized = upscale(roi, UPSCALE_FACTOR);
        let text = self.engine.recognize(&resized)?;
        Ok(text.trim().to_string())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::ScriptedEngine;
    use super::*;
    use image::Luma;

    #[test]
    fn test_upscale_triples_dimensions() {
        let img = GrayImage::from_pixel(7, 4, Luma([255]));
        let scaled = upscale(&img, UPSCALE_FACTOR);
        assert_eq!(scaled.dimensions(), (21, 12));
        assert!(scaled.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_recognize_digits_upscales_and_trims() {
        let engine = Arc::new(ScriptedEngine::new(&["  23.5\n\x0c"]));
        let adapter = OcrAdapter::new(Box::new(engine.clone()));

        let roi = GrayImage::new(10, 6);
        assert_eq!(adapter.recognize_digits(&roi).unwrap(), "23.5");
        assert_eq!(*engine.seen.lock().unwrap(), vec![(30, 18)]);
    }

    #[test]
    fn test_recognize_digits_skips_empty_roi() {
        let engine = Arc::new(ScriptedEngine::new(&["99"]));
        let adapter = OcrAdapter::new(Box::new(engine.clone()));

        assert_eq!(adapter.recognize_digits(&GrayImage::new(10, 0)).unwrap(), "");
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_engine_failure_propagates() {
        let adapter = OcrAdapter::new(Box::new(ScriptedEngine::unavailable()));
        let err = adapter.recognize_digits(&GrayImage::new(4, 4)).unwrap_err();
        assert!(err.is_fatal());
    }

    fn engine(tessdata_dir: Option<&str>) -> TesseractEngine {
        TesseractEngine {
            executable: PathBuf::from("tesseract"),
            tessdata_dir: tessdata_dir.map(PathBuf::from),
            language: "eng".to_string(),
            page_segmentation_mode: PSM_SINGLE_LINE,
        }
    }

    #[test]
    fn test_tesseract_args_single_line_digits() {
        let args = engine(None).tesseract_args(Path::new("/tmp/roi.png"));
        let expected: Vec<OsString> = ["/tmp/roi.png", "stdout", "-l", "eng", "--psm", "7", "digits"]
            .iter()
            .map(OsString::from)
            .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_tesseract_args_with_tessdata_dir() {
        let mut engine = engine(Some("/opt/tessdata"));
        engine.language = "lcd".to_string();
        let args = engine.tesseract_args(Path::new("roi.png"));
        let expected: Vec<OsString> = [
            "roi.png",
            "stdout",
            "--tessdata-dir",
            "/opt/tessdata",
            "-l",
            "lcd",
            "--psm",
            "7",
            "digits",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let settings = TesseractSettings {
            executable: Some(PathBuf::from("/nonexistent/tesseract-binary")),
            ..TesseractSettings::default()
        };
        let err = TesseractEngine::new(&settings).unwrap_err();
        assert!(matches!(err, ReadingError::EngineUnavailable(_)));
    }
}
