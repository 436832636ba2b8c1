//! Locating the Tesseract installation.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ReadingError, Result};

/// Returns the per-user directory where a private Tesseract copy may live.
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("htc2-reader")
        .join("tesseract")
}

fn executable_name() -> &'static str {
    if cfg!(windows) { "tesseract.exe" } else { "tesseract" }
}

/// Well-known install locations, checked after the local dir and PATH.
const COMMON_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

/// True when `<program> --version` can be started and exits successfully.
fn runs_version(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Finds the Tesseract executable.
///
/// An explicitly configured value must be an existing file or a command that
/// runs (e.g. `tesseract` resolved through PATH). Otherwise the local data dir
/// is checked first, then PATH, then common install locations.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() || runs_version(path) {
            return Ok(path.to_path_buf());
        }
        return Err(ReadingError::EngineUnavailable(format!(
            "configured Tesseract executable not found: {}",
            path.display()
        )));
    }

    let local_exe = get_tesseract_dir().join(executable_name());
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if runs_version(Path::new("tesseract")) {
        return Ok(PathBuf::from("tesseract"));
    }

    for path in COMMON_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            log::debug!("Found Tesseract at {}", p.display());
            return Ok(p);
        }
    }

    Err(ReadingError::EngineUnavailable(
        "Tesseract not found. Install Tesseract-OCR or set tesseract_path in config.json".into(),
    ))
}

/// Finds a tessdata directory containing `<language>.traineddata`.
///
/// Returns `None` when Tesseract should fall back to its built-in default.
/// An explicit directory is returned as-is, even if the model file is missing,
/// so that Tesseract reports the problem itself.
pub fn find_tessdata_dir(explicit: Option<&Path>, language: &str) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }

    let model = format!("{}.traineddata", language);

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join(&model).exists() {
        return Some(local_tessdata);
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join(&model).exists() {
            return Some(p);
        }
        let p = p.join("tessdata");
        if p.join(&model).exists() {
            return Some(p);
        }
    }

    None
}
