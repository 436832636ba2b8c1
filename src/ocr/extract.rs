use std::sync::LazyLock;

use regex::Regex;

/// Signed decimal number: optional sign, digits, optional fraction.
const NUMBER_PATTERN: &str = r"[-+]?\d*\.?\d+";

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NUMBER_PATTERN).expect("NUMBER_PATTERN is a valid regex"));

/// Extracts the first number in raw OCR text.
///
/// Only the first match counts; any further numeric fragments (glare
/// artifacts, stray segments) are ignored. Returns `None` when the text holds
/// no number or the match does not convert to `f64`.
pub fn parse_reading(text: &str) -> Option<f64> {
    let cleaned = text.trim();
    let token = NUMBER_REGEX.find(cleaned)?;
    match token.as_str().parse::<f64>() {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Could not convert '{}' to a number: {}", token.as_str(), e);
            None
        }
    }
}
