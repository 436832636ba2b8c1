use std::ops::RangeInclusive;

use serde::Serialize;

/// Rated sensing range of the HTC-2 thermometer, in °C.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -40.0..=80.0;

/// Relative humidity range, in %.
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Formats a reading the way it is reported: whole numbers keep one decimal
/// place (`95.0`), other values use the shortest exact form (`23.25`).
pub fn format_reading(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Outcome of range-checking one temperature/humidity pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationResult {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub temperature_valid: bool,
    pub humidity_valid: bool,
    /// Both readings present and in range
    pub valid: bool,
    /// Temperature warning first, then humidity; at most one each
    pub warnings: Vec<String>,
}

/// Checks parsed readings against the physical ranges of the device.
///
/// Missing and out-of-range values are not errors: they mark the field
/// invalid and add a warning.
pub fn validate_reading(temperature: Option<f64>, humidity: Option<f64>) -> ValidationResult {
    let mut warnings = Vec::new();

    let temperature_valid = match temperature {
        Some(t) if TEMPERATURE_RANGE.contains(&t) => true,
        Some(t) => {
            warnings.push(format!(
                "Temperature {}°C outside normal range (-40 to 80°C)",
                format_reading(t)
            ));
            false
        }
        None => {
            warnings.push("Failed to read temperature value".to_string());
            false
        }
    };

    let humidity_valid = match humidity {
        Some(h) if HUMIDITY_RANGE.contains(&h) => true,
        Some(h) => {
            warnings.push(format!(
                "Humidity {}% outside normal range (0-100%)",
                format_reading(h)
            ));
            false
        }
        None => {
            warnings.push("Failed to read humidity value".to_string());
            false
        }
    };

    ValidationResult {
        temperature,
        humidity,
        temperature_valid,
        humidity_valid,
        valid: temperature_valid && humidity_valid,
        warnings,
    }
}
