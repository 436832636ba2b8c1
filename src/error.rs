//! Error taxonomy for the image-to-reading pipeline.
//!
//! Only two conditions abort the processing of an image: an input that
//! cannot be decoded, and an OCR engine that cannot be invoked at all.
//! Recognition failures and out-of-range values are ordinary data and
//! show up as warnings in [`crate::ocr::ValidationResult`] instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::ocr::region::Rectangle;

#[derive(Debug, Error)]
pub enum ReadingError {
    /// The source image is missing, corrupt or in an unsupported format.
    #[error("cannot read image {}: {source}", path.display())]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("region {rect} does not fit inside a {width}x{height} image")]
    RegionOutOfBounds {
        rect: Rectangle,
        width: u32,
        height: u32,
    },

    /// The OCR engine could not be started or crashed. Fatal for the whole run.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("invalid ROI configuration at line {line}: {message}")]
    RoiConfig { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReadingError {
    /// Returns true when the error must stop a batch rather than skip one image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadingError::EngineUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ReadingError>;
