pub mod engine;
pub mod enhance;
pub mod extract;
pub mod preprocess;
pub mod region;
pub mod setup;
pub mod validate;

pub use engine::{OcrAdapter, OcrEngine, TesseractEngine, TesseractSettings};
pub use extract::parse_reading;
pub use preprocess::{preprocess, preprocess_file, PreprocessParams, Preprocessed};
pub use region::{locate_regions, Rectangle, RegionSpec, RoiPair};
pub use validate::{format_reading, validate_reading, ValidationResult};

use std::path::Path;

use image::{DynamicImage, GrayImage};

use crate::error::Result;

/// Everything produced while reading one photo.
///
/// `result` is what callers normally want; the images and raw texts are kept
/// for debug archival.
#[derive(Clone, Debug)]
pub struct ImageReading {
    pub result: ValidationResult,
    pub temperature_text: String,
    pub humidity_text: String,
    pub original: DynamicImage,
    pub binarized: GrayImage,
    pub rois: RoiPair,
}

/// Reads temperature and humidity from HTC-2 display photos.
pub struct HygrometerReader {
    adapter: OcrAdapter,
    params: PreprocessParams,
}

impl HygrometerReader {
    pub fn new(engine: Box<dyn OcrEngine>, params: PreprocessParams) -> Self {
        Self {
            adapter: OcrAdapter::new(engine),
            params,
        }
    }

    /// High-level function: photo file → validated reading.
    pub fn process_image(&self, path: &Path, regions: &RegionSpec) -> Result<ImageReading> {
        log::info!("Processing {}", path.display());
        let preprocessed = preprocess_file(path, &self.params)?;
        self.process_preprocessed(preprocessed, regions)
    }

    /// Same as [`Self::process_image`] for an already decoded image.
    pub fn process_decoded(&self, raw: &DynamicImage, regions: &RegionSpec) -> Result<ImageReading> {
        let preprocessed = preprocess(raw, &self.params)?;
        self.process_preprocessed(preprocessed, regions)
    }

    fn process_preprocessed(
        &self,
        preprocessed: Preprocessed,
        regions: &RegionSpec,
    ) -> Result<ImageReading> {
        let Preprocessed {
            original,
            binarized,
        } = preprocessed;

        let rois = locate_regions(&binarized, regions)?;
        log::debug!(
            "Regions: temperature {:?}, humidity {:?}",
            rois.temperature.dimensions(),
            rois.humidity.dimensions()
        );

        let temperature_text = self.adapter.recognize_digits(&rois.temperature)?;
        let humidity_text = self.adapter.recognize_digits(&rois.humidity)?;
        log::info!("  temperature text: '{}'", temperature_text);
        log::info!("  humidity text: '{}'", humidity_text);

        let temperature = parse_reading(&temperature_text);
        let humidity = parse_reading(&humidity_text);
        let result = validate_reading(temperature, humidity);

        for warning in &result.warnings {
            log::warn!("  {}", warning);
        }

        Ok(ImageReading {
            result,
            temperature_text,
            humidity_text,
            original,
            binarized,
            rois,
        })
    }
}
