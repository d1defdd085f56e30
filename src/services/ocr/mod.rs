// OCR capability: orientation detection, structured and plain-text recognition

pub mod parse;
pub mod tesseract;

use image::DynamicImage;

use crate::core::errors::{EngineResult, OrientationError};
use crate::core::types::{OcrConfig, OrientationReport, WordObservation};

pub use tesseract::TesseractEngine;

/// OCR engine consumed by the recognition pipeline.
///
/// Calls are blocking. Implementations are shared across threads and must not
/// keep per-call state.
pub trait OcrEngine: Send + Sync {
    fn detect_orientation(
        &self,
        image: &DynamicImage,
    ) -> Result<OrientationReport, OrientationError>;

    fn recognize_text(&self, image: &DynamicImage, config: &OcrConfig) -> EngineResult<String>;

    /// One observation per recognised word, in engine order
    fn recognize_structured(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> EngineResult<Vec<WordObservation>>;
}
