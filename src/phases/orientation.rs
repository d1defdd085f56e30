// Orientation resolution: one orientation query mapped to a discrete rotation

use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::errors::OrientationError;
use crate::core::types::{OrientationReport, RotationAction};
use crate::services::ocr::OcrEngine;
use crate::utils::Metrics;

/// Asks the OCR engine which way up the label is.
///
/// Orientation is best effort: when the engine cannot decide, the image is
/// used as is.
pub struct OrientationResolver {
    engine: Arc<dyn OcrEngine>,
    metrics: Option<Metrics>,
}

impl OrientationResolver {
    pub fn new(engine: Arc<dyn OcrEngine>, metrics: Option<Metrics>) -> Self {
        Self { engine, metrics }
    }

    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn determine_rotation(&self, image: &DynamicImage) -> RotationAction {
        match self.engine.detect_orientation(image) {
            Ok(report) => {
                let action = rotation_for(&report);
                debug!(
                    "Orientation {}°, rotate {}° (confidence {:.2}) -> {:?}",
                    report.orientation, report.rotate, report.orientation_confidence, action
                );
                action
            }
            Err(e) => {
                self.record_fallback(&e);
                RotationAction::None
            }
        }
    }

    fn record_fallback(&self, error: &OrientationError) {
        warn!("Orientation unknown, continuing without rotation: {}", error);
        if let Some(metrics) = &self.metrics {
            metrics.record_orientation_fallback();
        }
    }
}

/// Rotation that makes the reported text upright
pub fn rotation_for(report: &OrientationReport) -> RotationAction {
    RotationAction::from_degrees(report.rotate)
}
