// Recognition Orchestrator: preprocess, orient, gated extraction with one fallback, split

use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::core::errors::{ProcessingError, ProcessingResult, QualityError};
use crate::core::types::{
    AttemptStage, ExtractionAttempt, OcrConfig, PipelineConfig, RecognitionOutcome,
    RotationAction,
};
use crate::phases::{split_fragments, OrientationResolver, Preprocessor, QualityGatedExtractor};
use crate::services::ocr::OcrEngine;
use crate::services::vision::VisionOps;
use crate::utils::Metrics;

/// Turns one decoded label photo into ordered text fragments.
///
/// Holds no per-call state; one instance can serve concurrent callers.
pub struct RecognitionOrchestrator {
    vision: Arc<dyn VisionOps>,
    preprocessor: Preprocessor,
    orientation: OrientationResolver,
    extractor: QualityGatedExtractor,
    config: PipelineConfig,
    metrics: Option<Metrics>,
}

impl RecognitionOrchestrator {
    pub fn new(
        vision: Arc<dyn VisionOps>,
        engine: Arc<dyn OcrEngine>,
        config: PipelineConfig,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            preprocessor: Preprocessor::new(vision.clone()),
            orientation: OrientationResolver::new(engine.clone(), metrics.clone()),
            extractor: QualityGatedExtractor::new(engine, config.quality),
            vision,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ordered fragments of the accepted label text
    pub fn process(&self, image: &DynamicImage) -> ProcessingResult<Vec<String>> {
        self.process_detailed(image).map(|outcome| outcome.fragments)
    }

    /// Same as [`process`](Self::process), also reporting the rotation and attempts made
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn process_detailed(&self, image: &DynamicImage) -> ProcessingResult<RecognitionOutcome> {
        let start = Instant::now();
        let result = self.run(image);

        if let Some(metrics) = &self.metrics {
            metrics.record_image_processed(start.elapsed());
            if result.is_err() {
                metrics.record_processing_failure();
            }
        }

        result
    }

    fn run(&self, image: &DynamicImage) -> ProcessingResult<RecognitionOutcome> {
        let preprocessed = self.preprocessor.preprocess(image);

        // Orientation is queried once, on the preprocessed image
        let rotation = self.orientation.determine_rotation(&preprocessed);
        let upright = if rotation.is_none() {
            preprocessed
        } else {
            if let Some(metrics) = &self.metrics {
                metrics.record_rotation_applied();
            }
            debug!("Applying {:?}", rotation);
            self.vision.rotate(&preprocessed, rotation)
        };

        let mut attempts = Vec::with_capacity(2);

        let primary = match self.attempt(
            &upright,
            AttemptStage::Primary,
            &self.config.primary,
            &mut attempts,
        ) {
            Ok(text) => return Ok(self.accept(text, rotation, attempts)),
            Err(e) => e,
        };

        let fallback = match self.attempt(
            &upright,
            AttemptStage::Fallback,
            &self.config.fallback,
            &mut attempts,
        ) {
            Ok(text) => return Ok(self.accept(text, rotation, attempts)),
            Err(e) => e,
        };

        let err = ProcessingError::AllAttemptsRejected { primary, fallback };
        error!("{}", err);
        Err(err)
    }

    fn attempt(
        &self,
        image: &DynamicImage,
        stage: AttemptStage,
        config: &OcrConfig,
        attempts: &mut Vec<ExtractionAttempt>,
    ) -> Result<String, QualityError> {
        let result = self.extractor.analyse(image, config);

        attempts.push(ExtractionAttempt {
            stage,
            config: config.clone(),
            raw_text: result.as_ref().ok().cloned().unwrap_or_default(),
            quality_verdict: result.is_ok(),
        });

        match &result {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_accept(stage);
                }
            }
            Err(e) => {
                warn!("{:?} attempt rejected: {}", stage, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejected_attempt();
                }
            }
        }

        result
    }

    fn accept(
        &self,
        text: String,
        rotation: RotationAction,
        attempts: Vec<ExtractionAttempt>,
    ) -> RecognitionOutcome {
        let fragments = split_fragments(&text);
        info!(
            "Label read after {} attempt(s): {} fragment(s)",
            attempts.len(),
            fragments.len()
        );
        RecognitionOutcome {
            fragments,
            rotation,
            attempts,
        }
    }
}
