// Quality-gated text extraction
//
// An attempt is accepted only when enough distinct lines contain confidently
// recognised words. Accepted attempts fetch plain text with a second engine
// call using the same configuration.

use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::errors::{EngineResult, QualityError, QualityResult};
use crate::core::types::{LineGrouping, OcrConfig, QualityGate, WordObservation};
use crate::services::ocr::OcrEngine;

/// Accept iff the number of lines holding a word with confidence strictly above
/// `confidence_threshold` strictly exceeds `min_lines`
pub fn assess_quality(
    observations: &[WordObservation],
    confidence_threshold: i32,
    min_lines: usize,
) -> bool {
    qualifying_lines(observations, confidence_threshold) > min_lines
}

fn qualifying_lines(observations: &[WordObservation], confidence_threshold: i32) -> usize {
    LineGrouping::from_observations(observations, confidence_threshold).line_count()
}

pub struct QualityGatedExtractor {
    engine: Arc<dyn OcrEngine>,
    gate: QualityGate,
}

impl QualityGatedExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, gate: QualityGate) -> Self {
        Self { engine, gate }
    }

    pub fn gate(&self) -> QualityGate {
        self.gate
    }

    pub fn extract_structured(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> EngineResult<Vec<WordObservation>> {
        self.engine.recognize_structured(image, config)
    }

    /// Run one gated attempt and return the plain text if it passes
    #[instrument(skip(self, image, config), fields(config = %config))]
    pub fn analyse(&self, image: &DynamicImage, config: &OcrConfig) -> QualityResult<String> {
        let observations = self
            .extract_structured(image, config)
            .map_err(|source| QualityError::Engine {
                config: config.to_string(),
                source,
            })?;

        let lines = qualifying_lines(&observations, self.gate.confidence_threshold);
        debug!(
            "{} words, {} line(s) above confidence {}",
            observations.len(),
            lines,
            self.gate.confidence_threshold
        );

        if lines <= self.gate.min_lines {
            return Err(QualityError::BelowThreshold {
                config: config.to_string(),
                qualifying_lines: lines,
                confidence_threshold: self.gate.confidence_threshold,
                min_lines: self.gate.min_lines,
            });
        }

        self.engine
            .recognize_text(image, config)
            .map_err(|source| QualityError::Engine {
                config: config.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{EngineError, OrientationError};
    use crate::core::types::OrientationReport;
    use image::GrayImage;
    use parking_lot::Mutex;

    fn word(text: &str, confidence: i32, line_number: u32) -> WordObservation {
        WordObservation {
            text: text.to_string(),
            confidence,
            line_number,
        }
    }

    /// Returns the same structured and plain output for every call
    struct CannedEngine {
        words: Vec<WordObservation>,
        text: &'static str,
        calls: Mutex<Vec<&'static str>>,
    }

    impl CannedEngine {
        fn new(words: Vec<WordObservation>, text: &'static str) -> Self {
            Self {
                words,
                text,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrEngine for CannedEngine {
        fn detect_orientation(
            &self,
            _: &DynamicImage,
        ) -> Result<OrientationReport, OrientationError> {
            Err(OrientationError::Undetectable("unused".to_string()))
        }

        fn recognize_text(&self, _: &DynamicImage, _: &OcrConfig) -> EngineResult<String> {
            self.calls.lock().push("text");
            Ok(self.text.to_string())
        }

        fn recognize_structured(
            &self,
            _: &DynamicImage,
            _: &OcrConfig,
        ) -> EngineResult<Vec<WordObservation>> {
            self.calls.lock().push("structured");
            Ok(self.words.clone())
        }
    }

    struct BrokenEngine;

    impl OcrEngine for BrokenEngine {
        fn detect_orientation(
            &self,
            _: &DynamicImage,
        ) -> Result<OrientationReport, OrientationError> {
            Err(OrientationError::Undetectable("unused".to_string()))
        }

        fn recognize_text(&self, _: &DynamicImage, _: &OcrConfig) -> EngineResult<String> {
            Ok(String::new())
        }

        fn recognize_structured(
            &self,
            _: &DynamicImage,
            _: &OcrConfig,
        ) -> EngineResult<Vec<WordObservation>> {
            Err(EngineError::NonZeroExit {
                status: 1,
                stderr: "Error during processing.".to_string(),
            })
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(8, 8))
    }

    #[test]
    fn test_single_confident_line_is_rejected() {
        let observations = vec![word("Water", 80, 0), word("weekly", 70, 0), word("??", 10, 1)];
        assert!(!assess_quality(&observations, 60, 2));
    }

    #[test]
    fn test_more_lines_than_minimum_is_accepted() {
        let observations = vec![
            word("Acer", 91, 1),
            word("palmatum", 88, 1),
            word("Partial", 75, 2),
            word("shade", 62, 2),
            word("Water", 70, 3),
        ];
        assert!(assess_quality(&observations, 60, 2));
        // Exactly min_lines is not enough
        assert!(!assess_quality(&observations, 60, 3));
    }

    #[test]
    fn test_threshold_is_strict() {
        let observations = vec![word("a", 60, 1), word("b", 60, 2), word("c", 60, 3)];
        assert!(!assess_quality(&observations, 60, 2));
        assert!(assess_quality(&observations, 59, 2));
    }

    #[test]
    fn test_quality_is_monotonic_in_threshold() {
        let observations: Vec<WordObservation> = (0..40)
            .map(|i| word("w", (i * 37 % 101) as i32, (i % 9) as u32))
            .collect();

        let mut previous = usize::MAX;
        for threshold in 0..=100 {
            let lines = qualifying_lines(&observations, threshold);
            assert!(lines <= previous, "threshold {} added lines", threshold);
            previous = lines;
        }

        for threshold in 0..100 {
            if assess_quality(&observations, threshold + 1, 2) {
                assert!(assess_quality(&observations, threshold, 2));
            }
        }
    }

    #[test]
    fn test_accepted_attempt_fetches_plain_text() {
        let engine = Arc::new(CannedEngine::new(
            vec![word("Full", 90, 1), word("sun", 90, 2), word("Hardy", 90, 3)],
            "Full sun. Hardy.",
        ));
        let extractor = QualityGatedExtractor::new(engine.clone(), QualityGate::default());

        let text = extractor.analyse(&image(), &OcrConfig::block_text()).unwrap();
        assert_eq!(text, "Full sun. Hardy.");
        assert_eq!(*engine.calls.lock(), vec!["structured", "text"]);
    }

    #[test]
    fn test_rejected_attempt_skips_plain_text() {
        let engine = Arc::new(CannedEngine::new(vec![word("??", 10, 1)], "noise"));
        let extractor = QualityGatedExtractor::new(engine.clone(), QualityGate::default());

        let err = extractor
            .analyse(&image(), &OcrConfig::sparse_text())
            .unwrap_err();
        match err {
            QualityError::BelowThreshold {
                config,
                qualifying_lines,
                ..
            } => {
                assert_eq!(config, "--psm 11");
                assert_eq!(qualifying_lines, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*engine.calls.lock(), vec!["structured"]);
    }

    #[test]
    fn test_engine_failure_rejects_attempt() {
        let extractor = QualityGatedExtractor::new(Arc::new(BrokenEngine), QualityGate::default());
        let err = extractor
            .analyse(&image(), &OcrConfig::block_text())
            .unwrap_err();

        assert!(matches!(err, QualityError::Engine { .. }));
        assert_eq!(err.config(), "--psm 4");
    }
}
