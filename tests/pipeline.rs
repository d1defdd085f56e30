// End-to-end recognition pipeline behaviour with scripted OCR engines

use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, Rgb};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use plant_label_workflow::core::errors::{
    EngineError, EngineResult, OrientationError, ProcessingError, QualityError,
};
use plant_label_workflow::core::types::{
    AttemptStage, OcrConfig, OrientationReport, PageLayout, PipelineConfig, QualityGate,
    RotationAction, WordObservation,
};
use plant_label_workflow::orchestration::RecognitionOrchestrator;
use plant_label_workflow::services::{ImageprocOps, OcrEngine, VisionOps};
use plant_label_workflow::utils::Metrics;

/// What the engine does for one extraction attempt
#[derive(Clone)]
enum Scripted {
    /// Words with the given confidence on `lines` distinct lines, then `text`
    Read { lines: u32, confidence: i32, text: &'static str },
    /// Structured recognition fails
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Orientation { width: u32, height: u32 },
    Structured(PageLayout),
    Text(PageLayout),
}

struct ScriptedEngine {
    rotate: Option<i32>,
    attempts: Mutex<VecDeque<Scripted>>,
    current: Mutex<Option<Scripted>>,
    calls: Mutex<Vec<Call>>,
    seen_sizes: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedEngine {
    fn new(rotate: Option<i32>, attempts: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            rotate,
            attempts: Mutex::new(attempts.into()),
            current: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            seen_sizes: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn structured_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Structured(_)))
            .count()
    }
}

impl OcrEngine for ScriptedEngine {
    fn detect_orientation(
        &self,
        image: &DynamicImage,
    ) -> Result<OrientationReport, OrientationError> {
        self.calls.lock().push(Call::Orientation {
            width: image.width(),
            height: image.height(),
        });
        match self.rotate {
            Some(rotate) => Ok(OrientationReport {
                page_num: 0,
                orientation: (360 - rotate) % 360,
                rotate,
                orientation_confidence: 12.5,
                script: "Latin".to_string(),
                script_confidence: 3.0,
            }),
            None => Err(OrientationError::Undetectable(
                "Too few characters. Skipping this page".to_string(),
            )),
        }
    }

    fn recognize_text(&self, image: &DynamicImage, config: &OcrConfig) -> EngineResult<String> {
        self.calls.lock().push(Call::Text(config.layout));
        self.seen_sizes.lock().push(image.dimensions());
        match self.current.lock().clone() {
            Some(Scripted::Read { text, .. }) => Ok(text.to_string()),
            _ => Err(EngineError::MalformedOutput("no scripted text".to_string())),
        }
    }

    fn recognize_structured(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> EngineResult<Vec<WordObservation>> {
        self.calls.lock().push(Call::Structured(config.layout));
        self.seen_sizes.lock().push(image.dimensions());

        let next = self
            .attempts
            .lock()
            .pop_front()
            .ok_or_else(|| EngineError::MalformedOutput("unexpected extra attempt".to_string()))?;
        *self.current.lock() = Some(next.clone());

        match next {
            Scripted::Read {
                lines, confidence, ..
            } => Ok((0..lines)
                .map(|line_number| WordObservation {
                    text: format!("word{}", line_number),
                    confidence,
                    line_number,
                })
                .collect()),
            Scripted::Fail => Err(EngineError::NonZeroExit {
                status: 1,
                stderr: "Error during processing.".to_string(),
            }),
        }
    }
}

fn orchestrator(engine: Arc<ScriptedEngine>, metrics: Option<Metrics>) -> RecognitionOrchestrator {
    RecognitionOrchestrator::new(
        Arc::new(ImageprocOps::new()),
        engine,
        PipelineConfig::default(),
        metrics,
    )
}

fn landscape_photo() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(40, 20, |x, y| {
        if (y % 6) < 2 && (4..36).contains(&x) {
            Rgb([20u8, 30, 20])
        } else {
            Rgb([210u8, 205, 190])
        }
    }))
}

const REJECT: Scripted = Scripted::Read {
    lines: 1,
    confidence: 90,
    text: "noise",
};

#[test]
fn test_primary_success_skips_fallback() {
    let engine = ScriptedEngine::new(
        None,
        vec![Scripted::Read {
            lines: 3,
            confidence: 85,
            text: "Water weekly. Fertilise in spring.",
        }],
    );
    let fragments = orchestrator(engine.clone(), None)
        .process(&landscape_photo())
        .unwrap();

    assert_eq!(fragments, vec!["Water weekly", " Fertilise in spring"]);
    assert_eq!(
        engine.calls()[1..],
        [
            Call::Structured(PageLayout::BlockText),
            Call::Text(PageLayout::BlockText)
        ]
    );
}

#[test]
fn test_fallback_after_primary_rejection() {
    let engine = ScriptedEngine::new(
        None,
        vec![
            REJECT,
            Scripted::Read {
                lines: 4,
                confidence: 70,
                text: "Acer Palmatum",
            },
        ],
    );
    let metrics = Metrics::new();
    let outcome = orchestrator(engine.clone(), Some(metrics.clone()))
        .process_detailed(&landscape_photo())
        .unwrap();

    assert_eq!(outcome.fragments, vec!["Acer Palmatum"]);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[1].stage, AttemptStage::Fallback);
    assert_eq!(outcome.attempts[1].config.layout, PageLayout::SparseText);
    assert_eq!(outcome.attempts[1].raw_text, "Acer Palmatum");

    // No third attempt, and the rejected primary never fetched plain text
    assert_eq!(engine.structured_calls(), 2);
    assert_eq!(
        engine.calls()[1..],
        [
            Call::Structured(PageLayout::BlockText),
            Call::Structured(PageLayout::SparseText),
            Call::Text(PageLayout::SparseText)
        ]
    );

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.primary_accepts, 0);
    assert_eq!(snapshot.fallback_accepts, 1);
    assert_eq!(snapshot.rejected_attempts, 1);
}

#[test]
fn test_blank_image_fails_without_text() {
    let engine = ScriptedEngine::new(
        None,
        vec![
            Scripted::Read {
                lines: 0,
                confidence: 0,
                text: "",
            },
            Scripted::Read {
                lines: 0,
                confidence: 0,
                text: "",
            },
        ],
    );
    let metrics = Metrics::new();
    let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([255])));

    let err = orchestrator(engine.clone(), Some(metrics.clone()))
        .process(&blank)
        .unwrap_err();

    let ProcessingError::AllAttemptsRejected { primary, fallback } = &err;
    assert!(matches!(primary, QualityError::BelowThreshold { qualifying_lines: 0, .. }));
    assert!(matches!(fallback, QualityError::BelowThreshold { .. }));
    assert_eq!(primary.config(), "--psm 4");
    assert_eq!(fallback.config(), "--psm 11");
    assert!(err.to_string().contains("clearer and close up photo"));

    assert_eq!(engine.structured_calls(), 2);
    assert!(!engine.calls().iter().any(|c| matches!(c, Call::Text(_))));
    assert_eq!(metrics.snapshot().processing_failures, 1);
}

#[test]
fn test_engine_failures_fall_back_then_fail() {
    let engine = ScriptedEngine::new(None, vec![Scripted::Fail, Scripted::Fail]);
    let err = orchestrator(engine.clone(), None)
        .process(&landscape_photo())
        .unwrap_err();

    let ProcessingError::AllAttemptsRejected { primary, fallback } = err;
    assert!(matches!(primary, QualityError::Engine { .. }));
    assert!(matches!(fallback, QualityError::Engine { .. }));
    assert_eq!(engine.structured_calls(), 2);
}

#[test]
fn test_rotation_applied_once_to_preprocessed_image() {
    let engine = ScriptedEngine::new(
        Some(90),
        vec![Scripted::Read {
            lines: 3,
            confidence: 99,
            text: "Hosta. Shade.",
        }],
    );
    let metrics = Metrics::new();
    let outcome = orchestrator(engine.clone(), Some(metrics.clone()))
        .process_detailed(&landscape_photo())
        .unwrap();

    assert_eq!(outcome.rotation, RotationAction::Rotate90Clockwise);

    // Orientation saw the upright-as-given 40x20 image, extraction the rotated 20x40 one
    let orientation_calls: Vec<Call> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Orientation { .. }))
        .collect();
    assert_eq!(
        orientation_calls,
        vec![Call::Orientation {
            width: 40,
            height: 20
        }]
    );
    assert!(engine.seen_sizes.lock().iter().all(|&size| size == (20, 40)));
    assert_eq!(metrics.snapshot().rotations_applied, 1);
}

#[test]
fn test_fallback_runs_on_rotated_image() {
    let engine = ScriptedEngine::new(
        Some(270),
        vec![
            REJECT,
            Scripted::Read {
                lines: 3,
                confidence: 99,
                text: "Lavender",
            },
        ],
    );
    let outcome = orchestrator(engine.clone(), None)
        .process_detailed(&landscape_photo())
        .unwrap();

    assert_eq!(outcome.rotation, RotationAction::Rotate90CounterClockwise);
    assert_eq!(outcome.fragments, vec!["Lavender"]);
    let sizes = engine.seen_sizes.lock().clone();
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&size| size == (20, 40)));
}

#[test]
fn test_undetectable_orientation_keeps_image() {
    let engine = ScriptedEngine::new(
        None,
        vec![Scripted::Read {
            lines: 3,
            confidence: 99,
            text: "Rosa",
        }],
    );
    let metrics = Metrics::new();
    let outcome = orchestrator(engine.clone(), Some(metrics.clone()))
        .process_detailed(&landscape_photo())
        .unwrap();

    assert_eq!(outcome.rotation, RotationAction::None);
    assert!(engine.seen_sizes.lock().iter().all(|&size| size == (40, 20)));
    assert_eq!(metrics.snapshot().orientation_fallbacks, 1);
    assert_eq!(metrics.snapshot().rotations_applied, 0);
}

#[test]
fn test_extraction_sees_binary_image() {
    struct BinaryCheck;

    impl OcrEngine for BinaryCheck {
        fn detect_orientation(
            &self,
            image: &DynamicImage,
        ) -> Result<OrientationReport, OrientationError> {
            assert!(image.to_luma8().pixels().all(|p| p[0] == 0 || p[0] == 255));
            Err(OrientationError::Undetectable("none".to_string()))
        }

        fn recognize_text(&self, _: &DynamicImage, _: &OcrConfig) -> EngineResult<String> {
            Ok("Fern".to_string())
        }

        fn recognize_structured(
            &self,
            image: &DynamicImage,
            _: &OcrConfig,
        ) -> EngineResult<Vec<WordObservation>> {
            assert!(image.to_luma8().pixels().all(|p| p[0] == 0 || p[0] == 255));
            Ok((0..3)
                .map(|line_number| WordObservation {
                    text: "Fern".to_string(),
                    confidence: 90,
                    line_number,
                })
                .collect())
        }
    }

    let orchestrator = RecognitionOrchestrator::new(
        Arc::new(ImageprocOps::new()),
        Arc::new(BinaryCheck),
        PipelineConfig::default(),
        None,
    );
    assert_eq!(orchestrator.process(&landscape_photo()).unwrap(), vec!["Fern"]);
}

#[test]
fn test_custom_quality_gate() {
    // Two confident lines pass once the minimum drops to one
    let config = PipelineConfig {
        quality: QualityGate {
            confidence_threshold: 50,
            min_lines: 1,
        },
        ..PipelineConfig::default()
    };
    let engine = ScriptedEngine::new(
        None,
        vec![Scripted::Read {
            lines: 2,
            confidence: 51,
            text: "Basil. Sun.",
        }],
    );
    let orchestrator =
        RecognitionOrchestrator::new(Arc::new(ImageprocOps::new()), engine.clone(), config, None);

    assert_eq!(
        orchestrator.process(&landscape_photo()).unwrap(),
        vec!["Basil", " Sun"]
    );
    assert_eq!(engine.structured_calls(), 1);
}

#[test]
fn test_concurrent_processing_shares_orchestrator() {
    struct Stateless;

    impl OcrEngine for Stateless {
        fn detect_orientation(
            &self,
            _: &DynamicImage,
        ) -> Result<OrientationReport, OrientationError> {
            Err(OrientationError::Undetectable("none".to_string()))
        }

        fn recognize_text(&self, image: &DynamicImage, _: &OcrConfig) -> EngineResult<String> {
            Ok(format!("Width {}. Height {}.", image.width(), image.height()))
        }

        fn recognize_structured(
            &self,
            _: &DynamicImage,
            _: &OcrConfig,
        ) -> EngineResult<Vec<WordObservation>> {
            Ok((0..3)
                .map(|line_number| WordObservation {
                    text: "x".to_string(),
                    confidence: 90,
                    line_number,
                })
                .collect())
        }
    }

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        Arc::new(ImageprocOps::new()),
        Arc::new(Stateless),
        PipelineConfig::default(),
        None,
    ));

    let handles: Vec<_> = (1..=4u32)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            std::thread::spawn(move || {
                let image = DynamicImage::ImageLuma8(GrayImage::new(10 * i, 5));
                orchestrator.process(&image).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let width = 10 * (i as u32 + 1);
        assert_eq!(
            handle.join().unwrap(),
            vec![format!("Width {}", width), " Height 5".to_string()]
        );
    }
}

#[test]
fn test_vision_rotation_round_trip_is_identity() {
    let ops = ImageprocOps::new();
    let photo = landscape_photo();
    let there = ops.rotate(&photo, RotationAction::Rotate90Clockwise);
    let back = ops.rotate(&there, RotationAction::Rotate90CounterClockwise);
    assert_eq!(back.to_rgb8(), photo.to_rgb8());
}
