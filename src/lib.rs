// Library exports for the plant label reading workflow

pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod phases;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        CareError, ConfigError, DecodeError, EngineError, OrientationError, ProcessingError,
        QualityError,
    },
    types::{
        OcrConfig, OrientationReport, PageLayout, PipelineConfig, QualityGate,
        RecognitionOutcome, RotationAction, WordObservation,
    },
};

pub use middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use orchestration::{BatchRunner, RecognitionOrchestrator};

pub use services::{
    CareExtractor, ImageprocOps, OcrEngine, PlantCare, ReminderSchedule, TesseractEngine,
    VisionOps,
};

pub use utils::{decode_image, decode_image_async, Metrics};
