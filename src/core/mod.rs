pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    CareError, ConfigError, DecodeError, EngineError, OrientationError, ProcessingError,
    QualityError,
};
pub use types::{
    AttemptStage, ExtractionAttempt, LineGrouping, OcrConfig, OrientationReport, PageLayout,
    PipelineConfig, QualityGate, RecognitionOutcome, RotationAction, WordObservation,
};
