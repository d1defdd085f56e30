// Error types for the label reading workflow
//
// Using thiserror so each stage gets a typed error that callers can match on,
// with the source chain preserved for logging.

use thiserror::Error;

/// Image payload could not be turned into a pixel buffer.
///
/// Raised by callers before the recognition pipeline runs.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image payload is empty")]
    Empty,

    #[error("Invalid image data: {0}")]
    Invalid(#[from] image::ImageError),

    #[error("Image decoding task failed: {0}")]
    TaskJoinFailed(String),
}

/// OCR engine invocation errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to launch OCR engine '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR engine exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    #[error("Failed to stage image for OCR: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Failed to encode image for OCR: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Unexpected OCR engine output: {0}")]
    MalformedOutput(String),
}

/// Orientation could not be determined.
///
/// Only ever observed inside the orientation resolver, which degrades to no rotation.
#[derive(Debug, Error)]
pub enum OrientationError {
    #[error("Orientation undetectable: {0}")]
    Undetectable(String),

    #[error("Orientation query failed: {0}")]
    Engine(#[from] EngineError),
}

/// A single extraction attempt was rejected
#[derive(Debug, Error)]
pub enum QualityError {
    #[error(
        "Text read quality too low with `{config}`: {qualifying_lines} line(s) above confidence {confidence_threshold}, need more than {min_lines}"
    )]
    BelowThreshold {
        config: String,
        qualifying_lines: usize,
        confidence_threshold: i32,
        min_lines: usize,
    },

    #[error("OCR engine failed with `{config}`: {source}")]
    Engine {
        config: String,
        #[source]
        source: EngineError,
    },
}

/// Terminal failure of the recognition pipeline for one image
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(
        "Could not process the image. Please try to improve the image quality by taking a clearer and close up photo. (primary: {primary}; fallback: {fallback})"
    )]
    AllAttemptsRejected {
        primary: QualityError,
        fallback: QualityError,
    },
}

/// Care extraction backend errors
#[derive(Debug, Error)]
pub enum CareError {
    #[error("Care model request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Care model returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Failed to parse model response: {reason} (content: {content})")]
    InvalidResponse { reason: String, content: String },

    #[error("Failed to interpret label: no watering frequency found")]
    Uninterpretable,

    #[error("Care model backend is unavailable (circuit open)")]
    CircuitOpen,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be in [0, 100], got {0}")]
    InvalidConfidenceThreshold(i32),

    #[error("Unknown page layout '{0}' (expected block, sparse or auto)")]
    InvalidLayout(String),

    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("Invalid OCR config: {0}")]
    InvalidOcrConfig(String),

    #[error("Invalid care model config: {0}")]
    InvalidCareConfig(String),
}

pub type DecodeResult<T> = Result<T, DecodeError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type QualityResult<T> = Result<T, QualityError>;
pub type ProcessingResult<T> = Result<T, ProcessingError>;
pub type CareResult<T> = Result<T, CareError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

impl QualityError {
    /// Configuration the rejected attempt ran with
    pub fn config(&self) -> &str {
        match self {
            QualityError::BelowThreshold { config, .. } => config,
            QualityError::Engine { config, .. } => config,
        }
    }
}
