// Shared value types for the recognition pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::errors::ConfigError;

/// Discrete rotation applied to correct page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationAction {
    None,
    Rotate90Clockwise,
    Rotate180,
    Rotate90CounterClockwise,
}

impl RotationAction {
    /// Map the degrees an orientation report recommends rotating by.
    ///
    /// Only exact multiples the engine reports are recognised; anything else is `None`.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees {
            90 => RotationAction::Rotate90Clockwise,
            180 => RotationAction::Rotate180,
            270 => RotationAction::Rotate90CounterClockwise,
            _ => RotationAction::None,
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, RotationAction::None)
    }
}

/// Page orientation estimate produced by one orientation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationReport {
    pub page_num: u32,
    /// Detected orientation of the text, in degrees
    pub orientation: i32,
    /// Degrees to rotate the image by to make the text upright
    pub rotate: i32,
    pub orientation_confidence: f32,
    pub script: String,
    pub script_confidence: f32,
}

/// One recognised word from structured OCR output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordObservation {
    pub text: String,
    /// Engine confidence, 0-100
    pub confidence: i32,
    pub line_number: u32,
}

/// Words grouped by line, keeping only confident observations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineGrouping {
    lines: BTreeMap<u32, Vec<String>>,
}

impl LineGrouping {
    /// Group observations whose confidence strictly exceeds `confidence_threshold`
    pub fn from_observations(observations: &[WordObservation], confidence_threshold: i32) -> Self {
        let mut lines: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for observation in observations
            .iter()
            .filter(|o| o.confidence > confidence_threshold)
        {
            lines
                .entry(observation.line_number)
                .or_default()
                .push(observation.text.clone());
        }
        Self { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn words(&self, line_number: u32) -> Option<&[String]> {
        self.lines.get(&line_number).map(Vec::as_slice)
    }

    pub fn line_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.keys().copied()
    }
}

/// Assumed text layout handed to the OCR engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageLayout {
    /// A single column of text of variable sizes
    BlockText,
    /// Find as much text as possible in no particular order
    SparseText,
    /// Automatic page segmentation with orientation detection
    Automatic,
}

impl PageLayout {
    /// Tesseract page segmentation mode
    pub fn psm(self) -> u8 {
        match self {
            PageLayout::BlockText => 4,
            PageLayout::SparseText => 11,
            PageLayout::Automatic => 1,
        }
    }
}

impl FromStr for PageLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "block" | "block_text" | "4" => Ok(PageLayout::BlockText),
            "sparse" | "sparse_text" | "11" => Ok(PageLayout::SparseText),
            "auto" | "automatic" | "1" => Ok(PageLayout::Automatic),
            other => Err(ConfigError::InvalidLayout(other.to_string())),
        }
    }
}

/// Recognised OCR options for one engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OcrConfig {
    pub layout: PageLayout,
    pub language: Option<String>,
    pub char_whitelist: Option<String>,
}

impl OcrConfig {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            language: None,
            char_whitelist: None,
        }
    }

    pub fn block_text() -> Self {
        Self::new(PageLayout::BlockText)
    }

    pub fn sparse_text() -> Self {
        Self::new(PageLayout::SparseText)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_char_whitelist(mut self, whitelist: impl Into<String>) -> Self {
        self.char_whitelist = Some(whitelist.into());
        self
    }

    /// Command line arguments understood by the tesseract CLI
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--psm".to_string(), self.layout.psm().to_string()];
        if let Some(language) = &self.language {
            args.push("-l".to_string());
            args.push(language.clone());
        }
        if let Some(whitelist) = &self.char_whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", whitelist));
        }
        args
    }
}

impl fmt::Display for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_args().join(" "))
    }
}

/// Accept/reject heuristic for one extraction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGate {
    pub confidence_threshold: i32,
    pub min_lines: usize,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            confidence_threshold: 60,
            min_lines: 2,
        }
    }
}

/// Per-orchestrator pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub primary: OcrConfig,
    pub fallback: OcrConfig,
    pub quality: QualityGate,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary: OcrConfig::block_text(),
            fallback: OcrConfig::sparse_text(),
            quality: QualityGate::default(),
        }
    }
}

/// Which pass of the retry policy an attempt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Primary,
    Fallback,
}

/// Record of one OCR pass
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub stage: AttemptStage,
    pub config: OcrConfig,
    /// Plain text, only fetched for accepted attempts
    pub raw_text: String,
    pub quality_verdict: bool,
}

/// Everything the orchestrator learned while processing one image
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionOutcome {
    pub fragments: Vec<String>,
    pub rotation: RotationAction,
    pub attempts: Vec<ExtractionAttempt>,
}
