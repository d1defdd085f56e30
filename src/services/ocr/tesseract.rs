// Tesseract CLI backend
//
// Each call stages the image as a temporary PNG and runs the tesseract binary
// against it, reading results from stdout.

use image::{DynamicImage, ImageFormat};
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, trace};

use super::parse::{parse_osd, parse_tsv};
use super::OcrEngine;
use crate::core::errors::{EngineError, EngineResult, OrientationError};
use crate::core::types::{OcrConfig, OrientationReport, WordObservation};

/// Page segmentation mode for orientation and script detection only
const OSD_PSM: &str = "0";

/// OCR engine that shells out to the `tesseract` executable
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: String,
}

impl TesseractEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the executable can be launched
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn stage(image: &DynamicImage) -> EngineResult<NamedTempFile> {
        let mut tmp = tempfile::Builder::new()
            .prefix("plant-label-")
            .suffix(".png")
            .tempfile()?;
        image.write_to(&mut tmp, ImageFormat::Png)?;
        tmp.flush()?;
        Ok(tmp)
    }

    /// Run tesseract on `image` with `args` after the `stdout` output base
    fn run(&self, image: &DynamicImage, args: &[String]) -> EngineResult<Output> {
        let staged = Self::stage(image)?;
        trace!("Running {} {:?} {}", self.program, staged.path(), args.join(" "));

        Command::new(&self.program)
            .arg(staged.path())
            .arg("stdout")
            .args(args)
            .output()
            .map_err(|source| EngineError::SpawnFailed {
                program: self.program.clone(),
                source,
            })
    }

    fn run_checked(&self, image: &DynamicImage, args: &[String]) -> EngineResult<String> {
        let output = self.run(image, args)?;
        if !output.status.success() {
            return Err(non_zero_exit(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl OcrEngine for TesseractEngine {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    fn detect_orientation(
        &self,
        image: &DynamicImage,
    ) -> Result<OrientationReport, OrientationError> {
        let output = self.run(image, &["--psm".to_string(), OSD_PSM.to_string()])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Too little text makes tesseract skip the page, with or without a failing status
        if !output.status.success() || !stdout.contains("Rotate:") {
            let reason = stderr.trim();
            return Err(OrientationError::Undetectable(if reason.is_empty() {
                "no orientation data in engine output".to_string()
            } else {
                reason.to_string()
            }));
        }

        let report = parse_osd(&stdout)?;
        debug!(
            "OSD: orientation {}°, rotate {}°, confidence {:.2}, script {}",
            report.orientation, report.rotate, report.orientation_confidence, report.script
        );
        Ok(report)
    }

    #[instrument(skip(self, image, config), fields(config = %config))]
    fn recognize_text(&self, image: &DynamicImage, config: &OcrConfig) -> EngineResult<String> {
        self.run_checked(image, &config.to_args())
    }

    #[instrument(skip(self, image, config), fields(config = %config))]
    fn recognize_structured(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> EngineResult<Vec<WordObservation>> {
        let mut args = config.to_args();
        args.push("tsv".to_string());

        let tsv = self.run_checked(image, &args)?;
        let words = parse_tsv(&tsv)?;
        debug!("Tesseract returned {} words", words.len());
        Ok(words)
    }
}

fn non_zero_exit(output: &Output) -> EngineError {
    EngineError::NonZeroExit {
        status: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
