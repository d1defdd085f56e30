// Parsers for tesseract's TSV and OSD outputs

use crate::core::errors::{EngineError, EngineResult};
use crate::core::types::{OrientationReport, WordObservation};

/// TSV row level for individual words
const WORD_LEVEL: u32 = 5;

/// Number of columns in a tesseract TSV row
const TSV_COLUMNS: usize = 12;

/// Parse `tesseract ... tsv` output into word observations.
///
/// Columns: level page_num block_num par_num line_num word_num left top width height conf text.
/// Only word rows with text are kept. Confidence is truncated to an integer.
pub fn parse_tsv(tsv: &str) -> EngineResult<Vec<WordObservation>> {
    let mut lines = tsv.lines();

    match lines.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => {
            return Err(EngineError::MalformedOutput(format!(
                "expected TSV header, got '{}'",
                other
            )))
        }
        None => return Ok(Vec::new()),
    }

    let mut observations = Vec::new();
    for row in lines {
        if row.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = row.split('\t').collect();
        // Empty text may drop the trailing column
        if cols.len() < TSV_COLUMNS - 1 {
            return Err(EngineError::MalformedOutput(format!(
                "TSV row has {} columns: '{}'",
                cols.len(),
                row
            )));
        }

        let level: u32 = parse_field(cols[0], "level")?;
        if level != WORD_LEVEL {
            continue;
        }

        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        let line_number: u32 = parse_field(cols[4], "line_num")?;
        let confidence: f32 = parse_field(cols[10], "conf")?;

        observations.push(WordObservation {
            text: text.to_string(),
            confidence: confidence as i32,
            line_number,
        });
    }

    Ok(observations)
}

/// Parse `tesseract ... --psm 0` orientation and script detection output
pub fn parse_osd(osd: &str) -> EngineResult<OrientationReport> {
    let mut page_num = None;
    let mut orientation = None;
    let mut rotate = None;
    let mut orientation_confidence = None;
    let mut script = None;
    let mut script_confidence = None;

    for line in osd.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Page number" => page_num = Some(parse_field(value, "page number")?),
            "Orientation in degrees" => orientation = Some(parse_field(value, "orientation")?),
            "Rotate" => rotate = Some(parse_field(value, "rotate")?),
            "Orientation confidence" => {
                orientation_confidence = Some(parse_field(value, "orientation confidence")?)
            }
            "Script" => script = Some(value.to_string()),
            "Script confidence" => {
                script_confidence = Some(parse_field(value, "script confidence")?)
            }
            _ => {}
        }
    }

    let missing = |field: &str| EngineError::MalformedOutput(format!("OSD output missing '{}'", field));

    Ok(OrientationReport {
        page_num: page_num.unwrap_or(0),
        orientation: orientation.ok_or_else(|| missing("Orientation in degrees"))?,
        rotate: rotate.ok_or_else(|| missing("Rotate"))?,
        orientation_confidence: orientation_confidence.unwrap_or(0.0),
        script: script.unwrap_or_default(),
        script_confidence: script_confidence.unwrap_or(0.0),
    })
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &str) -> EngineResult<T> {
    value.trim().parse().map_err(|_| {
        EngineError::MalformedOutput(format!("invalid {} value '{}'", name, value))
    })
}
