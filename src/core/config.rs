use crate::core::errors::ConfigError;
use crate::core::types::{OcrConfig, PageLayout, PipelineConfig, QualityGate};
use std::env;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    /// Deadline for one image to go through the recognition pipeline
    pub process_timeout_seconds: u64,
    pub max_upload_bytes: usize,
}

/// OCR engine configuration
#[derive(Debug, Clone)]
pub struct OcrSection {
    pub tesseract_cmd: String,
    pub language: Option<String>,
    pub char_whitelist: Option<String>,
    pub primary_layout: PageLayout,
    pub fallback_layout: PageLayout,
}

/// Quality gate configuration
#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub confidence_threshold: i32,
    pub min_lines: usize,
}

/// Care model backend configuration
#[derive(Debug, Clone)]
pub struct CareModelConfig {
    pub url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

/// Batch harness configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub threads: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrSection,
    pub quality: QualityConfig,
    pub care: CareModelConfig,
    pub batch: BatchConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: parse_env("SERVER_PORT").unwrap_or(8000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
                process_timeout_seconds: parse_env("PROCESS_TIMEOUT_SECONDS").unwrap_or(60),
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES").unwrap_or(20 * 1024 * 1024),
            },
            ocr: OcrSection {
                tesseract_cmd: env::var("TESSERACT_CMD")
                    .unwrap_or_else(|_| "tesseract".to_string()),
                language: non_empty_env("OCR_LANGUAGE"),
                char_whitelist: non_empty_env("OCR_CHAR_WHITELIST"),
                primary_layout: match non_empty_env("OCR_PRIMARY_LAYOUT") {
                    Some(value) => value.parse()?,
                    None => PageLayout::BlockText,
                },
                fallback_layout: match non_empty_env("OCR_FALLBACK_LAYOUT") {
                    Some(value) => value.parse()?,
                    None => PageLayout::SparseText,
                },
            },
            quality: QualityConfig {
                confidence_threshold: parse_env("QUALITY_CONFIDENCE_THRESHOLD").unwrap_or(60),
                min_lines: parse_env("QUALITY_MIN_LINES").unwrap_or(2),
            },
            care: CareModelConfig {
                url: env::var("CARE_MODEL_URL")
                    .unwrap_or_else(|_| "http://ollama:11434/api/chat".to_string()),
                model: env::var("CARE_MODEL_NAME").unwrap_or_else(|_| "gemma3".to_string()),
                timeout_seconds: parse_env("CARE_MODEL_TIMEOUT_SECONDS").unwrap_or(60),
            },
            batch: BatchConfig {
                threads: parse_env("BATCH_THREADS").unwrap_or_else(num_cpus::get),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=100).contains(&self.quality.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.quality.confidence_threshold,
            ));
        }

        if self.server.process_timeout_seconds == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "process_timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "max_upload_bytes must be > 0".to_string(),
            ));
        }

        if self.ocr.tesseract_cmd.trim().is_empty() {
            return Err(ConfigError::InvalidOcrConfig(
                "tesseract_cmd must not be empty".to_string(),
            ));
        }

        if self.ocr.primary_layout == self.ocr.fallback_layout {
            return Err(ConfigError::InvalidOcrConfig(format!(
                "fallback layout must differ from primary layout ({:?})",
                self.ocr.primary_layout
            )));
        }

        if !self.care.url.starts_with("http://") && !self.care.url.starts_with("https://") {
            return Err(ConfigError::InvalidCareConfig(format!(
                "care model url must be http(s), got {}",
                self.care.url
            )));
        }

        if self.care.timeout_seconds == 0 {
            return Err(ConfigError::InvalidCareConfig(
                "timeout_seconds must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Pipeline settings derived from the OCR and quality sections
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            primary: self.ocr_config(self.ocr.primary_layout),
            fallback: self.ocr_config(self.ocr.fallback_layout),
            quality: QualityGate {
                confidence_threshold: self.quality.confidence_threshold,
                min_lines: self.quality.min_lines,
            },
        }
    }

    fn ocr_config(&self, layout: PageLayout) -> OcrConfig {
        OcrConfig {
            layout,
            language: self.ocr.language.clone(),
            char_whitelist: self.ocr.char_whitelist.clone(),
        }
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.server.process_timeout_seconds)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_bytes
    }

    pub fn tesseract_cmd(&self) -> &str {
        &self.ocr.tesseract_cmd
    }

    pub fn care_model_url(&self) -> &str {
        &self.care.url
    }

    pub fn care_model_name(&self) -> &str {
        &self.care.model
    }

    pub fn care_model_timeout(&self) -> Duration {
        Duration::from_secs(self.care.timeout_seconds)
    }

    pub fn batch_threads(&self) -> usize {
        self.batch.threads.max(1)
    }
}

impl Default for Config {
    /// Built-in defaults, without reading the environment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                host: "0.0.0.0".to_string(),
                log_level: Level::INFO,
                process_timeout_seconds: 60,
                max_upload_bytes: 20 * 1024 * 1024,
            },
            ocr: OcrSection {
                tesseract_cmd: "tesseract".to_string(),
                language: None,
                char_whitelist: None,
                primary_layout: PageLayout::BlockText,
                fallback_layout: PageLayout::SparseText,
            },
            quality: QualityConfig {
                confidence_threshold: 60,
                min_lines: 2,
            },
            care: CareModelConfig {
                url: "http://ollama:11434/api/chat".to_string(),
                model: "gemma3".to_string(),
                timeout_seconds: 60,
            },
            batch: BatchConfig { threads: 4 },
        }
    }
}

fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline(), PipelineConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.quality.confidence_threshold = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfidenceThreshold(101))
        ));
    }

    #[test]
    fn test_rejects_identical_layouts() {
        let mut config = Config::default();
        config.ocr.fallback_layout = PageLayout::BlockText;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOcrConfig(_))
        ));
    }

    #[test]
    fn test_pipeline_carries_language_to_both_passes() {
        let mut config = Config::default();
        config.ocr.language = Some("eng".to_string());
        config.quality.min_lines = 3;

        let pipeline = config.pipeline();
        assert_eq!(pipeline.primary.language.as_deref(), Some("eng"));
        assert_eq!(pipeline.fallback.language.as_deref(), Some("eng"));
        assert_eq!(pipeline.quality.min_lines, 3);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("WARNING"), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }
}
