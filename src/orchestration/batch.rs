// Batch runner: decode and recognise a set of label photos in parallel

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::recognition_orchestrator::RecognitionOrchestrator;
use crate::utils::image_ops::{has_image_extension, load_image_file};
use crate::utils::Metrics;

/// Result for one file in a batch
#[derive(Debug, Clone, Serialize)]
pub struct LabelResult {
    pub path: PathBuf,
    pub fragments: Option<Vec<String>>,
    pub error: Option<String>,
}

impl LabelResult {
    pub fn is_accepted(&self) -> bool {
        self.fragments.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<LabelResult>,
    pub accepted: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Runs the recognition pipeline over many files on a dedicated rayon pool
pub struct BatchRunner {
    orchestrator: Arc<RecognitionOrchestrator>,
    pool: rayon::ThreadPool,
    metrics: Option<Metrics>,
}

impl BatchRunner {
    pub fn new(
        orchestrator: Arc<RecognitionOrchestrator>,
        threads: usize,
        metrics: Option<Metrics>,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("label-batch-{}", i))
            .build()
            .context("Failed to build batch thread pool")?;

        Ok(Self {
            orchestrator,
            pool,
            metrics,
        })
    }

    /// Process `paths`, keeping input order in the report
    #[instrument(skip(self, paths), fields(total_images = paths.len()))]
    pub fn run(&self, paths: &[PathBuf]) -> BatchReport {
        let start = Instant::now();

        let results: Vec<LabelResult> = self
            .pool
            .install(|| paths.par_iter().map(|path| self.process_file(path)).collect());

        let accepted = results.iter().filter(|r| r.is_accepted()).count();
        let failed = results.len() - accepted;
        let duration = start.elapsed();

        info!(
            "Batch finished: {} accepted, {} failed in {:.2}s",
            accepted,
            failed,
            duration.as_secs_f64()
        );

        BatchReport {
            results,
            accepted,
            failed,
            duration_ms: duration_ms(duration),
        }
    }

    fn process_file(&self, path: &Path) -> LabelResult {
        debug!("Processing {}", path.display());

        let image = match load_image_file(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_decode_error();
                }
                return LabelResult {
                    path: path.to_path_buf(),
                    fragments: None,
                    error: Some(e.to_string()),
                };
            }
        };

        match self.orchestrator.process(&image) {
            Ok(fragments) => LabelResult {
                path: path.to_path_buf(),
                fragments: Some(fragments),
                error: None,
            },
            Err(e) => LabelResult {
                path: path.to_path_buf(),
                fragments: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Image files under `dir`, recursively, sorted by path
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory {}", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_image_extension(&path) {
                images.push(path);
            }
        }
    }

    images.sort();
    Ok(images)
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
