//! Batch label reader - runs the recognition pipeline over a directory of photos
//! Run with: cargo run --release --bin label_batch -- <image_dir> [--json]

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use plant_label_workflow::{
    orchestration::{collect_images, BatchRunner, RecognitionOrchestrator},
    services::{ImageprocOps, TesseractEngine},
    utils::Metrics,
    Config,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plant_label_workflow=info".into()),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let image_dir = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "test_images".to_string());
    let as_json = args.iter().any(|a| a == "--json");

    if !Path::new(&image_dir).is_dir() {
        eprintln!("Image directory not found: {}", image_dir);
        std::process::exit(1);
    }

    let config = Config::new()?;
    let engine = TesseractEngine::new(config.tesseract_cmd());
    if !engine.is_available() {
        eprintln!("OCR engine '{}' is not available", engine.program());
        std::process::exit(1);
    }

    let paths = collect_images(Path::new(&image_dir))?;
    info!("Found {} image(s) in {}", paths.len(), image_dir);

    let metrics = Metrics::new();
    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        Arc::new(ImageprocOps::new()),
        Arc::new(engine),
        config.pipeline(),
        Some(metrics.clone()),
    ));
    let runner = BatchRunner::new(orchestrator, config.batch_threads(), Some(metrics.clone()))?;
    let report = runner.run(&paths);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for result in &report.results {
        println!("\n=== {} ===", result.path.display());
        match (&result.fragments, &result.error) {
            (Some(fragments), _) => {
                for (i, fragment) in fragments.iter().enumerate() {
                    println!("  {}. {}", i + 1, fragment.trim());
                }
            }
            (None, Some(error)) => println!("  FAILED: {}", error),
            (None, None) => println!("  FAILED"),
        }
    }

    let snapshot = metrics.snapshot();
    println!("\n=== Summary ===");
    println!("Accepted: {} / {}", report.accepted, report.results.len());
    println!(
        "  primary: {}, fallback: {}",
        snapshot.primary_accepts, snapshot.fallback_accepts
    );
    println!("Failed: {}", report.failed);
    println!("Rotated: {}", snapshot.rotations_applied);
    println!("Time: {:.2}s", report.duration_ms as f64 / 1000.0);

    Ok(())
}
