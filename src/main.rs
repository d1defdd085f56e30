// Main entry point for the plant label reading service

use plant_label_workflow::{
    core::{errors::CareError, Config},
    orchestration::RecognitionOrchestrator,
    services::{CareExtractor, ImageprocOps, PlantCare, ReminderSchedule, TesseractEngine},
    utils::{decode_image_async, Metrics},
};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    engine: Arc<TesseractEngine>,
    orchestrator: Arc<RecognitionOrchestrator>,
    care: Arc<CareExtractor>,
    metrics: Metrics,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    fragments: Vec<String>,
    text: String,
    care: PlantCare,
    schedule: ReminderSchedule,
}

#[derive(Debug, Deserialize)]
struct ExtractRequest {
    ocr_text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "plant_label_workflow={},tower_http=warn",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== PLANT LABEL READER ===");
    info!(
        "Config: primary=`{}` fallback=`{}` threshold={} min_lines={} model={}",
        config.pipeline().primary,
        config.pipeline().fallback,
        config.quality.confidence_threshold,
        config.quality.min_lines,
        config.care_model_name()
    );

    let metrics = Metrics::new();

    let engine = Arc::new(TesseractEngine::new(config.tesseract_cmd()));
    if !engine.is_available() {
        warn!(
            "OCR engine '{}' not found; uploads will fail until it is installed",
            engine.program()
        );
    }

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        Arc::new(ImageprocOps::new()),
        engine.clone(),
        config.pipeline(),
        Some(metrics.clone()),
    ));
    let care = Arc::new(CareExtractor::new(&config, None, Some(metrics.clone()))?);

    let state = AppState {
        config: config.clone(),
        engine,
        orchestrator,
        care,
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/upload", post(upload))
        .route("/extract", post(extract))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /         - Root endpoint");
    info!("  GET  /health   - Health check");
    info!("  GET  /metrics  - Prometheus metrics");
    info!("  GET  /stats    - Detailed statistics");
    info!("  POST /upload   - Read a label photo (multipart field 'file')");
    info!("  POST /extract  - Care instructions from label text (JSON)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Plant Label Reader - upload a photo of a plant care label"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engine = state.engine.clone();
    let tesseract = tokio::task::spawn_blocking(move || engine.is_available())
        .await
        .unwrap_or(false);

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "tesseract": tesseract,
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    serde_json::to_value(state.metrics.snapshot())
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize metrics: {}", e),
            )
        })
}

/// Read a label photo and derive care instructions and a watering schedule
///
/// # Request Format:
/// - multipart/form-data
/// - Field "file": one image (PNG/JPEG)
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let start_time = std::time::Instant::now();
    state.metrics.record_endpoint_request("/upload");

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("label").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;
            upload = Some((filename, data.to_vec()));
        }
    }

    let (filename, bytes) =
        upload.ok_or((StatusCode::BAD_REQUEST, "No file provided".to_string()))?;
    info!("Received {} ({} bytes)", filename, bytes.len());

    let image = decode_image_async(bytes).await.map_err(|e| {
        state.metrics.record_decode_error();
        (StatusCode::BAD_REQUEST, format!("Invalid image: {}", e))
    })?;

    // OCR calls block; the deadline is enforced around the worker
    let orchestrator = state.orchestrator.clone();
    let task = tokio::task::spawn_blocking(move || orchestrator.process(&image));
    let fragments = tokio::time::timeout(state.config.process_timeout(), task)
        .await
        .map_err(|_| {
            error!("Processing {} timed out", filename);
            (
                StatusCode::GATEWAY_TIMEOUT,
                "Image processing timed out".to_string(),
            )
        })?
        .map_err(|e| {
            error!("Processing task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Image processing failed".to_string(),
            )
        })?
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let text = fragments.join("\n");
    let care = state
        .care
        .extract(&text)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    let schedule = ReminderSchedule::for_care(&care, &text, chrono::Local::now().date_naive());

    info!(
        "Request completed in {:.2}s: '{}' watered {:?}",
        start_time.elapsed().as_secs_f64(),
        care.name,
        care.watering_frequency
    );

    Ok(Json(UploadResponse {
        fragments,
        text,
        care,
        schedule,
    }))
}

/// Care instructions from already-extracted label text
async fn extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<PlantCare>, (StatusCode, String)> {
    state.metrics.record_endpoint_request("/extract");

    state.care.extract(&request.ocr_text).await.map(Json).map_err(|e| {
        let status = match e {
            CareError::Uninterpretable | CareError::InvalidResponse { .. } => {
                StatusCode::BAD_REQUEST
            }
            CareError::RequestFailed(_) | CareError::BadStatus { .. } | CareError::CircuitOpen => {
                StatusCode::BAD_GATEWAY
            }
        };
        (status, e.to_string())
    })
}
