use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::AttemptStage;

/// Counters for the label reading workflow.
///
/// Cheap to clone; every clone records into the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Pipeline
    images_processed: AtomicUsize,
    primary_accepts: AtomicUsize,
    fallback_accepts: AtomicUsize,
    processing_failures: AtomicUsize,
    rejected_attempts: AtomicUsize,
    pipeline_duration_ms: RwLock<Vec<u64>>,

    // Orientation
    orientation_fallbacks: AtomicUsize,
    rotations_applied: AtomicUsize,

    // Input
    decode_errors: AtomicUsize,

    // Care model
    care_calls_total: AtomicUsize,
    care_calls_failed: AtomicUsize,
    care_latency_ms: RwLock<Vec<u64>>,
    circuit_breaker_trips: AtomicUsize,

    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                images_processed: AtomicUsize::new(0),
                primary_accepts: AtomicUsize::new(0),
                fallback_accepts: AtomicUsize::new(0),
                processing_failures: AtomicUsize::new(0),
                rejected_attempts: AtomicUsize::new(0),
                pipeline_duration_ms: RwLock::new(Vec::new()),
                orientation_fallbacks: AtomicUsize::new(0),
                rotations_applied: AtomicUsize::new(0),
                decode_errors: AtomicUsize::new(0),
                care_calls_total: AtomicUsize::new(0),
                care_calls_failed: AtomicUsize::new(0),
                care_latency_ms: RwLock::new(Vec::new()),
                circuit_breaker_trips: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    /// One image went through the pipeline, whatever the outcome
    pub fn record_image_processed(&self, duration: Duration) {
        self.inner.images_processed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .pipeline_duration_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_accept(&self, stage: AttemptStage) {
        let counter = match stage {
            AttemptStage::Primary => &self.inner.primary_accepts,
            AttemptStage::Fallback => &self.inner.fallback_accepts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_attempt(&self) {
        self.inner.rejected_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processing_failure(&self) {
        self.inner.processing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orientation_fallback(&self) {
        self.inner.orientation_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation_applied(&self) {
        self.inner.rotations_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.inner.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_care_call(&self, success: bool, duration: Duration) {
        self.inner.care_calls_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.care_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .care_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_circuit_breaker_trip(&self) {
        self.inner.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_requests(&self, endpoint: &str) -> usize {
        self.inner
            .endpoint_counters
            .get(endpoint)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self.inner.pipeline_duration_ms.read();
        let pipeline_avg_ms = avg(&durations);
        let pipeline_p95_ms = percentile(&durations, 0.95);
        drop(durations);

        let care_latency = self.inner.care_latency_ms.read();
        let care_latency_avg_ms = avg(&care_latency);
        drop(care_latency);

        MetricsSnapshot {
            images_processed: self.inner.images_processed.load(Ordering::Relaxed),
            primary_accepts: self.inner.primary_accepts.load(Ordering::Relaxed),
            fallback_accepts: self.inner.fallback_accepts.load(Ordering::Relaxed),
            processing_failures: self.inner.processing_failures.load(Ordering::Relaxed),
            rejected_attempts: self.inner.rejected_attempts.load(Ordering::Relaxed),
            pipeline_avg_ms,
            pipeline_p95_ms,
            orientation_fallbacks: self.inner.orientation_fallbacks.load(Ordering::Relaxed),
            rotations_applied: self.inner.rotations_applied.load(Ordering::Relaxed),
            decode_errors: self.inner.decode_errors.load(Ordering::Relaxed),
            care_calls_total: self.inner.care_calls_total.load(Ordering::Relaxed),
            care_calls_failed: self.inner.care_calls_failed.load(Ordering::Relaxed),
            care_latency_avg_ms,
            circuit_breaker_trips: self.inner.circuit_breaker_trips.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP images_processed_total Images run through the recognition pipeline
# TYPE images_processed_total counter
images_processed_total {{}} {}

# HELP extractions_accepted_total Accepted extraction attempts by stage
# TYPE extractions_accepted_total counter
extractions_accepted_total {{stage="primary"}} {}
extractions_accepted_total {{stage="fallback"}} {}

# HELP extraction_attempts_rejected_total Extraction attempts rejected by the quality gate
# TYPE extraction_attempts_rejected_total counter
extraction_attempts_rejected_total {{}} {}

# HELP processing_failures_total Images for which every attempt was rejected
# TYPE processing_failures_total counter
processing_failures_total {{}} {}

# HELP pipeline_avg_duration_ms Average pipeline duration in milliseconds
# TYPE pipeline_avg_duration_ms gauge
pipeline_avg_duration_ms {{}} {}

# HELP orientation_fallbacks_total Orientation queries that degraded to no rotation
# TYPE orientation_fallbacks_total counter
orientation_fallbacks_total {{}} {}

# HELP rotations_applied_total Images rotated before extraction
# TYPE rotations_applied_total counter
rotations_applied_total {{}} {}

# HELP decode_errors_total Uploads that were not valid images
# TYPE decode_errors_total counter
decode_errors_total {{}} {}

# HELP care_calls_total Care model requests
# TYPE care_calls_total counter
care_calls_total {{}} {}

# HELP care_calls_failed_total Failed care model requests
# TYPE care_calls_failed_total counter
care_calls_failed_total {{}} {}

# HELP circuit_breaker_trips_total Total circuit breaker trips
# TYPE circuit_breaker_trips_total counter
circuit_breaker_trips_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.images_processed,
            snapshot.primary_accepts,
            snapshot.fallback_accepts,
            snapshot.rejected_attempts,
            snapshot.processing_failures,
            snapshot.pipeline_avg_ms,
            snapshot.orientation_fallbacks,
            snapshot.rotations_applied,
            snapshot.decode_errors,
            snapshot.care_calls_total,
            snapshot.care_calls_failed,
            snapshot.circuit_breaker_trips,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub images_processed: usize,
    pub primary_accepts: usize,
    pub fallback_accepts: usize,
    pub processing_failures: usize,
    pub rejected_attempts: usize,
    pub pipeline_avg_ms: u64,
    pub pipeline_p95_ms: u64,
    pub orientation_fallbacks: usize,
    pub rotations_applied: usize,
    pub decode_errors: usize,
    pub care_calls_total: usize,
    pub care_calls_failed: usize,
    pub care_latency_avg_ms: u64,
    pub circuit_breaker_trips: usize,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_image_processed(Duration::from_millis(100));
        metrics.record_image_processed(Duration::from_millis(300));
        metrics.record_accept(AttemptStage::Primary);
        metrics.record_rejected_attempt();
        metrics.record_accept(AttemptStage::Fallback);
        metrics.record_orientation_fallback();
        metrics.record_care_call(false, Duration::from_millis(20));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.images_processed, 2);
        assert_eq!(snapshot.primary_accepts, 1);
        assert_eq!(snapshot.fallback_accepts, 1);
        assert_eq!(snapshot.rejected_attempts, 1);
        assert_eq!(snapshot.pipeline_avg_ms, 200);
        assert_eq!(snapshot.orientation_fallbacks, 1);
        assert_eq!(snapshot.care_calls_total, 1);
        assert_eq!(snapshot.care_calls_failed, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let clone = metrics.clone();
        clone.record_decode_error();
        clone.record_endpoint_request("/upload");

        assert_eq!(metrics.snapshot().decode_errors, 1);
        assert_eq!(metrics.endpoint_requests("/upload"), 1);
        assert_eq!(metrics.endpoint_requests("/extract"), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_image_processed(Duration::from_millis(10));
        metrics.record_accept(AttemptStage::Fallback);

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("images_processed_total {} 1"));
        assert!(prometheus.contains("extractions_accepted_total {stage=\"fallback\"} 1"));
        assert!(prometheus.contains("extractions_accepted_total {stage=\"primary\"} 0"));
    }
}
