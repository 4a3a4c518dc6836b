use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all GreenBox metrics
const PREFIX: &str = "greenbox";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Publishing Metrics
    pub static ref PUBLISH_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_publish_runs_total"), "Publishing runs by outcome"),
        &["outcome"]
    ).expect("Failed to create publish_runs_total metric");

    pub static ref PUBLISH_TRIGGERS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_publish_triggers_total"), "Publishing trigger requests by credential"),
        &["credential"]
    ).expect("Failed to create publish_triggers_total metric");

    pub static ref SONGS_PUBLISHED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_songs_published_total"),
        "Songs flipped to published"
    ).expect("Failed to create songs_published_total metric");

    pub static ref PUBLISH_SIDE_EFFECT_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_publish_side_effect_failures_total"),
            "Failed release side effects by step"
        ),
        &["step"]
    ).expect("Failed to create publish_side_effect_failures_total metric");

    // Play Count Metrics
    pub static ref PLAY_INCREMENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_play_increments_total"), "Play count increments by outcome"),
        &["outcome"]
    ).expect("Failed to create play_increments_total metric");

    // Background Job Metrics
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_background_job_executions_total"),
            "Background job executions by job and status"
        ),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Already-registered errors are ignored so tests can call this repeatedly
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PUBLISH_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PUBLISH_TRIGGERS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SONGS_PUBLISHED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PUBLISH_SIDE_EFFECT_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PLAY_INCREMENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Outcome is one of `ok`, `empty`, `error` or `unauthorized`.
pub fn record_publish_run(outcome: &str) {
    PUBLISH_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_publish_trigger(credential: &str) {
    PUBLISH_TRIGGERS_TOTAL.with_label_values(&[credential]).inc();
}

pub fn record_song_published() {
    SONGS_PUBLISHED_TOTAL.inc();
}

pub fn record_publish_side_effect_failure(step: &str) {
    PUBLISH_SIDE_EFFECT_FAILURES_TOTAL
        .with_label_values(&[step])
        .inc();
}

pub fn record_play_increment(outcome: &str) {
    PLAY_INCREMENTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a finished background job execution
pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();

    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
