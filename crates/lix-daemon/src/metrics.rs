//! Prometheus metrics for the lix daemon.
//!
//! Exposes HTTP, cache, pub/sub, queue, circuit-breaker, and job/batch
//! metrics in Prometheus text format for scraping.

#![allow(dead_code)]

use std::sync::LazyLock;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();

    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone())).unwrap();
    registry.register(Box::new(HTTP_REQUEST_DURATION.clone())).unwrap();
    registry.register(Box::new(ANALYSES_TOTAL.clone())).unwrap();
    registry.register(Box::new(ANALYSIS_DURATION.clone())).unwrap();
    registry.register(Box::new(CACHE_HITS_TOTAL.clone())).unwrap();
    registry.register(Box::new(CACHE_MISSES_TOTAL.clone())).unwrap();
    registry.register(Box::new(CACHE_CONNECTED.clone())).unwrap();
    registry.register(Box::new(PUBSUB_PUBLISHED_TOTAL.clone())).unwrap();
    registry.register(Box::new(PUBSUB_CONSUMED_TOTAL.clone())).unwrap();
    registry.register(Box::new(PUBSUB_ERRORS_TOTAL.clone())).unwrap();
    registry.register(Box::new(QUEUE_PUBLISHED_TOTAL.clone())).unwrap();
    registry.register(Box::new(QUEUE_CONSUMED_TOTAL.clone())).unwrap();
    registry.register(Box::new(QUEUE_ERRORS_TOTAL.clone())).unwrap();
    registry.register(Box::new(QUEUE_CONNECTED.clone())).unwrap();
    registry.register(Box::new(CIRCUIT_STATE.clone())).unwrap();
    registry.register(Box::new(JOBS_TOTAL.clone())).unwrap();
    registry.register(Box::new(JOBS_IN_PROGRESS.clone())).unwrap();
    registry.register(Box::new(BATCH_JOBS_TOTAL.clone())).unwrap();
    registry.register(Box::new(WEBSOCKET_CONNECTIONS.clone())).unwrap();
    registry.register(Box::new(WEBSOCKET_MESSAGES_TOTAL.clone())).unwrap();

    registry
});

pub static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lix_http_requests_total", "Total number of HTTP requests").namespace("lix").subsystem("http"),
        &["endpoint", "method", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new("lix_http_request_duration_seconds", "HTTP request duration in seconds")
            .namespace("lix")
            .subsystem("http")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint", "method"],
    )
    .unwrap()
});

/// Total readability analyses performed, by size class and cache outcome.
pub static ANALYSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lix_analyses_total", "Total readability analyses performed").namespace("lix").subsystem("analysis"),
        &["size_class", "cache_outcome"],
    )
    .unwrap()
});

pub static ANALYSIS_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new("lix_analysis_duration_seconds", "Analysis processing duration in seconds")
            .namespace("lix")
            .subsystem("analysis")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["size_class"],
    )
    .unwrap()
});

pub static CACHE_HITS_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_cache_hits_total", "Total analysis cache hits").unwrap());

pub static CACHE_MISSES_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_cache_misses_total", "Total analysis cache misses").unwrap());

pub static CACHE_CONNECTED: LazyLock<IntGauge> =
    LazyLock::new(|| IntGauge::new("lix_cache_connected", "Redis cache connection status (1=connected, 0=disconnected)").unwrap());

pub static PUBSUB_PUBLISHED_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_pubsub_published_total", "Total messages published to pub/sub channels").unwrap());

pub static PUBSUB_CONSUMED_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_pubsub_consumed_total", "Total messages consumed from pub/sub channels").unwrap());

pub static PUBSUB_ERRORS_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_pubsub_errors_total", "Total pub/sub dispatch errors").unwrap());

pub static QUEUE_PUBLISHED_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_queue_published_total", "Total messages published to the persistent queue").unwrap());

pub static QUEUE_CONSUMED_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_queue_consumed_total", "Total messages consumed from the persistent queue").unwrap());

pub static QUEUE_ERRORS_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| IntCounter::new("lix_queue_errors_total", "Total persistent queue errors").unwrap());

pub static QUEUE_CONNECTED: LazyLock<IntGauge> =
    LazyLock::new(|| IntGauge::new("lix_queue_connected", "AMQP connection status (1=connected, 0=disconnected)").unwrap());

/// Circuit breaker state by adapter name: 0=closed, 1=half-open, 2=open.
pub static CIRCUIT_STATE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new("lix_circuit_state", "Circuit breaker state (0=closed, 1=half-open, 2=open)")
            .namespace("lix")
            .subsystem("circuit"),
        &["adapter"],
    )
    .unwrap()
});

pub static JOBS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lix_jobs_total", "Total background jobs by terminal status").namespace("lix").subsystem("job"),
        &["status"],
    )
    .unwrap()
});

pub static JOBS_IN_PROGRESS: LazyLock<IntGauge> =
    LazyLock::new(|| IntGauge::new("lix_jobs_in_progress", "Background jobs currently processing").unwrap());

pub static BATCH_JOBS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lix_batch_jobs_total", "Total batch jobs by terminal status").namespace("lix").subsystem("batch"),
        &["status"],
    )
    .unwrap()
});

pub static WEBSOCKET_CONNECTIONS: LazyLock<IntGauge> =
    LazyLock::new(|| IntGauge::new("lix_websocket_connections", "Active WebSocket streaming connections").unwrap());

pub static WEBSOCKET_MESSAGES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lix_websocket_messages_total", "Total WebSocket messages").namespace("lix").subsystem("websocket"),
        &["direction"],
    )
    .unwrap()
});

pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

pub fn record_http_request(endpoint: &str, method: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL.with_label_values(&[endpoint, method, &status.to_string()]).inc();
    HTTP_REQUEST_DURATION.with_label_values(&[endpoint, method]).observe(duration_secs);
}

pub fn record_analysis(size_class: &str, cache_outcome: &str, duration_secs: f64) {
    ANALYSES_TOTAL.with_label_values(&[size_class, cache_outcome]).inc();
    ANALYSIS_DURATION.with_label_values(&[size_class]).observe(duration_secs);
}

pub fn record_cache_outcome(hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.inc();
    } else {
        CACHE_MISSES_TOTAL.inc();
    }
}

pub fn set_cache_connected(connected: bool) {
    CACHE_CONNECTED.set(i64::from(connected));
}

pub fn set_queue_connected(connected: bool) {
    QUEUE_CONNECTED.set(i64::from(connected));
}

pub fn set_circuit_state(adapter: &str, state: crate::circuit_breaker::CircuitState) {
    let value = match state {
        crate::circuit_breaker::CircuitState::Closed => 0,
        crate::circuit_breaker::CircuitState::HalfOpen => 1,
        crate::circuit_breaker::CircuitState::Open => 2,
    };
    CIRCUIT_STATE.with_label_values(&[adapter]).set(value);
}

pub fn record_job_terminal(status: &str) {
    JOBS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_batch_terminal(status: &str) {
    BATCH_JOBS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_websocket_connection(connected: bool) {
    if connected {
        WEBSOCKET_CONNECTIONS.inc();
    } else {
        WEBSOCKET_CONNECTIONS.dec();
    }
}

pub fn record_websocket_message(direction: &str) {
    WEBSOCKET_MESSAGES_TOTAL.with_label_values(&[direction]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_encode_contains_registered_families() {
        record_http_request("/analyze", "POST", 200, 0.01);
        set_cache_connected(true);
        record_job_terminal("completed");

        let output = encode_metrics();
        assert!(output.contains("lix_http_requests_total"));
        assert!(output.contains("lix_cache_connected"));
        assert!(output.contains("lix_jobs_total"));
    }

    #[test]
    fn circuit_state_values() {
        set_circuit_state("cache", crate::circuit_breaker::CircuitState::Open);
        let output = encode_metrics();
        assert!(output.contains("lix_circuit_state"));
    }
}
