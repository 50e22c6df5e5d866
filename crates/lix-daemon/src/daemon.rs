//! HTTP surface (C11): request/response handlers, router construction, and
//! the aggregate health endpoint.
//!
//! Application state lives behind one `Arc`, shared into the router via
//! `Router::with_state`. The `/health` handler probes every adapter
//! (cache, queue, pub/sub, circuit breakers) rather than just reporting
//! process liveness.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{channel::mpsc, Stream, StreamExt};
use lix_core::job::JobId;
use lix_core::{AnalyzeOptions, LixError, Text, UserContext};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{self, AuthConfig};
use crate::cache::SharedCache;
use crate::config::Config;
use crate::pubsub::PubSubRouter;
use crate::queue::PersistentQueue;
use crate::scheduler::{self, Scheduler};
use crate::validation::{validate_batch_items, validate_priority, validate_text, ValidatedJson};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub cache: SharedCache,
    pub pubsub: Arc<PubSubRouter>,
    pub queue: Arc<PersistentQueue>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

/// Wraps [`LixError`] for the HTTP boundary: a JSON body shaped
/// `{success: false, error, error_type}` with the status code matching the
/// error kind.
pub struct AppError(LixError);

impl From<LixError> for AppError {
    fn from(err: LixError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LixError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LixError::NotFound(_) => StatusCode::NOT_FOUND,
            LixError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            LixError::DependencyUnavailable(_) | LixError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            LixError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LixError::ProcessingError(_) | LixError::Serialization(_) | LixError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
            "error_type": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(custom(function = "validate_text"))]
    pub text: String,
    #[serde(default)]
    pub include_word_analysis: bool,
    #[serde(default = "default_true")]
    pub include_sentence_analysis: bool,
    #[serde(default)]
    pub user_context: Option<UserContext>,
}

fn default_true() -> bool {
    true
}

impl From<&AnalyzeRequest> for AnalyzeOptions {
    fn from(req: &AnalyzeRequest) -> Self {
        Self {
            include_word_analysis: req.include_word_analysis,
            include_sentence_analysis: req.include_sentence_analysis,
            user_context: req.user_context.clone(),
            simplified_recommendations: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Complete(Box<lix_core::AnalysisRecord>),
    Queued { job_id: String, status: &'static str, estimated_completion_seconds: u64 },
}

#[instrument(skip_all)]
async fn analyze(State(state): State<AppState>, ValidatedJson(req): ValidatedJson<AnalyzeRequest>) -> Result<Response, AppError> {
    let started = Instant::now();
    let text = Text::new(req.text.clone());
    let thresholds = state.scheduler.thresholds();
    let size_class = text.size_class(thresholds.small, thresholds.large, thresholds.background);
    let options = AnalyzeOptions::from(&req);

    if text.char_len() > state.scheduler.background_threshold() {
        let job = state.scheduler.submit_background(text, options).await;
        crate::metrics::record_analysis(size_class_label(size_class), "queued", started.elapsed().as_secs_f64());
        return Ok(Json(AnalyzeResponse::Queued {
            job_id: job.id.to_string(),
            status: "queued",
            estimated_completion_seconds: job.estimated_completion_seconds,
        })
        .into_response());
    }

    let fingerprint = lix_core::Fingerprint::compute(
        text.normalized(),
        options.include_word_analysis,
        options.include_sentence_analysis,
    );

    if let Some(cached) = state.cache.get::<lix_core::AnalysisRecord>(&fingerprint).await {
        crate::metrics::record_cache_outcome(true);
        crate::metrics::record_analysis(size_class_label(size_class), "hit", started.elapsed().as_secs_f64());
        return Ok(Json(AnalyzeResponse::Complete(Box::new(cached))).into_response());
    }
    crate::metrics::record_cache_outcome(false);

    let record = state.scheduler.service().analyze(&text, &options);
    let ttl_class = match size_class {
        lix_core::SizeClass::Small => crate::cache::TtlClass::Small,
        lix_core::SizeClass::Large | lix_core::SizeClass::Huge => crate::cache::TtlClass::Large,
        lix_core::SizeClass::Medium => crate::cache::TtlClass::Medium,
    };
    let _ = state.cache.set(&fingerprint, &record, ttl_class).await;

    crate::metrics::record_analysis(size_class_label(size_class), "miss", started.elapsed().as_secs_f64());
    Ok(Json(AnalyzeResponse::Complete(Box::new(record))).into_response())
}

fn size_class_label(class: lix_core::SizeClass) -> &'static str {
    match class {
        lix_core::SizeClass::Small => "small",
        lix_core::SizeClass::Medium => "medium",
        lix_core::SizeClass::Large => "large",
        lix_core::SizeClass::Huge => "huge",
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchItemRequest {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchAnalyzeRequest {
    #[validate(custom(function = "validate_batch_items"))]
    pub items: Vec<BatchItemRequest>,
    #[serde(default = "default_priority")]
    #[validate(custom(function = "validate_priority"))]
    pub priority: i64,
}

fn default_priority() -> i64 {
    5
}

#[instrument(skip_all)]
async fn analyze_batch(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<BatchAnalyzeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let items = req
        .items
        .into_iter()
        .map(|i| lix_core::job::BatchItem { id: i.id, content: i.content })
        .collect();
    let batch = state.scheduler.submit_batch(items, req.priority).await?;
    Ok(Json(serde_json::json!({
        "job_id": batch.id.to_string(),
        "status": "queued",
        "total": batch.total,
    })))
}

#[instrument(skip_all)]
async fn get_batch_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<lix_core::BatchJob>, AppError> {
    let job_id = parse_job_id(&job_id)?;
    state
        .scheduler
        .get_batch(job_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError(LixError::NotFound(format!("batch job {job_id} not found"))))
}

#[instrument(skip_all)]
async fn get_task_status(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<lix_core::JobHandle>, AppError> {
    let job_id = parse_job_id(&task_id)?;
    state
        .scheduler
        .get_job(job_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError(LixError::NotFound(format!("task {job_id} not found"))))
}

fn parse_job_id(raw: &str) -> Result<JobId, AppError> {
    uuid::Uuid::parse_str(raw)
        .map(JobId)
        .map_err(|_| AppError(LixError::InvalidInput(format!("'{raw}' is not a valid job id"))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StreamAnalyzeRequest {
    #[validate(custom(function = "validate_text"))]
    pub text: String,
}

/// Streams each chunk (and the terminal summary) to the client as it is
/// computed, rather than buffering the whole paragraph walk into one
/// response. The background task's `emit` pushes onto an unbounded channel;
/// the receiver half becomes the SSE body, and the sender's `is_closed`
/// state (true once the client drops the connection and the receiver is
/// dropped with it) doubles as the disconnect check passed to
/// `scheduler::stream_chunks`.
#[instrument(skip_all)]
async fn analyze_stream(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<StreamAnalyzeRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let text = Text::new(req.text);
    let scheduler = Arc::clone(&state.scheduler);
    let (tx, rx) = mpsc::unbounded();
    let tx_check = tx.clone();

    tokio::spawn(async move {
        scheduler::stream_chunks(
            scheduler.service(),
            &text,
            move || !tx_check.is_closed(),
            move |item| {
                let _ = tx.unbounded_send(item);
            },
        )
        .await;
    });

    let event_stream = rx.map(|item| {
        let data = serde_json::to_string(&item).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| crate::ws::handle_socket(socket, Arc::clone(&state.scheduler)))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    services: ServiceHealth,
    system: SystemHealth,
    metrics: HealthMetrics,
}

#[derive(Debug, Serialize)]
struct ServiceHealth {
    cache: ComponentHealth,
    messaging: ComponentHealth,
    persistent_queue: ComponentHealth,
    pubsub: ComponentHealth,
}

#[derive(Debug, Serialize)]
struct HealthMetrics {
    cache_hit_ratio: f64,
}

#[derive(Debug, Serialize)]
struct ComponentHealth {
    status: &'static str,
    circuit_state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hit_ratio: Option<f64>,
}

impl ComponentHealth {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

#[derive(Debug, Serialize)]
struct SystemHealth {
    cpu_percent: f64,
    memory_percent: f64,
    disk_percent: f64,
}

fn circuit_label(state: crate::circuit_breaker::CircuitState) -> &'static str {
    match state {
        crate::circuit_breaker::CircuitState::Closed => "closed",
        crate::circuit_breaker::CircuitState::HalfOpen => "half-open",
        crate::circuit_breaker::CircuitState::Open => "open",
    }
}

/// Probes every adapter (cache, the AMQP persistent queue, and the redis
/// pub/sub router) and reports `degraded` the instant any one of them is
/// down: a single degraded service degrades the whole.
///
/// `messaging` mirrors `persistent_queue`'s status: `MessagingConfig` *is*
/// the AMQP connection settings, so the two keys describe one adapter
/// under two names (see DESIGN.md).
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache_alive = state.cache.ping().await;
    let mut system = System::new();
    system.refresh_memory();
    let load = scheduler::sample_system_load(&mut system);
    let disk_percent = read_disk_percent();

    let cache = ComponentHealth {
        status: if cache_alive { "up" } else { "down" },
        circuit_state: circuit_label(state.cache.breaker().state()),
        hit_ratio: Some(state.cache.hit_ratio()),
    };
    let persistent_queue = ComponentHealth {
        status: match state.queue.connection_state() {
            crate::queue::ConnectionState::Connected => "up",
            crate::queue::ConnectionState::Disconnected => "down",
        },
        circuit_state: circuit_label(state.queue.breaker().state()),
        hit_ratio: None,
    };
    let messaging = ComponentHealth {
        status: persistent_queue.status,
        circuit_state: persistent_queue.circuit_state,
        hit_ratio: None,
    };
    let pubsub = ComponentHealth {
        status: match state.pubsub.lifecycle() {
            crate::pubsub::RouterLifecycle::Ready => "up",
            crate::pubsub::RouterLifecycle::Init => "unknown",
            crate::pubsub::RouterLifecycle::Draining | crate::pubsub::RouterLifecycle::Closed => "down",
        },
        circuit_state: circuit_label(state.pubsub.breaker().state()),
        hit_ratio: None,
    };

    let all_up = cache.is_up() && messaging.is_up() && persistent_queue.is_up() && pubsub.is_up();

    Json(HealthResponse {
        status: if all_up { "healthy" } else { "degraded" },
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services: ServiceHealth { cache, messaging, persistent_queue, pubsub },
        system: SystemHealth { cpu_percent: load.cpu_percent, memory_percent: load.mem_percent, disk_percent },
        metrics: HealthMetrics { cache_hit_ratio: state.cache.hit_ratio() },
    })
}

/// Disk usage isn't wired through `sysinfo::System`'s CPU/memory refresh;
/// read it directly from the `Disks` collector the way `cca-daemon`'s own
/// health probe samples its resource snapshot.
fn read_disk_percent() -> f64 {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let Some(disk) = disks.list().first() else { return 0.0 };
    let total = disk.total_space();
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(disk.available_space());
    (used as f64 / total as f64) * 100.0
}

async fn metrics_endpoint() -> impl IntoResponse {
    ([("Content-Type", "text/plain; version=0.0.4")], crate::metrics::encode_metrics())
}

/// Construct the full router: analysis endpoints, task/batch status, the
/// typing WebSocket, health, and metrics, layered with tracing.
pub fn build_router(state: AppState) -> Router {
    let auth_config = AuthConfig { shared_key: state.config.daemon.shared_key.clone() };

    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyze/batch", post(analyze_batch))
        .route("/analyze/batch/:job_id", get(get_batch_status))
        .route("/analyze/stream", post(analyze_stream))
        .route("/task/:task_id", get(get_task_status))
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .layer(middleware::from_fn_with_state(auth_config, auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn log_routes() {
    info!("routes: POST /analyze, POST /analyze/batch, GET /analyze/batch/:job_id, POST /analyze/stream, GET /task/:task_id, GET /ws, GET /health, GET /metrics");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_class_labels_are_stable() {
        assert_eq!(size_class_label(lix_core::SizeClass::Small), "small");
        assert_eq!(size_class_label(lix_core::SizeClass::Huge), "huge");
    }

    #[test]
    fn parse_job_id_rejects_garbage() {
        assert!(parse_job_id("not-a-uuid").is_err());
    }

    #[test]
    fn analyze_options_from_request_respects_defaults() {
        let req = AnalyzeRequest {
            text: "hei".to_string(),
            include_word_analysis: false,
            include_sentence_analysis: true,
            user_context: None,
        };
        let options = AnalyzeOptions::from(&req);
        assert!(!options.include_word_analysis);
        assert!(options.include_sentence_analysis);
    }

    /// Builds an `AppState` with no live Redis/AMQP connection: every
    /// adapter constructor is lazy, so the router can be exercised with
    /// `tower::ServiceExt::oneshot` without a network bind. Cache/queue/
    /// pub-sub calls made by handlers degrade to their "unavailable"
    /// outcome, same as a fresh deploy whose dependencies aren't up yet.
    fn test_state() -> AppState {
        let config = Arc::new(Config::default());
        let cache = crate::cache::CacheLayer::connect(&config.cache).expect("pool construction is lazy");
        let cache = Arc::new(cache);
        let service = Arc::new(lix_core::ReadabilityService::new());
        let scheduler = Scheduler::new(service, cache.clone(), &config);
        let queue = crate::queue::PersistentQueue::new(&config.messaging);
        let pubsub = crate::pubsub::PubSubRouter::new(&config.cache);
        AppState { scheduler, cache, pubsub, queue, config, started_at: Instant::now() }
    }

    #[tokio::test]
    async fn health_endpoint_always_returns_200() {
        use tower::ServiceExt;

        let router = build_router(test_state());
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn analyze_endpoint_rejects_empty_text() {
        use tower::ServiceExt;

        let router = build_router(test_state());
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(r#"{"text": "   "}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_endpoint_returns_metrics_for_valid_text() {
        use tower::ServiceExt;

        let router = build_router(test_state());
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(r#"{"text": "Korte setninger er lettere å lese enn lange."}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("metrics").is_some());
    }
}
