//! Pub/Sub Router (C8): subscribe/publish across named channels, dispatch
//! to per-channel handlers, heartbeat responder.
//!
//! Connection-backed publish plus a background `listen_loop` that consumes
//! a fixed set of named channels sharing one envelope shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use lix_core::{LixError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::CacheConfig;

/// The fixed channel set.
pub mod channels {
    pub const SPELLCHECK: &str = "spellcheck";
    pub const GRAMMAR: &str = "grammar";
    pub const LIX: &str = "lix";
    pub const NLP: &str = "nlp";
    pub const CONTROL: &str = "control";
    pub const HEARTBEAT: &str = "heartbeat";

    pub const ALL: &[&str] = &[SPELLCHECK, GRAMMAR, LIX, NLP, CONTROL, HEARTBEAT];
}

/// Inbound/outbound message envelope. `text` covers the
/// top-level placement; `content.text` the nested one. [`Envelope::text`]
/// normalizes between the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub action: Option<String>,
}

impl Envelope {
    /// Resolve the analysis text from either the top-level `text` field or
    /// the nested `content.text` field, whichever is present.
    pub fn resolved_text(&self) -> Option<&str> {
        if let Some(text) = &self.text {
            return Some(text.as_str());
        }
        self.content.as_ref()?.get("text")?.as_str()
    }

    pub fn correlation_ids(&self) -> (String, String) {
        (self.client_id.clone(), self.request_id.clone())
    }
}

/// A successful or errored reply, echoing the envelope's correlation ids.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
}

impl Reply {
    pub fn ok(client_id: String, request_id: String, content: Value) -> Self {
        Self { client_id, request_id, content: Some(content), error: None, timestamp: Utc::now().timestamp_millis() }
    }

    pub fn err(client_id: String, request_id: String, error: &LixError) -> Self {
        Self {
            client_id,
            request_id,
            content: None,
            error: Some(error.kind().to_string()),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Control-channel status payload, published online at startup and
/// offline at shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub action: &'static str,
    pub service: &'static str,
    pub status: &'static str,
    pub capabilities: Vec<&'static str>,
    pub timestamp: i64,
}

impl StatusPayload {
    pub fn online() -> Self {
        Self {
            action: "status",
            service: "lix",
            status: "online",
            capabilities: vec!["readability_score", "sentence_analysis", "text_complexity"],
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn offline() -> Self {
        Self {
            action: "status",
            service: "lix",
            status: "offline",
            capabilities: vec!["readability_score", "sentence_analysis", "text_complexity"],
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Heartbeat reply: `{action: "pong", service, status, metrics, timestamp}`.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatReply {
    pub action: &'static str,
    pub service: &'static str,
    pub status: &'static str,
    pub metrics: Value,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterLifecycle {
    Init,
    Ready,
    Draining,
    Closed,
}

/// A registered per-channel handler. Returns `Ok(Some(content))` to publish
/// a success reply, `Ok(None)` for no reply, or `Err` to publish an error
/// reply (correlation ids still attached by the router).
pub type ChannelHandler =
    Arc<dyn Fn(Envelope) -> futures::future::BoxFuture<'static, Result<Option<Value>>> + Send + Sync>;

/// Redis-backed pub/sub router. The connection lazily (re)opens on the next
/// operation if closed, the same reconnect pattern the queue adapter uses.
pub struct PubSubRouter {
    redis_url: String,
    breaker: CircuitBreaker,
    handlers: StdRwLock<HashMap<String, ChannelHandler>>,
    lifecycle: StdRwLock<RouterLifecycle>,
    published: std::sync::atomic::AtomicU64,
    consumed: std::sync::atomic::AtomicU64,
    errors: std::sync::atomic::AtomicU64,
    last_activity_millis: std::sync::atomic::AtomicI64,
}

impl PubSubRouter {
    pub fn new(cache_config: &CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            redis_url: cache_config.redis_url(),
            breaker: CircuitBreaker::new("pubsub", CircuitBreakerConfig::default()),
            handlers: StdRwLock::new(HashMap::new()),
            lifecycle: StdRwLock::new(RouterLifecycle::Init),
            published: std::sync::atomic::AtomicU64::new(0),
            consumed: std::sync::atomic::AtomicU64::new(0),
            errors: std::sync::atomic::AtomicU64::new(0),
            last_activity_millis: std::sync::atomic::AtomicI64::new(0),
        })
    }

    pub fn lifecycle(&self) -> RouterLifecycle {
        *self.lifecycle.read().unwrap()
    }

    /// This service's own channel: `lix`. The router subscribes to this
    /// plus `heartbeat`, not the full sibling-service channel set.
    fn domain_channel(&self) -> &'static str {
        channels::LIX
    }

    /// Milliseconds-since-epoch of the last message this router dispatched,
    /// or `0` if none yet. Used by the HTTP health endpoint's last-activity
    /// probe.
    pub fn last_activity_millis(&self) -> i64 {
        self.last_activity_millis.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Register a handler for `channel`. Handlers are rebuilt as a fresh map
    /// rather than mutated in place under contention.
    pub fn register(&self, channel: impl Into<String>, handler: ChannelHandler) {
        let mut handlers = self.handlers.write().unwrap();
        let mut rebuilt = handlers.clone();
        rebuilt.insert(channel.into(), handler);
        *handlers = rebuilt;
    }

    /// Publish online status on `control`, mark the router ready, and start
    /// the background listen loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        *self.lifecycle.write().unwrap() = RouterLifecycle::Ready;
        self.publish_control_status(StatusPayload::online()).await?;

        let router = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(e) = router.listen_loop().await {
                    error!(error = %e, "pub/sub listener error, reconnecting");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                if router.lifecycle() == RouterLifecycle::Closed {
                    break;
                }
            }
        });

        Ok(())
    }

    /// Publish offline status, mark draining, and stop accepting new work.
    pub async fn shutdown(&self) -> Result<()> {
        *self.lifecycle.write().unwrap() = RouterLifecycle::Draining;
        let _ = self.publish_control_status(StatusPayload::offline()).await;
        *self.lifecycle.write().unwrap() = RouterLifecycle::Closed;
        Ok(())
    }

    async fn publish_control_status(&self, status: StatusPayload) -> Result<()> {
        let json = serde_json::to_string(&status).map_err(LixError::Serialization)?;
        self.publish_raw(channels::CONTROL, &json).await
    }

    pub async fn publish(&self, channel: &str, value: &impl Serialize) -> Result<()> {
        let json = serde_json::to_string(value).map_err(LixError::Serialization)?;
        self.publish_raw(channel, &json).await
    }

    async fn publish_raw(&self, channel: &str, payload: &str) -> Result<()> {
        let url = self.redis_url.clone();
        let channel = channel.to_string();
        let payload = payload.to_string();
        let result = self
            .breaker
            .call(|| async move {
                let client = redis::Client::open(url.as_str())
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis client: {e}")))?;
                let mut conn = client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis connect: {e}")))?;
                redis::cmd("PUBLISH")
                    .arg(&channel)
                    .arg(&payload)
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| LixError::DependencyUnavailable(format!("redis PUBLISH: {e}")))
            })
            .await;

        match &result {
            Ok(()) => {
                self.published.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            Err(_) => {
                self.errors.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
        result
    }

    /// Dispatch an incoming envelope to its channel's registered handler,
    /// publishing the handler's reply (or error reply) back on the same
    /// channel, echoing correlation ids.
    pub async fn dispatch(&self, channel: &str, envelope: Envelope) -> Result<()> {
        self.consumed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.last_activity_millis.store(Utc::now().timestamp_millis(), std::sync::atomic::Ordering::Relaxed);

        if channel == channels::HEARTBEAT && envelope.action.as_deref() == Some("ping") {
            let reply = HeartbeatReply {
                action: "pong",
                service: "lix",
                status: "ok",
                metrics: serde_json::json!({
                    "published": self.published.load(std::sync::atomic::Ordering::Relaxed),
                    "consumed": self.consumed.load(std::sync::atomic::Ordering::Relaxed),
                    "errors": self.errors.load(std::sync::atomic::Ordering::Relaxed),
                }),
                timestamp: Utc::now().timestamp_millis(),
            };
            return self.publish(channels::HEARTBEAT, &reply).await;
        }

        let handler = self.handlers.read().unwrap().get(channel).cloned();
        let Some(handler) = handler else {
            warn!(channel, "no handler registered for channel");
            return Ok(());
        };

        let (client_id, request_id) = envelope.correlation_ids();
        match handler(envelope).await {
            Ok(Some(content)) => {
                let reply = Reply::ok(client_id, request_id, content);
                self.publish(channel, &reply).await
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.errors.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let reply = Reply::err(client_id, request_id, &e);
                self.publish(channel, &reply).await
            }
        }
    }

    async fn listen_loop(&self) -> Result<()> {
        let client = redis::Client::open(self.redis_url.as_str())
            .map_err(|e| LixError::DependencyUnavailable(format!("redis client: {e}")))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| LixError::DependencyUnavailable(format!("redis pubsub: {e}")))?;

        for channel in [self.domain_channel(), channels::HEARTBEAT] {
            pubsub
                .subscribe(channel)
                .await
                .map_err(|e| LixError::DependencyUnavailable(format!("redis SUBSCRIBE {channel}: {e}")))?;
        }

        info!(domain_channel = self.domain_channel(), "pub/sub listener subscribed");

        loop {
            if self.lifecycle() == RouterLifecycle::Closed {
                return Ok(());
            }
            let Some(msg) = pubsub.on_message().next().await else {
                return Ok(());
            };
            let channel_name: String = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "failed to read pub/sub payload");
                    continue;
                }
            };
            match serde_json::from_str::<Envelope>(&payload) {
                Ok(envelope) => {
                    if let Err(e) = self.dispatch(&channel_name, envelope).await {
                        error!(channel = %channel_name, error = %e, "dispatch failed");
                    }
                }
                Err(e) => {
                    warn!(channel = %channel_name, error = %e, "failed to parse envelope");
                }
            }
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_top_level_text() {
        let envelope = Envelope {
            client_id: "c1".into(),
            request_id: "r1".into(),
            text: Some("hei".into()),
            content: None,
            options: None,
            is_critical: false,
            priority: None,
            timestamp: None,
            action: None,
        };
        assert_eq!(envelope.resolved_text(), Some("hei"));
    }

    #[test]
    fn resolves_nested_content_text() {
        let envelope = Envelope {
            client_id: "c1".into(),
            request_id: "r1".into(),
            text: None,
            content: Some(serde_json::json!({"text": "hei der"})),
            options: None,
            is_critical: false,
            priority: None,
            timestamp: None,
            action: None,
        };
        assert_eq!(envelope.resolved_text(), Some("hei der"));
    }

    #[test]
    fn channel_set_is_fixed() {
        assert_eq!(channels::ALL.len(), 6);
        assert!(channels::ALL.contains(&channels::LIX));
        assert!(channels::ALL.contains(&channels::HEARTBEAT));
    }

    #[test]
    fn status_payload_capabilities_are_fixed() {
        let status = StatusPayload::online();
        assert_eq!(status.status, "online");
        assert_eq!(status.capabilities, vec!["readability_score", "sentence_analysis", "text_complexity"]);
    }
}
