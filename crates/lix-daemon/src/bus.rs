//! Wires the pub/sub router (C8) to the readability service and the
//! persistent queue (C9): the domain-channel handler registered on `lix`,
//! and the queue consumer handler that performs the deferred analysis for
//! critical requests.
//!
//! The service and queue are passed in explicitly at startup rather than
//! reached for lazily from inside the handler.

use std::sync::Arc;

use chrono::Utc;
use lix_core::{AnalyzeOptions, Fingerprint, LixError, Result, Text, UserContext};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::{CacheLayer, TtlClass};
use crate::pubsub::{channels, ChannelHandler, Envelope, PubSubRouter};
use crate::queue::{PersistentQueue, QueueHandler};
use crate::scheduler::Scheduler;

fn ttl_class_for(size_class: lix_core::SizeClass) -> TtlClass {
    match size_class {
        lix_core::SizeClass::Small => TtlClass::Small,
        lix_core::SizeClass::Large | lix_core::SizeClass::Huge => TtlClass::Large,
        lix_core::SizeClass::Medium => TtlClass::Medium,
    }
}

/// Pull `include_word_analysis` / `include_sentence_analysis` / `user_context`
/// out of whichever of `options` or `content` carries them. The envelope
/// normalizes `text` placement (top-level vs. `content.text`) just as
/// loosely, so both are checked here.
fn envelope_options(envelope: &Envelope) -> AnalyzeOptions {
    let mut options = AnalyzeOptions::default();
    for source in [envelope.options.as_ref(), envelope.content.as_ref()] {
        let Some(obj) = source else { continue };
        if let Some(v) = obj.get("include_word_analysis").and_then(Value::as_bool) {
            options.include_word_analysis = v;
        }
        if let Some(v) = obj.get("include_sentence_analysis").and_then(Value::as_bool) {
            options.include_sentence_analysis = v;
        }
        if let Some(ctx) = obj.get("user_context") {
            if let Ok(parsed) = serde_json::from_value::<UserContext>(ctx.clone()) {
                options.user_context = Some(parsed);
            }
        }
    }
    options
}

/// Run one analysis request end to end: cache lookup, service call, cache
/// write. The same path `POST /analyze` takes, shared here so bus traffic
/// gets identical caching behavior.
async fn run_analysis(scheduler: &Scheduler, cache: &CacheLayer, text: &str, options: &AnalyzeOptions) -> Result<lix_core::AnalysisRecord> {
    if text.trim().is_empty() {
        return Err(LixError::InvalidInput("text must not be empty".into()));
    }
    let text = Text::new(text.to_string());
    let fp = Fingerprint::compute(text.normalized(), options.include_word_analysis, options.include_sentence_analysis);

    if let Some(cached) = cache.get::<lix_core::AnalysisRecord>(&fp).await {
        return Ok(cached);
    }

    let record = scheduler.service().analyze(&text, options);
    let class = ttl_class_for(text.size_class(scheduler.thresholds().small, scheduler.thresholds().large, usize::MAX));
    let _ = cache.set(&fp, &record, class).await;
    Ok(record)
}

/// Build the handler registered on the `lix` domain channel.
///
/// Non-critical requests are analyzed inline and replied to directly.
/// Critical requests detour through the persistent queue first: the
/// envelope is durably published, and only once that succeeds does the
/// handler return an immediate `{status: "persisted"}` ack, published
/// before the eventual result. The actual analysis for a critical request
/// happens later, when the queue consumer handler (below) delivers it
/// back off the durable queue. If persistence itself fails, the caller
/// sees `DependencyUnavailable` directly and the request is never
/// silently dropped.
pub fn domain_channel_handler(scheduler: Arc<Scheduler>, cache: Arc<CacheLayer>, queue: Arc<PersistentQueue>) -> ChannelHandler {
    Arc::new(move |envelope: Envelope| {
        let scheduler = Arc::clone(&scheduler);
        let cache = Arc::clone(&cache);
        let queue = Arc::clone(&queue);
        Box::pin(async move {
            let Some(text) = envelope.resolved_text().map(str::to_string) else {
                return Err(LixError::InvalidInput("envelope carries no text".into()));
            };

            if envelope.is_critical {
                let priority = lix_core::job::clamp_priority(envelope.priority.unwrap_or(5));
                queue.publish(&envelope, priority).await?;
                info!(client_id = %envelope.client_id, request_id = %envelope.request_id, "critical request persisted");
                return Ok(Some(json!({ "status": "persisted", "timestamp": Utc::now().timestamp_millis() })));
            }

            let options = envelope_options(&envelope);
            let record = run_analysis(&scheduler, &cache, &text, &options).await?;
            Ok(Some(serde_json::to_value(record).map_err(LixError::Serialization)?))
        })
    })
}

/// Build the queue consumer handler: deserializes a persisted envelope,
/// runs the deferred analysis, and publishes the result back on `lix`
/// echoing the original correlation ids. A raised error here nacks the
/// delivery for redelivery.
pub fn queue_consumer_handler(scheduler: Arc<Scheduler>, cache: Arc<CacheLayer>, pubsub: Arc<PubSubRouter>) -> QueueHandler {
    Arc::new(move |payload: Value| {
        let scheduler = Arc::clone(&scheduler);
        let cache = Arc::clone(&cache);
        let pubsub = Arc::clone(&pubsub);
        Box::pin(async move {
            let envelope: Envelope = serde_json::from_value(payload)
                .map_err(|e| LixError::ProcessingError(format!("undecodable persisted envelope: {e}")))?;
            let Some(text) = envelope.resolved_text().map(str::to_string) else {
                return Err(LixError::InvalidInput("persisted envelope carries no text".into()));
            };

            let options = envelope_options(&envelope);
            let (client_id, request_id) = envelope.correlation_ids();

            match run_analysis(&scheduler, &cache, &text, &options).await {
                Ok(record) => {
                    let reply = crate::pubsub::Reply::ok(
                        client_id,
                        request_id,
                        serde_json::to_value(&record).map_err(LixError::Serialization)?,
                    );
                    pubsub.publish(channels::LIX, &reply).await?;
                    Ok(())
                }
                Err(e) => {
                    warn!(client_id = %client_id, request_id = %request_id, error = %e, "deferred critical analysis failed");
                    let reply = crate::pubsub::Reply::err(client_id, request_id, &e);
                    let _ = pubsub.publish(channels::LIX, &reply).await;
                    Err(e)
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_options_parses_user_context_from_options_field() {
        let envelope = Envelope {
            client_id: "c1".into(),
            request_id: "r1".into(),
            text: Some("hei".into()),
            content: None,
            options: Some(json!({ "user_context": { "purpose": "education" }, "include_word_analysis": true })),
            is_critical: false,
            priority: None,
            timestamp: None,
            action: None,
        };
        let opts = envelope_options(&envelope);
        assert_eq!(opts.user_context.unwrap().purpose.as_deref(), Some("education"));
        assert!(opts.include_word_analysis);
    }

    #[test]
    fn envelope_options_falls_back_to_nested_content() {
        let envelope = Envelope {
            client_id: "c1".into(),
            request_id: "r1".into(),
            text: None,
            content: Some(json!({ "text": "hei", "user_context": { "purpose": "business" } })),
            options: None,
            is_critical: false,
            priority: None,
            timestamp: None,
            action: None,
        };
        let opts = envelope_options(&envelope);
        assert_eq!(opts.user_context.unwrap().purpose.as_deref(), Some("business"));
    }
}
