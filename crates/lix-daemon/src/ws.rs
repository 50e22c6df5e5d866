//! WebSocket streaming typing endpoint (C11): per-connection debounced
//! analysis as the client types, backed by `lix_core::session`.
//!
//! Uses `futures_util`'s `StreamExt::split` to split the socket into an
//! independent sink/stream pair, one task owning each half, driving an
//! admit/partial/detailed protocol as text arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use lix_core::{AnalyzeOptions, Fingerprint, Session};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::{debug, warn};

use crate::metrics;
use crate::scheduler::Scheduler;

/// Inbound typing message: the current full text plus the same options
/// `POST /analyze` accepts (`{text, include_word_analysis?,
/// include_sentence_analysis?, user_context?}`).
#[derive(Debug, Deserialize)]
struct TypingMessage {
    text: String,
    #[serde(default)]
    include_word_analysis: bool,
    #[serde(default = "default_true")]
    include_sentence_analysis: bool,
    #[serde(default, rename = "user_context")]
    context: Option<lix_core::UserContext>,
}

fn default_true() -> bool {
    true
}

/// Outbound partial (metrics-only) update.
#[derive(Debug, Serialize)]
struct PartialUpdate {
    #[serde(rename = "type")]
    kind: &'static str,
    metrics: lix_core::MetricBundle,
    statistics: lix_core::Statistics,
}

/// Outbound detailed update, sent when the debounce window admits a full
/// analysis.
#[derive(Debug, Serialize)]
struct DetailedUpdate {
    #[serde(rename = "type")]
    kind: &'static str,
    metrics: lix_core::MetricBundle,
    combined_description: String,
    sentence_analysis: Vec<lix_core::SentenceAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendations: Option<Vec<lix_core::Recommendation>>,
}

#[derive(Debug, Serialize)]
struct ErrorUpdate {
    #[serde(rename = "type")]
    kind: &'static str,
    error: String,
}

/// Drive one WebSocket connection end to end. Owns its [`Session`]
/// single-threaded: the connection's debounce state and result cache are
/// single-owner, so no lock is needed.
pub async fn handle_socket(socket: WebSocket, scheduler: Arc<Scheduler>) {
    metrics::record_websocket_connection(true);
    let (mut sender, mut receiver) = socket.split();
    let mut session = Session::new();
    let mut system = System::new();
    let mut last_processed = Instant::now() - Duration::from_secs(3600);

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            if matches!(message, Message::Close(_)) {
                break;
            }
            continue;
        };
        metrics::record_websocket_message("received");

        let typing: TypingMessage = match serde_json::from_str(&text) {
            Ok(t) => t,
            Err(e) => {
                let _ = send_json(&mut sender, &ErrorUpdate { kind: "error", error: format!("invalid message: {e}") }).await;
                continue;
            }
        };

        let load = crate::scheduler::sample_system_load(&mut system);
        session.recompute_debounce(load, typing.text.chars().count());

        let elapsed = last_processed.elapsed();
        let word_count = typing.text.split_whitespace().count();
        let admission = session.admit(&typing.text, elapsed, word_count);

        let with_recommendations = match admission {
            lix_core::Admission::DuplicateDrop | lix_core::Admission::DebouncedDrop => continue,
            lix_core::Admission::Process { with_recommendations } => with_recommendations,
        };

        let current_len = typing.text.chars().count();
        let input = lix_core::Text::new(typing.text.clone());

        if lix_core::Session::wants_partial_first(current_len, elapsed) {
            let basic = scheduler.service().analyze_basic(&input);
            if send_json(&mut sender, &PartialUpdate { kind: "partial", metrics: basic.metrics, statistics: basic.statistics })
                .await
                .is_err()
            {
                break;
            }
        }

        if lix_core::Session::partial_only(current_len) {
            session.record_processed(&typing.text, word_count);
            last_processed = Instant::now();
            continue;
        }

        let options = AnalyzeOptions {
            include_word_analysis: typing.include_word_analysis,
            include_sentence_analysis: typing.include_sentence_analysis,
            user_context: typing.context,
            simplified_recommendations: with_recommendations,
        };

        // Step 4 of the streaming path: the per-connection bounded cache,
        // then the shared cache, before paying for a fresh analysis.
        let fp = Fingerprint::compute(input.normalized(), options.include_word_analysis, options.include_sentence_analysis);
        let cached = if session.cache.get(&fp).is_some() {
            scheduler.cache().get::<lix_core::AnalysisRecord>(&fp).await
        } else {
            let shared_hit = scheduler.cache().get::<lix_core::AnalysisRecord>(&fp).await;
            if shared_hit.is_some() {
                session.cache.insert(fp, fp);
            }
            shared_hit
        };

        let record = match cached {
            Some(record) => record,
            None => {
                let record = scheduler.service().analyze(&input, &options);
                let _ = scheduler.cache().set(&fp, &record, crate::cache::TtlClass::Small).await;
                session.cache.insert(fp, fp);
                record
            }
        };

        let recommendations = if with_recommendations { Some(record.recommendations) } else { None };
        let detailed = DetailedUpdate {
            kind: "detailed",
            metrics: record.metrics,
            combined_description: record.combined_description,
            sentence_analysis: record.sentence_analysis,
            recommendations,
        };

        if send_json(&mut sender, &detailed).await.is_err() {
            break;
        }

        session.record_processed(&typing.text, word_count);
        last_processed = Instant::now();
    }

    debug!(session_id = %session.id.0, "typing session closed");
    metrics::record_websocket_connection(false);
}

async fn send_json<T: Serialize>(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let result = sender.send(Message::Text(json)).await;
    if result.is_ok() {
        metrics::record_websocket_message("sent");
    } else {
        warn!("failed to send websocket message, closing connection");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_message_deserializes_without_context() {
        let msg: TypingMessage = serde_json::from_str(r#"{"text": "hei"}"#).unwrap();
        assert_eq!(msg.text, "hei");
        assert!(msg.context.is_none());
        assert!(!msg.include_word_analysis);
        assert!(msg.include_sentence_analysis);
    }

    #[test]
    fn typing_message_reads_user_context_and_flags() {
        let msg: TypingMessage = serde_json::from_str(
            r#"{"text": "hei", "include_word_analysis": true, "include_sentence_analysis": false, "user_context": {"purpose": "education"}}"#,
        )
        .unwrap();
        assert!(msg.include_word_analysis);
        assert!(!msg.include_sentence_analysis);
        assert_eq!(msg.context.unwrap().purpose.as_deref(), Some("education"));
    }
}
