//! Job & Debounce Scheduler (C7): background jobs for large texts, a
//! priority batch queue, and the paragraph-by-paragraph chunk streamer.
//! The per-connection debounce path (Session/LoadSample) lives in
//! `lix_core::session` and is driven from `ws.rs`.
//!
//! Background jobs and batches live in an `Arc<RwLock<HashMap<..>>>` keyed
//! by id, updated from a spawned task and mirrored to the cache layer so a
//! status read never blocks on the in-memory map alone.

use std::collections::HashMap;
use std::sync::Arc;

use lix_core::job::{clamp_priority, BatchItem, BatchItemResult, BatchJob, JobHandle, JobId, MAX_BATCH_ITEMS};
use lix_core::{AnalysisRecord, AnalyzeOptions, LixError, ReadabilityService, Result, SizeClass, Text};
use sysinfo::System;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{CacheLayer, TtlClass};
use crate::config::{Config, ThresholdsConfig};

/// Estimate completion time for a background job from its character length:
/// roughly 1 second per 2,000 characters, minimum 2 seconds.
fn estimate_seconds(char_len: usize) -> u64 {
    ((char_len / 2_000) as u64).max(2)
}

pub type JobMap = Arc<RwLock<HashMap<JobId, JobHandle>>>;
pub type BatchMap = Arc<RwLock<HashMap<JobId, BatchJob>>>;

/// Shared scheduler state: the readability service, in-memory job/batch
/// maps mirrored into the cache under their namespaces, and the configured
/// size thresholds.
pub struct Scheduler {
    service: Arc<ReadabilityService>,
    cache: Arc<CacheLayer>,
    thresholds: ThresholdsConfig,
    jobs: JobMap,
    batches: BatchMap,
}

impl Scheduler {
    pub fn new(service: Arc<ReadabilityService>, cache: Arc<CacheLayer>, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            service,
            cache,
            thresholds: config.thresholds.clone(),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            batches: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn background_threshold(&self) -> usize {
        self.thresholds.background
    }

    /// Submit a single large text for background analysis. Returns
    /// immediately with a queued job handle; the synchronous caller never
    /// blocks on the actual analysis.
    pub async fn submit_background(self: &Arc<Self>, text: Text, options: AnalyzeOptions) -> JobHandle {
        let estimated = estimate_seconds(text.char_len());
        let job = JobHandle::new(estimated);
        let job_id = job.id;

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(job_id, job.clone());
        }
        self.mirror_job_status(job_id).await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_background_job(job_id, text, options).await;
        });

        job
    }

    async fn run_background_job(self: Arc<Self>, job_id: JobId, text: Text, options: AnalyzeOptions) {
        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&job_id) {
                job.start();
            }
        }
        self.mirror_job_status(job_id).await;

        let record = self.service.analyze(&text, &options);

        let fp = lix_core::Fingerprint::compute(
            text.normalized(),
            options.include_word_analysis,
            options.include_sentence_analysis,
        );
        let class = ttl_class_for(text.size_class(self.thresholds.small, self.thresholds.large, usize::MAX));
        if let Err(e) = self.cache.set(&fp, &record, class).await {
            warn!(job_id = %job_id, error = %e, "failed to cache background job result under its fingerprint");
        }

        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&job_id) {
                job.complete(record);
            }
        }
        self.mirror_job_status(job_id).await;
        info!(job_id = %job_id, "background job completed");
    }

    async fn mirror_job_status(&self, job_id: JobId) {
        let jobs = self.jobs.read().await;
        if let Some(job) = jobs.get(&job_id) {
            let _ = self.cache.set_status("task_status", &job_id.to_string(), job, 3600).await;
        }
    }

    pub async fn get_job(&self, job_id: JobId) -> Option<JobHandle> {
        if let Some(job) = self.jobs.read().await.get(&job_id).cloned() {
            return Some(job);
        }
        self.cache.get_status("task_status", &job_id.to_string()).await
    }

    /// Admit a batch: rejects empty or
    /// over-`MAX_BATCH_ITEMS` requests, clamps priority, and processes
    /// items in a background task, updating progress every 5 items.
    pub async fn submit_batch(self: &Arc<Self>, items: Vec<BatchItem>, priority: i64) -> Result<BatchJob> {
        if items.is_empty() {
            return Err(LixError::InvalidInput("batch must contain at least one item".into()));
        }
        if items.len() > MAX_BATCH_ITEMS {
            return Err(LixError::InvalidInput(format!("batch exceeds max of {MAX_BATCH_ITEMS} items")));
        }

        let batch = BatchJob::new(items.len(), priority);
        let job_id = batch.id;

        {
            let mut batches = self.batches.write().await;
            batches.insert(job_id, batch.clone());
        }
        self.mirror_batch_status(job_id).await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_batch(job_id, items).await;
        });

        Ok(batch)
    }

    async fn run_batch(self: Arc<Self>, job_id: JobId, items: Vec<BatchItem>) {
        {
            let mut batches = self.batches.write().await;
            if let Some(batch) = batches.get_mut(&job_id) {
                batch.start();
            }
        }

        for (idx, item) in items.into_iter().enumerate() {
            let result = if item.content.trim().is_empty() {
                BatchItemResult::Err { error: "Empty content".to_string() }
            } else {
                let text = Text::new(item.content);
                let record = self.service.analyze(&text, &AnalyzeOptions::default());
                BatchItemResult::Ok(Box::new(record))
            };

            {
                let mut batches = self.batches.write().await;
                if let Some(batch) = batches.get_mut(&job_id) {
                    batch.record(item.id, result);
                }
            }

            if (idx + 1) % 5 == 0 {
                self.mirror_batch_status(job_id).await;
            }
        }

        {
            let mut batches = self.batches.write().await;
            if let Some(batch) = batches.get_mut(&job_id) {
                batch.finish();
            }
        }
        self.mirror_batch_status(job_id).await;
        info!(job_id = %job_id, "batch job completed");
    }

    async fn mirror_batch_status(&self, job_id: JobId) {
        let batches = self.batches.read().await;
        if let Some(batch) = batches.get(&job_id) {
            let _ = self.cache.set_status("batch_job", &job_id.to_string(), batch, 86_400).await;
        }
    }

    pub async fn get_batch(&self, job_id: JobId) -> Option<BatchJob> {
        if let Some(batch) = self.batches.read().await.get(&job_id).cloned() {
            return Some(batch);
        }
        self.cache.get_status("batch_job", &job_id.to_string()).await
    }

    pub fn service(&self) -> &ReadabilityService {
        &self.service
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub fn thresholds(&self) -> &ThresholdsConfig {
        &self.thresholds
    }
}

fn ttl_class_for(size_class: SizeClass) -> TtlClass {
    match size_class {
        SizeClass::Small => TtlClass::Small,
        SizeClass::Large | SizeClass::Huge => TtlClass::Large,
        SizeClass::Medium => TtlClass::Medium,
    }
}

/// Clamp a raw requested priority into `[1, 10]`.
pub fn normalize_priority(priority: Option<i64>) -> u8 {
    clamp_priority(priority.unwrap_or(5))
}

/// One incremental event emitted by the chunk streamer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkEvent {
    pub chunk: usize,
    pub total_chunks: usize,
    pub progress: u8,
    pub readability: ChunkMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_analysis: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<lix_core::Recommendation>>,
    pub is_final: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkMetrics {
    pub lix: f64,
    pub rix: f64,
}

/// The terminal event following the last `ChunkEvent`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StreamCompleted {
    pub processing_completed: bool,
    pub processing_time_seconds: f64,
}

/// One item on the `/analyze/stream` wire: either an incremental chunk
/// update or the terminal summary.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum StreamItem {
    Chunk(ChunkEvent),
    Completed(StreamCompleted),
}

/// Split `paragraphs` into chunks of `max(1, paragraphs/10)`, capped at 5
/// paragraphs per chunk.
fn chunk_paragraphs(paragraphs: &[String]) -> Vec<&[String]> {
    let chunk_size = (paragraphs.len() / 10).max(1).min(5);
    paragraphs.chunks(chunk_size).collect()
}

/// Process a large text paragraph-by-paragraph, invoking `emit` with one
/// [`StreamItem::Chunk`] as soon as each chunk is computed, followed by a
/// terminal [`StreamItem::Completed`]. `should_continue` is polled between
/// chunks so the caller can halt on client disconnect; `emit` is called
/// synchronously so a caller backed by a channel sees each chunk the
/// moment it's ready rather than after the whole text is processed.
pub async fn stream_chunks<F, E>(service: &ReadabilityService, text: &Text, mut should_continue: F, mut emit: E)
where
    F: FnMut() -> bool,
    E: FnMut(StreamItem),
{
    let started = std::time::Instant::now();
    let paragraphs: Vec<String> =
        text.normalized().split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()).map(str::to_string).collect();

    let paragraphs = if paragraphs.is_empty() { vec![text.normalized().to_string()] } else { paragraphs };
    let chunks = chunk_paragraphs(&paragraphs);
    let total_chunks = chunks.len().max(1);

    let mut accumulated = String::new();

    for (idx, chunk) in chunks.iter().enumerate() {
        if !should_continue() {
            break;
        }

        if !accumulated.is_empty() {
            accumulated.push_str("\n\n");
        }
        accumulated.push_str(&chunk.join("\n\n"));

        let partial = service.analyze_basic(&Text::new(accumulated.clone()));
        let chunk_number = idx + 1;
        let progress = ((chunk_number * 100) / total_chunks).min(100) as u8;
        let is_final = chunk_number == total_chunks;

        let text_analysis =
            if is_final || chunk_number % 3 == 0 { Some(serde_json::to_value(&partial.statistics).unwrap()) } else { None };

        let recommendations = if is_final || progress % 50 == 0 {
            let full = service.analyze(&Text::new(accumulated.clone()), &AnalyzeOptions::default());
            Some(full.recommendations)
        } else {
            None
        };

        emit(StreamItem::Chunk(ChunkEvent {
            chunk: chunk_number,
            total_chunks,
            progress,
            readability: ChunkMetrics { lix: partial.metrics.lix.score, rix: partial.metrics.rix.score },
            text_analysis,
            recommendations,
            is_final,
        }));
    }

    emit(StreamItem::Completed(StreamCompleted {
        processing_completed: true,
        processing_time_seconds: started.elapsed().as_secs_f64(),
    }));
}

/// Sample current system CPU/memory load for the adaptive debounce formula.
pub fn sample_system_load(system: &mut System) -> lix_core::LoadSample {
    system.refresh_cpu_usage();
    system.refresh_memory();
    let cpu_percent = system.global_cpu_usage() as f64;
    let mem_percent = if system.total_memory() > 0 {
        (system.used_memory() as f64 / system.total_memory() as f64) * 100.0
    } else {
        0.0
    };
    lix_core::LoadSample { cpu_percent, mem_percent }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_defaults_and_clamps() {
        assert_eq!(normalize_priority(None), 5);
        assert_eq!(normalize_priority(Some(15)), 10);
        assert_eq!(normalize_priority(Some(0)), 1);
    }

    #[test]
    fn estimate_seconds_has_floor() {
        assert_eq!(estimate_seconds(100), 2);
        assert_eq!(estimate_seconds(40_000), 20);
    }

    #[tokio::test]
    async fn scenario_s6_chunked_stream_progress_and_terminal() {
        let service = ReadabilityService::new();
        let mut paragraphs = Vec::new();
        for i in 0..20 {
            paragraphs.push(format!("Dette er avsnitt nummer {i} med noen ord i seg."));
        }
        let text = Text::new(paragraphs.join("\n\n"));

        let mut events = Vec::new();
        let mut completed = None;
        stream_chunks(&service, &text, || true, |item| match item {
            StreamItem::Chunk(event) => events.push(event),
            StreamItem::Completed(c) => completed = Some(c),
        })
        .await;

        assert!(!events.is_empty());
        let mut last_progress = 0u8;
        for event in &events {
            assert!(event.progress >= last_progress);
            last_progress = event.progress;
        }
        assert!(events.last().unwrap().is_final);
        assert_eq!(events.last().unwrap().progress, 100);
        assert!(completed.unwrap().processing_completed);
    }

    #[tokio::test]
    async fn chunk_streaming_halts_on_disconnect() {
        let service = ReadabilityService::new();
        let paragraphs: Vec<String> = (0..20).map(|i| format!("Avsnitt {i}.")).collect();
        let text = Text::new(paragraphs.join("\n\n"));

        let mut calls = 0;
        let mut events = Vec::new();
        stream_chunks(
            &service,
            &text,
            || {
                calls += 1;
                calls <= 2
            },
            |item| {
                if let StreamItem::Chunk(event) = item {
                    events.push(event);
                }
            },
        )
        .await;

        assert!(events.len() <= 2);
    }

    #[tokio::test]
    async fn stream_emits_chunks_incrementally_before_completed() {
        let service = ReadabilityService::new();
        let paragraphs: Vec<String> = (0..10).map(|i| format!("Avsnitt nummer {i} her.")).collect();
        let text = Text::new(paragraphs.join("\n\n"));

        let mut order = Vec::new();
        stream_chunks(&service, &text, || true, |item| {
            order.push(matches!(item, StreamItem::Completed(_)));
        })
        .await;

        // Completed is last, and only last.
        assert_eq!(order.iter().filter(|is_completed| **is_completed).count(), 1);
        assert!(*order.last().unwrap());
    }
}
