//! Job Handle and Batch Job data model (C7): identity and lifecycle for
//! deferred work, covering background single-text jobs and priority batch jobs.
//!
//! Status transitions are strictly forward: queued → processing →
//! completed|failed. Progress counters never regress.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::AnalysisRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Completed)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// A single deferred background-analysis job: created when input length
/// exceeds the huge/background threshold. Destroyed by TTL (1h) in the
/// cache layer, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion_seconds: u64,
    pub result: Option<AnalysisRecord>,
    pub error: Option<String>,
}

impl JobHandle {
    pub fn new(estimated_completion_seconds: u64) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            estimated_completion_seconds,
            result: None,
            error: None,
        }
    }

    /// Attempt `queued -> processing`. Returns false (no-op) on an illegal
    /// transition rather than panicking. Callers own the forward-only
    /// invariant check.
    pub fn start(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Processing) {
            return false;
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        true
    }

    pub fn complete(&mut self, result: AnalysisRecord) -> bool {
        if !self.status.can_transition_to(JobStatus::Completed) {
            return false;
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.status.can_transition_to(JobStatus::Failed) {
            return false;
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
        true
    }
}

/// Maximum number of items accepted in one batch request.
pub const MAX_BATCH_ITEMS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItemResult {
    Ok(Box<AnalysisRecord>),
    Err { error: String },
}

/// A priority batch job over at most [`MAX_BATCH_ITEMS`] items. Progress
/// (`completed + failed`) updates every 5 items and never regresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub status: JobStatus,
    pub priority: u8,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: HashMap<String, BatchItemResult>,
}

/// Clamp a requested priority into the valid range `[1, 10]`.
pub fn clamp_priority(priority: i64) -> u8 {
    priority.clamp(1, 10) as u8
}

impl BatchJob {
    pub fn new(total: usize, priority: i64) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            priority: clamp_priority(priority),
            total,
            completed: 0,
            failed: 0,
            created_at: Utc::now(),
            completed_at: None,
            results: HashMap::new(),
        }
    }

    pub fn start(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Processing) {
            return false;
        }
        self.status = JobStatus::Processing;
        true
    }

    /// Record one item's outcome. Progress counters are monotonic: this
    /// only ever increments.
    pub fn record(&mut self, id: impl Into<String>, result: BatchItemResult) {
        match &result {
            BatchItemResult::Ok(_) => self.completed += 1,
            BatchItemResult::Err { .. } => self.failed += 1,
        }
        self.results.insert(id.into(), result);
    }

    /// Finish the batch once every item has been recorded.
    pub fn finish(&mut self) -> bool {
        if self.completed + self.failed < self.total {
            return false;
        }
        let target = if self.failed == self.total && self.total > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        if !self.status.can_transition_to(target) {
            return false;
        }
        self.status = target;
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_clamped_to_1_10() {
        assert_eq!(clamp_priority(15), 10);
        assert_eq!(clamp_priority(0), 1);
        assert_eq!(clamp_priority(5), 5);
    }

    #[test]
    fn job_status_transitions_are_strictly_forward() {
        let mut job = JobHandle::new(5);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.start());
        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.start());
    }

    #[test]
    fn scenario_s3_mixed_batch_outcome() {
        let mut batch = BatchJob::new(2, 15);
        assert_eq!(batch.priority, 10);
        batch.start();
        batch.record("a", BatchItemResult::Ok(Box::new(dummy_record())));
        batch.record("b", BatchItemResult::Err { error: "Empty content".to_string() });
        assert!(batch.finish());
        assert_eq!(batch.status, JobStatus::Completed);
        assert_eq!(batch.completed, 1);
        assert_eq!(batch.failed, 1);
    }

    #[test]
    fn batch_progress_never_regresses() {
        let mut batch = BatchJob::new(3, 5);
        batch.start();
        batch.record("a", BatchItemResult::Ok(Box::new(dummy_record())));
        assert_eq!(batch.completed, 1);
        batch.record("b", BatchItemResult::Ok(Box::new(dummy_record())));
        assert_eq!(batch.completed, 2);
        assert!(!batch.finish());
    }

    fn dummy_record() -> AnalysisRecord {
        let service = crate::service::ReadabilityService::new();
        service.analyze(&crate::text::Text::new("Test."), &crate::service::AnalyzeOptions::default())
    }
}
