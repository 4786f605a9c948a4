//! Job progress broadcaster for live status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::{self, job_repo, Database};
use crate::models::JobStatus;
use crate::processing::{ProgressEvent, ProgressReporter, Stage};

/// Phase of a job run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Started,
    Stage,
    Completed,
    Failed,
}

/// Progress event for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub file_id: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub progress: u8,
    /// Stage that just finished, for `stage` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, file_id: &str, phase: JobPhase, progress: u8, message: &str) -> Self {
        let status = match phase {
            JobPhase::Queued => JobStatus::Pending,
            JobPhase::Started | JobPhase::Stage => JobStatus::Processing,
            JobPhase::Completed => JobStatus::Completed,
            JobPhase::Failed => JobStatus::Failed,
        };

        Self {
            job_id: job_id.to_string(),
            file_id: file_id.to_string(),
            phase,
            status,
            progress,
            stage: None,
            message: message.to_string(),
            timestamp: Utc::now(),
            processed_file_id: None,
            error: None,
        }
    }
}

/// Fans job progress out to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Announces that a job was handed to the workers.
    pub fn queued(&self, job_id: &str, file_id: &str) {
        self.send(JobProgressEvent::new(
            job_id,
            file_id,
            JobPhase::Queued,
            0,
            "Job queued for processing",
        ));
    }

    /// Announces a job that failed before any worker picked it up.
    pub fn rejected(&self, job_id: &str, file_id: &str, error: &str) {
        let mut event = JobProgressEvent::new(
            job_id,
            file_id,
            JobPhase::Failed,
            0,
            "Job could not be queued",
        );
        event.error = Some(error.to_string());
        self.send(event);
    }

    /// Tracker for a job run that persists progress to `db` before broadcasting.
    pub fn start_job(&self, db: Database, job_id: &str, file_id: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker {
            job_id: job_id.to_string(),
            file_id: file_id.to_string(),
            db,
            sender: Arc::clone(&self.sender),
        };
        tracker.emit(JobProgressEvent::new(
            job_id,
            file_id,
            JobPhase::Started,
            0,
            "Processing started",
        ));
        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Per-run progress sink. Each stage is written to the job row, then broadcast.
pub struct JobProgressTracker {
    job_id: String,
    file_id: String,
    db: Database,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    fn emit(&self, event: JobProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn completed(&self, processed_file_id: &str) {
        let mut event = JobProgressEvent::new(
            &self.job_id,
            &self.file_id,
            JobPhase::Completed,
            100,
            "Processing completed",
        );
        event.processed_file_id = Some(processed_file_id.to_string());
        self.emit(event);
    }

    pub fn failed(&self, progress: u8, error: &str) {
        let mut event = JobProgressEvent::new(
            &self.job_id,
            &self.file_id,
            JobPhase::Failed,
            progress,
            "Processing failed",
        );
        event.error = Some(error.to_string());
        self.emit(event);
    }
}

impl ProgressReporter for JobProgressTracker {
    fn report(&self, event: ProgressEvent) {
        let ProgressEvent::StageCompleted {
            stage,
            completed,
            total,
            percent,
        } = event;

        if let Err(e) = job_repo::update_progress(&self.db, &self.job_id, percent, &db::timestamp()) {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to persist progress");
        }

        let mut out = JobProgressEvent::new(
            &self.job_id,
            &self.file_id,
            JobPhase::Stage,
            percent,
            &format!("{} ({}/{})", stage, completed, total),
        );
        out.stage = Some(stage);
        self.emit(out);
    }
}
