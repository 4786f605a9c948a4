//! Job lifecycle: creation with memoization, then a single guarded run.

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::broadcast::{JobProgressBroadcaster, JobProgressTracker};
use crate::db::job_repo::{self, JobCompletion, JobRow};
use crate::db::{self, Database};
use crate::error::{CsvPipeError, ProcessError, Result};
use crate::hashing;
use crate::models::{JobStatus, ProcessingJob, StoredFile};
use crate::processing::{Pipeline, Preview, ProcessingConfig, Table};
use crate::storage::ContentStore;
use crate::worker::{JobHandler, JobTicket};

/// Rows kept in the cached original and processed previews.
pub const PREVIEW_ROWS: usize = 100;

/// Result of [`Orchestrator::create_job`].
#[derive(Debug, Clone)]
pub struct JobCreation {
    pub job: ProcessingJob,
    /// True when an earlier completed job with the same config was returned.
    pub reused: bool,
}

pub struct Orchestrator {
    db: Database,
    store: Arc<ContentStore>,
    progress: JobProgressBroadcaster,
}

impl Orchestrator {
    pub fn new(db: Database, store: Arc<ContentStore>, progress: JobProgressBroadcaster) -> Self {
        Self {
            db,
            store,
            progress,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn progress(&self) -> &JobProgressBroadcaster {
        &self.progress
    }

    /// Returns a completed job for the same file and config, or inserts a new
    /// `pending` one with the original preview cached.
    pub fn create_job(
        &self,
        original_file_id: &str,
        owner_id: &str,
        config: &ProcessingConfig,
    ) -> Result<JobCreation> {
        let file = self.store.find(original_file_id, owner_id)?;
        if file.is_derived() {
            return Err(CsvPipeError::validation(format!(
                "file '{}' is a processed output; process its original instead",
                file.id
            )));
        }

        let config = config.normalized();
        let config_hash = config
            .config_hash()
            .map_err(|e| CsvPipeError::validation(format!("config cannot be encoded: {}", e)))?;

        if let Some(row) = job_repo::find_completed_by_config(&self.db, &file.id, &config_hash)? {
            debug!(job_id = %row.id, file_id = %file.id, "reusing completed job");
            return Ok(JobCreation {
                job: row.try_into()?,
                reused: true,
            });
        }

        let (preview, rows, columns) = match self.load_table(&file) {
            Ok(table) => (
                Some(table.preview(PREVIEW_ROWS)),
                Some(table.row_count() as i64),
                Some(table.column_count() as i64),
            ),
            Err(e) => {
                // The run itself records the failure.
                warn!(file_id = %file.id, error = %e, "original not previewable at job creation");
                (None, None, None)
            }
        };

        let now = db::timestamp();
        let row = JobRow {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            original_file_id: file.id.clone(),
            original_hash: file.content_hash.clone(),
            config_json: hashing::canonical_json(&config).map_err(|e| {
                CsvPipeError::validation(format!("config cannot be encoded: {}", e))
            })?,
            config_hash,
            status: JobStatus::Pending.as_str().to_string(),
            progress: 0,
            processed_file_id: None,
            processed_hash: None,
            original_row_count: rows,
            original_column_count: columns,
            processed_row_count: None,
            processed_column_count: None,
            original_preview: preview.as_ref().map(encode_preview).transpose()?,
            processed_preview: None,
            error: None,
            created_at: now.clone(),
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        job_repo::insert(&self.db, &row)?;

        info!(job_id = %row.id, file_id = %file.id, "created job");
        Ok(JobCreation {
            job: row.try_into()?,
            reused: false,
        })
    }

    pub fn get_job(&self, job_id: &str, owner_id: &str) -> Result<ProcessingJob> {
        job_repo::find_for_owner(&self.db, job_id, owner_id)?
            .map(ProcessingJob::try_from)
            .transpose()?
            .ok_or_else(|| CsvPipeError::not_found("Job", job_id))
    }

    /// Latest completed job that has `file_id` as its original or its output.
    pub fn latest_completed_for_file(&self, file_id: &str) -> Result<Option<ProcessingJob>> {
        Ok(job_repo::latest_completed_for_file(&self.db, file_id)?
            .map(ProcessingJob::try_from)
            .transpose()?)
    }

    /// Runs a pending job to a terminal state.
    ///
    /// Returns the resulting status. A job that another caller already claimed
    /// is left alone and its current status returned.
    pub fn process_job(&self, job_id: &str) -> Result<JobStatus> {
        let row = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| CsvPipeError::not_found("Job", job_id))?;

        if !job_repo::claim_pending(&self.db, job_id, &db::timestamp())? {
            debug!(job_id, status = %row.status, "job not pending, skipping");
            return Ok(row.status.parse().unwrap_or(JobStatus::Processing));
        }

        let span = info_span!("pipeline", job_id = %row.id, file_id = %row.original_file_id);
        let _enter = span.enter();

        let tracker = self
            .progress
            .start_job(self.db.clone(), &row.id, &row.original_file_id);

        match self.run(&row, &tracker) {
            Ok((output, table)) => self.complete(&row, &tracker, &output, &table),
            Err(e) => {
                self.fail(&row.id, &tracker, &e.to_string())?;
                Ok(JobStatus::Failed)
            }
        }
    }

    /// Moves a job that could not be queued straight to `failed`.
    pub fn fail_undispatched(&self, job: &ProcessingJob, reason: &str) -> Result<()> {
        let now = db::timestamp();
        if job_repo::claim_pending(&self.db, &job.id, &now)? {
            job_repo::mark_failed(&self.db, &job.id, reason, &now)?;
            warn!(job_id = %job.id, reason, "job could not be dispatched");
            self.progress.rejected(&job.id, &job.original_file_id, reason);
        }
        Ok(())
    }

    fn run(
        &self,
        row: &JobRow,
        tracker: &JobProgressTracker,
    ) -> std::result::Result<(StoredFile, Table), ProcessError> {
        let config: ProcessingConfig =
            serde_json::from_str(&row.config_json).map_err(ProcessError::CorruptConfig)?;

        let bytes = self
            .store
            .read_bytes(&row.original_file_id, &row.owner_id)
            .map_err(|e| ProcessError::ReadSource {
                file_id: row.original_file_id.clone(),
                source: Box::new(e),
            })?;

        let table = Table::from_csv(&bytes)?;
        let output = Pipeline::new(&config).run(table, tracker)?;
        let csv = output.to_csv()?;

        let stored = self
            .store
            .store_derived(&row.owner_id, &csv, &row.original_file_id, &row.id)
            .map_err(|e| ProcessError::StoreOutput(Box::new(e)))?;

        Ok((stored, output))
    }

    fn complete(
        &self,
        row: &JobRow,
        tracker: &JobProgressTracker,
        output: &StoredFile,
        table: &Table,
    ) -> Result<JobStatus> {
        let preview = encode_preview(&table.preview(PREVIEW_ROWS))?;
        let completed_at = db::timestamp();
        let done = JobCompletion {
            id: &row.id,
            processed_file_id: &output.id,
            processed_hash: &output.content_hash,
            processed_row_count: table.row_count() as i64,
            processed_column_count: table.column_count() as i64,
            processed_preview: &preview,
            completed_at: &completed_at,
        };

        match job_repo::mark_completed(&self.db, &done) {
            Ok(true) => {
                info!(
                    rows = table.row_count(),
                    columns = table.column_count(),
                    processed_file_id = %output.id,
                    "job completed"
                );
                tracker.completed(&output.id);
                Ok(JobStatus::Completed)
            }
            Ok(false) => {
                warn!("job left processing state before completion");
                self.store.discard_derived(output);
                Ok(JobStatus::Failed)
            }
            Err(e) => {
                self.store.discard_derived(output);
                let message = format!("Failed to record completion: {}", e);
                self.fail(&row.id, tracker, &message)?;
                Err(e.into())
            }
        }
    }

    fn fail(&self, job_id: &str, tracker: &JobProgressTracker, message: &str) -> Result<()> {
        error!(error = %message, "job failed");
        job_repo::mark_failed(&self.db, job_id, message, &db::timestamp())?;
        let progress = job_repo::find_by_id(&self.db, job_id)?
            .map(|r| r.progress.clamp(0, 100) as u8)
            .unwrap_or(0);
        tracker.failed(progress, message);
        Ok(())
    }

    fn load_table(&self, file: &StoredFile) -> Result<Table> {
        let bytes = self.store.read(file)?;
        Table::from_csv(&bytes).map_err(|e| CsvPipeError::Processing(ProcessError::Transform(e)))
    }
}

impl JobHandler for Orchestrator {
    fn handle(&self, ticket: &JobTicket) {
        if let Err(e) = self.process_job(&ticket.job_id) {
            error!(job_id = %ticket.job_id, error = %e, "job run aborted");
        }
    }
}

fn encode_preview(preview: &Preview) -> Result<String> {
    serde_json::to_string(preview).map_err(|source| {
        CsvPipeError::Database(db::DatabaseError::Json {
            column: "preview",
            source,
        })
    })
}
