use std::sync::Arc;

use tracing::{info, warn};

use crate::api::collaborators::MappingTargetProvider;
use crate::api::types::{Download, HashCheck, PreviewPage, ProcessingStarted, UploadResult};
use crate::error::{CsvPipeError, Result};
use crate::hashing;
use crate::jobs::{Orchestrator, PREVIEW_ROWS};
use crate::models::{JobStatus, ProcessingJob, StoredFile};
use crate::processing::{Preview, ProcessingConfig, Table};
use crate::worker::{JobDispatcher, JobTicket};

pub const MAX_PREVIEW_LIMIT: usize = 1000;

/// Client-facing operations over the store, the orchestrator and the workers.
///
/// Every call is scoped to an owner id supplied by the caller's auth layer.
pub struct IngestionService {
    orchestrator: Arc<Orchestrator>,
    dispatcher: Arc<dyn JobDispatcher>,
    targets: Arc<dyn MappingTargetProvider>,
}

impl IngestionService {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        dispatcher: Arc<dyn JobDispatcher>,
        targets: Arc<dyn MappingTargetProvider>,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher,
            targets,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn check_by_hash(&self, hash: &str, owner_id: &str) -> Result<HashCheck> {
        if !hashing::is_sha256_hex(hash) {
            return Err(CsvPipeError::validation(format!(
                "'{}' is not a SHA-256 hex digest",
                hash
            )));
        }

        let Some(file) = self.orchestrator.store().exists_by_hash(hash, owner_id)? else {
            return Ok(HashCheck {
                exists: false,
                file: None,
                latest_job: None,
            });
        };
        let latest_job = self.orchestrator.latest_completed_for_file(&file.id)?;

        Ok(HashCheck {
            exists: true,
            file: Some(file),
            latest_job,
        })
    }

    /// Stores an upload, or returns the owner's identical earlier upload.
    ///
    /// Fresh uploads get a job with the empty config, dispatched before
    /// returning. When the earlier record's bytes are gone or changed they are
    /// rewritten from this upload, keeping the record and its jobs.
    pub fn upload(
        &self,
        owner_id: &str,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
    ) -> Result<UploadResult> {
        let store = self.orchestrator.store();
        store.validate_upload(bytes.len() as u64, name, mime_type)?;
        let hash = hashing::hash_bytes(bytes);

        if let Some(existing) = store.exists_by_hash(&hash, owner_id)? {
            if !store.verify(&existing) {
                warn!(file_id = %existing.id, "stored bytes missing, restoring from upload");
                store.restore(&existing, bytes)?;
            }
            info!(file_id = %existing.id, "upload matches stored file");
            let job_id = self
                .orchestrator
                .latest_completed_for_file(&existing.id)?
                .map(|job| job.id);
            let preview = self.original_preview(&existing);
            return Ok(UploadResult {
                file: existing,
                deduplicated: true,
                job_id,
                preview,
            });
        }

        let file = store.store(owner_id, bytes, name, mime_type, Some(&hash))?;
        let creation = self
            .orchestrator
            .create_job(&file.id, owner_id, &ProcessingConfig::default())?;
        let preview = creation.job.original_preview.clone();
        if !creation.reused {
            self.dispatch(&creation.job)?;
        }

        Ok(UploadResult {
            file,
            deduplicated: false,
            job_id: Some(creation.job.id),
            preview,
        })
    }

    /// Creates or reuses a job for `config` and hands new ones to the workers.
    pub fn start_processing(
        &self,
        file_id: &str,
        owner_id: &str,
        config: &ProcessingConfig,
    ) -> Result<ProcessingStarted> {
        config.validate()?;

        let creation = self.orchestrator.create_job(file_id, owner_id, config)?;
        let mut job = creation.job;
        if !creation.reused && job.status == JobStatus::Pending {
            self.dispatch(&job)?;
            job = self.orchestrator.get_job(&job.id, owner_id)?;
        }

        Ok(ProcessingStarted {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            reused: creation.reused,
        })
    }

    pub fn get_job_status(&self, job_id: &str, owner_id: &str) -> Result<ProcessingJob> {
        self.orchestrator.get_job(job_id, owner_id)
    }

    /// Rows `[offset, offset + limit)` of the original or processed table.
    ///
    /// Windows inside the cached preview are served from it; others are read
    /// from the stored bytes.
    pub fn get_preview(
        &self,
        file_id: &str,
        owner_id: &str,
        limit: usize,
        offset: usize,
        processed: bool,
    ) -> Result<PreviewPage> {
        if limit == 0 || limit > MAX_PREVIEW_LIMIT {
            return Err(CsvPipeError::validation(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PREVIEW_LIMIT, limit
            )));
        }

        let store = self.orchestrator.store();
        let file = store.find(file_id, owner_id)?;

        let (source, cached) = if processed {
            let job = self
                .orchestrator
                .latest_completed_for_file(&file.id)?
                .ok_or_else(|| CsvPipeError::not_found("Processed output for file", file_id))?;
            let output_id = job
                .processed_file_id
                .ok_or_else(|| CsvPipeError::not_found("Processed output for file", file_id))?;
            let source = if output_id == file.id {
                file
            } else {
                store.find(&output_id, owner_id)?
            };
            (source, job.processed_preview)
        } else {
            let cached = self
                .orchestrator
                .latest_completed_for_file(&file.id)?
                .filter(|job| job.original_file_id == file.id)
                .and_then(|job| job.original_preview);
            (file, cached)
        };

        let window = match cached.and_then(|c| cached_window(c, offset, limit)) {
            Some(window) => window,
            None => {
                let bytes = store.read(&source)?;
                let table = Table::from_csv(&bytes)
                    .map_err(|e| CsvPipeError::Processing(e.into()))?;
                table.window(offset, limit)
            }
        };

        Ok(PreviewPage::from_window(window, offset, limit, processed))
    }

    /// Bytes of the file, or of its latest processed output when `processed`.
    ///
    /// Falls back to the file itself when nothing was processed yet.
    pub fn download(&self, file_id: &str, owner_id: &str, processed: bool) -> Result<Download> {
        let store = self.orchestrator.store();
        let file = store.find(file_id, owner_id)?;

        let target = if processed {
            match self
                .orchestrator
                .latest_completed_for_file(&file.id)?
                .and_then(|job| job.processed_file_id)
            {
                Some(output_id) if output_id != file.id => store.find(&output_id, owner_id)?,
                _ => file,
            }
        } else {
            file
        };

        let bytes = store.read(&target)?;
        Ok(Download {
            processed: target.is_derived(),
            file_id: target.id,
            name: target.name,
            mime_type: target.mime_type,
            bytes,
        })
    }

    pub fn export(&self, file_id: &str, owner_id: &str) -> Result<Download> {
        self.download(file_id, owner_id, true)
    }

    pub fn delete_file(&self, file_id: &str, owner_id: &str) -> Result<()> {
        self.orchestrator.store().delete(file_id, owner_id)
    }

    pub fn mapping_targets(&self, owner_id: &str) -> Result<Vec<String>> {
        self.targets.targets(owner_id)
    }

    fn dispatch(&self, job: &ProcessingJob) -> Result<()> {
        self.orchestrator
            .progress()
            .queued(&job.id, &job.original_file_id);

        let ticket = JobTicket::new(job.id.clone(), job.original_file_id.clone());
        if let Err(e) = self.dispatcher.dispatch(ticket) {
            self.orchestrator.fail_undispatched(job, &e.to_string())?;
        }
        Ok(())
    }

    fn original_preview(&self, file: &StoredFile) -> Option<Preview> {
        let bytes = self.orchestrator.store().read(file).ok()?;
        Table::from_csv(&bytes)
            .ok()
            .map(|table| table.preview(PREVIEW_ROWS))
    }
}

/// The requested window when `cached` holds all of it.
fn cached_window(cached: Preview, offset: usize, limit: usize) -> Option<Preview> {
    let end = offset.saturating_add(limit);
    if end > cached.rows.len() && !cached.is_complete() {
        return None;
    }
    let rows = cached.rows.into_iter().skip(offset).take(limit).collect();
    Some(Preview {
        headers: cached.headers,
        rows,
        total_rows: cached.total_rows,
        total_columns: cached.total_columns,
    })
}
