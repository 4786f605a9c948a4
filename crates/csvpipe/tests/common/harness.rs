//! Isolated service instance for integration tests.
//!
//! Jobs run on the dispatching thread, so every call that starts processing
//! returns with the job already in a terminal state.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use csvpipe::api::{IngestionService, StaticMappingTargets, UploadResult};
use csvpipe::db::Database;
use csvpipe::storage::{ContentStore, FileStorage, UploadLimits};
use csvpipe::worker::{InlineDispatcher, JobDispatcher, JobTicket};
use csvpipe::{JobProgressBroadcaster, Orchestrator, ProcessingJob, WorkerError};

pub const OWNER: &str = "owner-1";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub orchestrator: Arc<Orchestrator>,
    pub service: IngestionService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_limits(UploadLimits::default())
    }

    pub fn with_limits(limits: UploadLimits) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        let store = Arc::new(ContentStore::new(
            db.clone(),
            FileStorage::new(temp_dir.path()),
            limits,
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            db.clone(),
            store,
            JobProgressBroadcaster::new(256),
        ));
        let dispatcher = Arc::new(InlineDispatcher::new(orchestrator.clone()));
        let service = Self::service_with(&orchestrator, dispatcher);

        Self {
            temp_dir,
            db,
            orchestrator,
            service,
        }
    }

    /// Same instance, but jobs are never run.
    pub fn with_refusing_dispatcher(self) -> Self {
        self.with_dispatcher(Arc::new(RefusingDispatcher))
    }

    /// Same instance, with jobs handed to `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        self.service = Self::service_with(&self.orchestrator, dispatcher);
        self
    }

    fn service_with(
        orchestrator: &Arc<Orchestrator>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> IngestionService {
        IngestionService::new(
            Arc::clone(orchestrator),
            dispatcher,
            Arc::new(StaticMappingTargets::new(vec![
                "email".to_string(),
                "firstname".to_string(),
            ])),
        )
    }

    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn upload(&self, bytes: &[u8]) -> UploadResult {
        self.service
            .upload(OWNER, bytes, "contacts.csv", "text/csv")
            .expect("upload failed")
    }

    pub fn job(&self, job_id: &str) -> ProcessingJob {
        self.service
            .get_job_status(job_id, OWNER)
            .expect("job lookup failed")
    }

    /// Absolute path of a stored file's bytes.
    pub fn stored_path(&self, file_id: &str) -> PathBuf {
        let file = self
            .orchestrator
            .store()
            .find(file_id, OWNER)
            .expect("file lookup failed");
        FileStorage::new(self.temp_dir.path()).resolve(&file.storage_path)
    }

    pub fn count_rows(&self, table: &str) -> i64 {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                    r.get(0)
                })?)
            })
            .expect("count failed")
    }
}

/// Dispatcher whose queue is always closed.
pub struct RefusingDispatcher;

impl JobDispatcher for RefusingDispatcher {
    fn dispatch(&self, _ticket: JobTicket) -> Result<(), WorkerError> {
        Err(WorkerError::ChannelClosed)
    }
}
