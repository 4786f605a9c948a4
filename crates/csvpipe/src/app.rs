//! Wires the store, orchestrator, workers and service from [`Settings`].

use std::sync::Arc;

use tracing::info;

use crate::api::{IngestionService, StaticMappingTargets};
use crate::broadcast::JobProgressBroadcaster;
use crate::config::Settings;
use crate::db::Database;
use crate::error::Result;
use crate::jobs::Orchestrator;
use crate::storage::{ContentStore, FileStorage};
use crate::worker::WorkerPool;

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// A running instance: the service plus the workers behind it.
pub struct App {
    service: Arc<IngestionService>,
    pool: Arc<WorkerPool>,
    progress: JobProgressBroadcaster,
    db: Database,
}

impl App {
    pub fn start(settings: &Settings) -> Result<Self> {
        let files = FileStorage::new(&settings.storage_root);
        files.ensure_directory(&settings.storage_root)?;

        let db = Database::open(&settings.database_path())?;
        let store = Arc::new(ContentStore::new(db.clone(), files, settings.upload.clone()));
        let progress = JobProgressBroadcaster::new(PROGRESS_CHANNEL_CAPACITY);
        let orchestrator = Arc::new(Orchestrator::new(db.clone(), store, progress.clone()));

        let pool = Arc::new(WorkerPool::new(
            orchestrator.clone(),
            settings.worker_count,
            settings.queue_capacity,
        )?);
        let targets = Arc::new(StaticMappingTargets::new(settings.mapping_targets.clone()));
        let service = Arc::new(IngestionService::new(orchestrator, pool.clone(), targets));

        info!(
            root = %settings.storage_root.display(),
            workers = settings.worker_count,
            "csvpipe started"
        );

        Ok(Self {
            service,
            pool,
            progress,
            db,
        })
    }

    pub fn service(&self) -> Arc<IngestionService> {
        Arc::clone(&self.service)
    }

    pub fn progress(&self) -> &JobProgressBroadcaster {
        &self.progress
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Stops intake and waits for queued jobs to finish.
    pub fn shutdown(&self) {
        self.pool.wait();
        info!("csvpipe stopped");
    }
}
