//! Content-addressable CSV ingestion with a staged transformation pipeline.

pub mod api;
pub mod app;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod hashing;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod processing;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use api::{IngestionService, MappingTargetProvider, StaticMappingTargets};
pub use app::App;
pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_settings, Settings};
pub use error::{
    ConfigError, CsvPipeError, ErrorKind, ProcessError, Result, StorageError, WorkerError,
};
pub use jobs::Orchestrator;
pub use models::{JobStatus, ProcessingJob, StoredFile};
pub use processing::{Pipeline, Preview, ProcessingConfig, Table};
pub use storage::ContentStore;
