//! Ingestion boundary: the operations an outer surface exposes to clients.

pub mod collaborators;
pub mod service;
pub mod types;

pub use collaborators::{MappingTargetProvider, StaticMappingTargets};
pub use service::{IngestionService, MAX_PREVIEW_LIMIT};
pub use types::{Download, HashCheck, PreviewPage, ProcessingStarted, UploadResult};
