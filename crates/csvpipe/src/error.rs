use std::path::PathBuf;
use thiserror::Error;

use crate::processing::TransformError;

#[derive(Error, Debug)]
pub enum CsvPipeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl CsvPipeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Classifies the error for callers that need to tell the taxonomy apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Processing(_) => ErrorKind::Processing,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Worker(_) | Self::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Coarse error classes surfaced at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Processing,
    Storage,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Processing => "PROCESSING_ERROR",
            ErrorKind::Storage => "STORAGE_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read source file '{file_id}': {source}")]
    ReadSource {
        file_id: String,
        #[source]
        source: Box<CsvPipeError>,
    },

    #[error("Stored job configuration is unreadable: {0}")]
    CorruptConfig(#[source] serde_json::Error),

    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Failed to store processed output: {0}")]
    StoreOutput(#[source] Box<CsvPipeError>),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job queue is full ({capacity} waiting)")]
    QueueFull { capacity: usize },

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),
}

pub type Result<T> = std::result::Result<T, CsvPipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(
            CsvPipeError::validation("bad").kind().code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            CsvPipeError::not_found("File", "f1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CsvPipeError::from(WorkerError::ChannelClosed).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = CsvPipeError::not_found("Job", "job-1");
        assert_eq!(err.to_string(), "Job 'job-1' not found");
    }

    #[test]
    fn test_process_error_carries_source_message() {
        let inner = CsvPipeError::from(StorageError::ReadFile {
            path: PathBuf::from("/data/u1/f1/original.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        });
        let err = ProcessError::ReadSource {
            file_id: "f1".to_string(),
            source: Box::new(inner),
        };
        let msg = err.to_string();
        assert!(msg.contains("f1"));
        assert!(msg.contains("original.csv"));
    }
}
