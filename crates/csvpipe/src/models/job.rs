use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::job_repo::JobRow;
use crate::db::DatabaseError;
use crate::processing::{Preview, ProcessingConfig};

/// Job lifecycle: `pending -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One processing attempt of an original file under one config.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub id: String,
    pub owner_id: String,
    pub original_file_id: String,
    pub original_hash: String,
    pub config: ProcessingConfig,
    pub config_hash: String,
    pub status: JobStatus,
    pub progress: u8,
    pub processed_file_id: Option<String>,
    pub processed_hash: Option<String>,
    pub original_row_count: Option<u64>,
    pub original_column_count: Option<u64>,
    pub processed_row_count: Option<u64>,
    pub processed_column_count: Option<u64>,
    pub original_preview: Option<Preview>,
    pub processed_preview: Option<Preview>,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

fn count(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

fn preview(column: &'static str, raw: Option<String>) -> Result<Option<Preview>, DatabaseError> {
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|source| DatabaseError::Json { column, source })
    })
    .transpose()
}

impl TryFrom<JobRow> for ProcessingJob {
    type Error = DatabaseError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let config = serde_json::from_str(&row.config_json).map_err(|source| {
            DatabaseError::Json {
                column: "config_json",
                source,
            }
        })?;
        let status = row
            .status
            .parse()
            .map_err(|_: String| DatabaseError::InvalidValue {
                column: "status",
                value: row.status.clone(),
            })?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            original_file_id: row.original_file_id,
            original_hash: row.original_hash,
            config,
            config_hash: row.config_hash,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            processed_file_id: row.processed_file_id,
            processed_hash: row.processed_hash,
            original_row_count: count(row.original_row_count),
            original_column_count: count(row.original_column_count),
            processed_row_count: count(row.processed_row_count),
            processed_column_count: count(row.processed_column_count),
            original_preview: preview("original_preview", row.original_preview)?,
            processed_preview: preview("processed_preview", row.processed_preview)?,
            error: row.error,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
