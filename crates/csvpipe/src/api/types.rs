use serde::Serialize;

use crate::models::{JobStatus, ProcessingJob, StoredFile};
use crate::processing::Preview;

/// Answer to "has this owner already uploaded these bytes?".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashCheck {
    pub exists: bool,
    pub file: Option<StoredFile>,
    /// Most recent completed job for the file.
    pub latest_job: Option<ProcessingJob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file: StoredFile,
    /// True when an identical earlier upload was returned instead.
    pub deduplicated: bool,
    /// Job created for the upload, or the latest completed one on dedup.
    pub job_id: Option<String>,
    /// Preview of the original content; absent when it does not parse.
    pub preview: Option<Preview>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStarted {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub reused: bool,
}

/// One window of original or processed rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPage {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub total_columns: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub processed: bool,
}

impl PreviewPage {
    pub(crate) fn from_window(preview: Preview, offset: usize, limit: usize, processed: bool) -> Self {
        let has_more = offset.saturating_add(preview.rows.len()) < preview.total_rows;
        Self {
            headers: preview.headers,
            rows: preview.rows,
            total_rows: preview.total_rows,
            total_columns: preview.total_columns,
            offset,
            limit,
            has_more,
            processed,
        }
    }
}

/// Stored bytes plus what a client needs to save them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_id: String,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// True when the bytes are a processed output.
    pub processed: bool,
}
