//! Queries over the `processing_jobs` table.
//!
//! Status changes are conditional single-statement updates, so each returns
//! whether the transition actually happened.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw `processing_jobs` row. Previews hold JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: String,
    pub owner_id: String,
    pub original_file_id: String,
    pub original_hash: String,
    pub config_json: String,
    pub config_hash: String,
    pub status: String,
    pub progress: i64,
    pub processed_file_id: Option<String>,
    pub processed_hash: Option<String>,
    pub original_row_count: Option<i64>,
    pub original_column_count: Option<i64>,
    pub processed_row_count: Option<i64>,
    pub processed_column_count: Option<i64>,
    pub original_preview: Option<String>,
    pub processed_preview: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            original_file_id: row.get("original_file_id")?,
            original_hash: row.get("original_hash")?,
            config_json: row.get("config_json")?,
            config_hash: row.get("config_hash")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            processed_file_id: row.get("processed_file_id")?,
            processed_hash: row.get("processed_hash")?,
            original_row_count: row.get("original_row_count")?,
            original_column_count: row.get("original_column_count")?,
            processed_row_count: row.get("processed_row_count")?,
            processed_column_count: row.get("processed_column_count")?,
            original_preview: row.get("original_preview")?,
            processed_preview: row.get("processed_preview")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Output of a successful run, written by [`mark_completed`].
#[derive(Debug, Clone)]
pub struct JobCompletion<'a> {
    pub id: &'a str,
    pub processed_file_id: &'a str,
    pub processed_hash: &'a str,
    pub processed_row_count: i64,
    pub processed_column_count: i64,
    pub processed_preview: &'a str,
    pub completed_at: &'a str,
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processing_jobs (id, owner_id, original_file_id, original_hash,
             config_json, config_hash, status, progress, processed_file_id, processed_hash,
             original_row_count, original_column_count, processed_row_count,
             processed_column_count, original_preview, processed_preview, error,
             created_at, started_at, completed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
             ?17, ?18, ?19, ?20, ?21)",
            params![
                job.id,
                job.owner_id,
                job.original_file_id,
                job.original_hash,
                job.config_json,
                job.config_hash,
                job.status,
                job.progress,
                job.processed_file_id,
                job.processed_hash,
                job.original_row_count,
                job.original_column_count,
                job.processed_row_count,
                job.processed_column_count,
                job.original_preview,
                job.processed_preview,
                job.error,
                job.created_at,
                job.started_at,
                job.completed_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

fn query_one(
    db: &Database,
    sql: &str,
    args: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn.query_row(sql, args, JobRow::from_row).optional()?;
        Ok(row)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    query_one(db, "SELECT * FROM processing_jobs WHERE id = ?1", &[&id])
}

/// Finds a job visible to `owner_id`.
pub fn find_for_owner(
    db: &Database,
    id: &str,
    owner_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    query_one(
        db,
        "SELECT * FROM processing_jobs WHERE id = ?1 AND owner_id = ?2",
        &[&id, &owner_id],
    )
}

/// Most recent completed job for this original and config hash.
///
/// Scans every completed job for the file, not only the latest one.
pub fn find_completed_by_config(
    db: &Database,
    original_file_id: &str,
    config_hash: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    query_one(
        db,
        "SELECT * FROM processing_jobs
         WHERE original_file_id = ?1 AND status = 'completed' AND config_hash = ?2
         ORDER BY completed_at DESC, rowid DESC
         LIMIT 1",
        &[&original_file_id, &config_hash],
    )
}

/// Most recent completed job where `file_id` is the original or the output.
pub fn latest_completed_for_file(
    db: &Database,
    file_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    query_one(
        db,
        "SELECT * FROM processing_jobs
         WHERE status = 'completed' AND (original_file_id = ?1 OR processed_file_id = ?1)
         ORDER BY completed_at DESC, rowid DESC
         LIMIT 1",
        &[&file_id],
    )
}

/// `pending` to `processing`. False when another caller already claimed it.
pub fn claim_pending(db: &Database, id: &str, started_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE processing_jobs
             SET status = 'processing', progress = 0, started_at = ?2, updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, started_at],
        )?;
        Ok(affected > 0)
    })
}

/// Raises progress on a running job. Lower values never overwrite higher ones.
pub fn update_progress(
    db: &Database,
    id: &str,
    progress: u8,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE processing_jobs
             SET progress = MAX(progress, ?2), updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, i64::from(progress.min(100)), updated_at],
        )?;
        Ok(affected > 0)
    })
}

pub fn mark_completed(db: &Database, done: &JobCompletion<'_>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE processing_jobs
             SET status = 'completed', progress = 100, processed_file_id = ?2,
                 processed_hash = ?3, processed_row_count = ?4, processed_column_count = ?5,
                 processed_preview = ?6, error = NULL, completed_at = ?7, updated_at = ?7
             WHERE id = ?1 AND status = 'processing'",
            params![
                done.id,
                done.processed_file_id,
                done.processed_hash,
                done.processed_row_count,
                done.processed_column_count,
                done.processed_preview,
                done.completed_at,
            ],
        )?;
        Ok(affected > 0)
    })
}

/// `processing` to `failed`. Progress keeps its last reported value.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    completed_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE processing_jobs
             SET status = 'failed', error = ?2, completed_at = ?3, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error, completed_at],
        )?;
        Ok(affected > 0)
    })
}
