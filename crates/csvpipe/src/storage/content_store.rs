//! Content-addressed file store: bytes on disk, metadata in the repository.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::file_repo::{self, FileRow};
use crate::db::{self, Database};
use crate::error::{CsvPipeError, Result};
use crate::hashing;
use crate::models::StoredFile;
use crate::sanitize;

use super::filesystem::FileStorage;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
const DERIVED_MIME_TYPE: &str = "text/csv";

fn default_allowed_mime_types() -> Vec<String> {
    [
        "text/csv",
        "application/csv",
        "text/x-csv",
        "application/x-csv",
        "text/comma-separated-values",
        "text/plain",
        "application/vnd.ms-excel",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Size and type limits enforced on every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

/// Lower-cases a MIME type and drops parameters such as `charset`.
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Stores originals and derived outputs for many owners under one root.
///
/// Layout: `{owner}/{fileId}/original.{ext}` for uploads and
/// `{owner}/{originalId}/processed_{jobId}.csv` for derived files.
pub struct ContentStore {
    db: Database,
    files: FileStorage,
    limits: UploadLimits,
}

impl ContentStore {
    pub fn new(db: Database, files: FileStorage, limits: UploadLimits) -> Self {
        Self { db, files, limits }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Validates and stores an uploaded file.
    ///
    /// When an identical original already exists for the owner (a concurrent
    /// upload won the race), the fresh bytes are discarded and the existing
    /// record is returned.
    pub fn store(
        &self,
        owner_id: &str,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
        hash: Option<&str>,
    ) -> Result<StoredFile> {
        check_owner(owner_id)?;
        let name = sanitize::redact_name(name);
        let mime_type = self.validate_upload(bytes.len() as u64, &name, mime_type)?;

        let content_hash = match hash {
            Some(h) if hashing::is_sha256_hex(h) => h.to_ascii_lowercase(),
            Some(h) => {
                return Err(CsvPipeError::validation(format!(
                    "'{}' is not a SHA-256 hex digest",
                    h
                )))
            }
            None => hashing::hash_bytes(bytes),
        };

        let id = Uuid::new_v4().to_string();
        let ext = sanitize::extension_of(&name).unwrap_or_else(|| "csv".to_string());
        let storage_path = format!("{}/{}/original.{}", owner_id, id, ext);

        self.files.write_new(&storage_path, bytes)?;

        let now = db::timestamp();
        let file = StoredFile {
            id,
            owner_id: owner_id.to_string(),
            name,
            mime_type,
            size_bytes: bytes.len() as u64,
            content_hash,
            storage_path,
            parent_file_id: None,
            created_at: now.clone(),
            updated_at: now,
        };

        match file_repo::insert(&self.db, &FileRow::from(&file)) {
            Ok(()) => {
                info!(file_id = %file.id, name = %file.name, size = file.size_bytes, "stored file");
                Ok(file)
            }
            Err(e) if e.is_unique_violation() => {
                self.files.remove(&file.storage_path);
                debug!(hash = %file.content_hash, "identical upload already stored");
                file_repo::find_original_by_hash(&self.db, &file.content_hash, owner_id)?
                    .map(StoredFile::from)
                    .ok_or_else(|| e.into())
            }
            Err(e) => {
                self.files.remove(&file.storage_path);
                Err(e.into())
            }
        }
    }

    /// Stores the output of job `job_id` as a child of `parent_file_id`.
    pub fn store_derived(
        &self,
        owner_id: &str,
        bytes: &[u8],
        parent_file_id: &str,
        job_id: &str,
    ) -> Result<StoredFile> {
        check_owner(owner_id)?;
        if !sanitize::is_safe_segment(job_id) {
            return Err(CsvPipeError::validation(format!(
                "job id '{}' is not usable in a storage path",
                job_id
            )));
        }
        let parent = self.find(parent_file_id, owner_id)?;

        let storage_path = format!("{}/{}/processed_{}.csv", owner_id, parent.id, job_id);
        self.files.write_new(&storage_path, bytes)?;

        let now = db::timestamp();
        let file = StoredFile {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: format!("{}_processed.csv", sanitize::stem_of(&parent.name)),
            mime_type: DERIVED_MIME_TYPE.to_string(),
            size_bytes: bytes.len() as u64,
            content_hash: hashing::hash_bytes(bytes),
            storage_path,
            parent_file_id: Some(parent.id),
            created_at: now.clone(),
            updated_at: now,
        };

        if let Err(e) = file_repo::insert(&self.db, &FileRow::from(&file)) {
            self.files.remove(&file.storage_path);
            return Err(e.into());
        }

        info!(file_id = %file.id, job_id, "stored derived file");
        Ok(file)
    }

    /// Metadata for a file the owner can see.
    pub fn find(&self, file_id: &str, owner_id: &str) -> Result<StoredFile> {
        file_repo::find_by_id(&self.db, file_id, owner_id)?
            .map(StoredFile::from)
            .ok_or_else(|| CsvPipeError::not_found("File", file_id))
    }

    pub fn read_bytes(&self, file_id: &str, owner_id: &str) -> Result<Vec<u8>> {
        let file = self.find(file_id, owner_id)?;
        self.read(&file)
    }

    pub fn read(&self, file: &StoredFile) -> Result<Vec<u8>> {
        Ok(self.files.read(&file.storage_path)?)
    }

    /// The owner's original file with this content hash, if any.
    pub fn exists_by_hash(&self, hash: &str, owner_id: &str) -> Result<Option<StoredFile>> {
        let hash = hash.to_ascii_lowercase();
        Ok(file_repo::find_original_by_hash(&self.db, &hash, owner_id)?.map(StoredFile::from))
    }

    /// True when the stored bytes are present and still hash to the recorded digest.
    pub fn verify(&self, file: &StoredFile) -> bool {
        let path = self.files.resolve(&file.storage_path);
        match hashing::hash_file(&path) {
            Ok(actual) if actual == file.content_hash => true,
            Ok(actual) => {
                warn!(file_id = %file.id, expected = %file.content_hash, %actual, "stored bytes changed");
                false
            }
            Err(e) => {
                warn!(file_id = %file.id, error = %e, "stored bytes unreadable");
                false
            }
        }
    }

    /// Puts `bytes` back at the record's location after they went missing
    /// or changed. The record and everything referencing it stay untouched.
    pub fn restore(&self, file: &StoredFile, bytes: &[u8]) -> Result<()> {
        let actual = hashing::hash_bytes(bytes);
        if actual != file.content_hash {
            return Err(CsvPipeError::validation(format!(
                "content hash {} does not match file '{}'",
                actual, file.id
            )));
        }
        self.files.replace(&file.storage_path, bytes)?;
        info!(file_id = %file.id, "restored stored bytes");
        Ok(())
    }

    /// Drops a derived file that no job ended up referencing.
    ///
    /// Both the record and the bytes are removed best-effort.
    pub fn discard_derived(&self, file: &StoredFile) {
        if let Err(e) = file_repo::delete(&self.db, &file.id, &file.owner_id) {
            warn!(file_id = %file.id, error = %e, "failed to remove derived record");
        }
        self.files.remove(&file.storage_path);
        debug!(file_id = %file.id, "discarded derived file");
    }

    /// Removes the metadata record; derived records and jobs cascade.
    ///
    /// Byte removal is attempted afterwards and is best-effort only.
    pub fn delete(&self, file_id: &str, owner_id: &str) -> Result<()> {
        let file = self.find(file_id, owner_id)?;
        let derived = file_repo::list_derived(&self.db, &file.id)?;

        if !file_repo::delete(&self.db, &file.id, owner_id)? {
            return Err(CsvPipeError::not_found("File", file_id));
        }

        for child in &derived {
            self.files.remove(&child.storage_path);
        }
        self.files.remove(&file.storage_path);

        info!(file_id = %file.id, derived = derived.len(), "deleted file");
        Ok(())
    }

    /// Checks size and type limits. Returns the normalized MIME type.
    pub fn validate_upload(&self, size: u64, name: &str, mime_type: &str) -> Result<String> {
        if size == 0 {
            return Err(CsvPipeError::validation("File is empty"));
        }
        if size > self.limits.max_bytes {
            return Err(CsvPipeError::validation(format!(
                "File size {} bytes exceeds the limit of {} bytes",
                size, self.limits.max_bytes
            )));
        }

        let mut mime = normalize_mime(mime_type);
        if mime.is_empty() || mime == "application/octet-stream" {
            mime = mime_guess::from_path(name)
                .first_raw()
                .map(str::to_string)
                .unwrap_or(mime);
        }

        let allowed = self
            .limits
            .allowed_mime_types
            .iter()
            .any(|m| normalize_mime(m) == mime);
        if !allowed {
            return Err(CsvPipeError::validation(format!(
                "File type '{}' is not allowed",
                if mime.is_empty() { "unknown" } else { mime.as_str() }
            )));
        }
        Ok(mime)
    }
}

fn check_owner(owner_id: &str) -> Result<()> {
    if sanitize::is_safe_segment(owner_id) {
        Ok(())
    } else {
        Err(CsvPipeError::validation(format!(
            "owner id '{}' must be 1-128 characters of [A-Za-z0-9_-]",
            owner_id
        )))
    }
}
