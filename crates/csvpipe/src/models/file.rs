use serde::Serialize;

use crate::db::file_repo::FileRow;

/// Metadata for one stored byte blob, original or derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content_hash: String,
    /// Location relative to the storage root. Never exposed to clients.
    #[serde(skip)]
    pub storage_path: String,
    pub parent_file_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredFile {
    pub fn is_derived(&self) -> bool {
        self.parent_file_id.is_some()
    }
}

impl From<FileRow> for StoredFile {
    fn from(row: FileRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            mime_type: row.mime_type,
            size_bytes: u64::try_from(row.size_bytes).unwrap_or(0),
            content_hash: row.content_hash,
            storage_path: row.storage_path,
            parent_file_id: row.parent_file_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&StoredFile> for FileRow {
    fn from(file: &StoredFile) -> Self {
        Self {
            id: file.id.clone(),
            owner_id: file.owner_id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: i64::try_from(file.size_bytes).unwrap_or(i64::MAX),
            content_hash: file.content_hash.clone(),
            storage_path: file.storage_path.clone(),
            parent_file_id: file.parent_file_id.clone(),
            created_at: file.created_at.clone(),
            updated_at: file.updated_at.clone(),
        }
    }
}
