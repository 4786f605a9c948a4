//! Queries over the `stored_files` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw `stored_files` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub storage_path: String,
    pub parent_file_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            name: row.get("name")?,
            mime_type: row.get("mime_type")?,
            size_bytes: row.get("size_bytes")?,
            content_hash: row.get("content_hash")?,
            storage_path: row.get("storage_path")?,
            parent_file_id: row.get("parent_file_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(db: &Database, file: &FileRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO stored_files (id, owner_id, name, mime_type, size_bytes, content_hash,
             storage_path, parent_file_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                file.id,
                file.owner_id,
                file.name,
                file.mime_type,
                file.size_bytes,
                file.content_hash,
                file.storage_path,
                file.parent_file_id,
                file.created_at,
                file.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a file visible to `owner_id`.
pub fn find_by_id(
    db: &Database,
    id: &str,
    owner_id: &str,
) -> Result<Option<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM stored_files WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                FileRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds the uploaded (non-derived) file with this content for `owner_id`.
pub fn find_original_by_hash(
    db: &Database,
    content_hash: &str,
    owner_id: &str,
) -> Result<Option<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM stored_files
                 WHERE content_hash = ?1 AND owner_id = ?2 AND parent_file_id IS NULL
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![content_hash, owner_id],
                FileRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Files derived from `parent_id`, newest first.
pub fn list_derived(db: &Database, parent_id: &str) -> Result<Vec<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM stored_files WHERE parent_file_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![parent_id], FileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes the row; derived files and jobs cascade. Returns whether a row existed.
pub fn delete(db: &Database, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "DELETE FROM stored_files WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(affected > 0)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_file(id: &str, owner: &str, hash: &str) -> FileRow {
        FileRow {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: "contacts.csv".to_string(),
            mime_type: "text/csv".to_string(),
            size_bytes: 42,
            content_hash: hash.to_string(),
            storage_path: format!("{}/{}/original.csv", owner, id),
            parent_file_id: None,
            created_at: "2026-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find_scoped_by_owner() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_file("f1", "u1", "h1")).unwrap();

        let found = find_by_id(&db, "f1", "u1").unwrap().unwrap();
        assert_eq!(found.name, "contacts.csv");
        assert!(find_by_id(&db, "f1", "u2").unwrap().is_none());
        assert!(find_by_id(&db, "missing", "u1").unwrap().is_none());
    }

    #[test]
    fn test_find_original_by_hash_ignores_derived() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_file("f1", "u1", "h1")).unwrap();
        let mut derived = sample_file("f2", "u1", "h2");
        derived.parent_file_id = Some("f1".to_string());
        insert(&db, &derived).unwrap();

        assert_eq!(
            find_original_by_hash(&db, "h1", "u1").unwrap().map(|f| f.id),
            Some("f1".to_string())
        );
        assert!(find_original_by_hash(&db, "h2", "u1").unwrap().is_none());
        assert!(find_original_by_hash(&db, "h1", "u2").unwrap().is_none());
        assert_eq!(list_derived(&db, "f1").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_original_is_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_file("f1", "u1", "h1")).unwrap();
        let err = insert(&db, &sample_file("f2", "u1", "h1")).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_delete_cascades_to_derived() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_file("f1", "u1", "h1")).unwrap();
        let mut derived = sample_file("f2", "u1", "h2");
        derived.parent_file_id = Some("f1".to_string());
        insert(&db, &derived).unwrap();

        assert!(!delete(&db, "f1", "u2").unwrap());
        assert!(delete(&db, "f1", "u1").unwrap());
        assert!(find_by_id(&db, "f2", "u1").unwrap().is_none());
    }
}
