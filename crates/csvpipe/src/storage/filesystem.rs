use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Byte storage under a single root directory.
///
/// Callers address files by a `/`-separated path relative to the root.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Writes `content` to a file that must not exist yet.
    ///
    /// Creation uses `create_new` (O_EXCL), so two writers never share a path.
    /// A partially written file is removed before the error is returned.
    pub fn write_new(&self, relative: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(path));
            }
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        };

        if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(StorageError::WriteFile { path, source: e });
        }

        Ok(path)
    }

    /// Atomically sets the content at `relative`, whether or not it exists.
    ///
    /// The bytes go to a sibling temp file first, then are renamed into place.
    pub fn replace(&self, relative: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let temp = format!("{}.tmp-{}", relative, uuid::Uuid::new_v4());
        let temp_path = self.write_new(&temp, content)?;
        let path = self.resolve(relative);

        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::WriteFile { path, source: e });
        }
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative);
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Best-effort removal. Returns whether a file was deleted.
    pub fn remove(&self, relative: &str) -> bool {
        let path = self.resolve(relative);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                if let Some(parent) = path.parent() {
                    // Only succeeds when the directory is empty.
                    let _ = std::fs::remove_dir(parent);
                }
                true
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "could not remove stored bytes");
                false
            }
        }
    }

    /// Creates `path` and its parents. Safe under concurrent creation.
    pub fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::create_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
