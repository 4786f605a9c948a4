//! SHA-256 digests for content addressing and job memoization.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

const READ_BUFFER_SIZE: usize = 8192;

/// Hex SHA-256 of an in-memory byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex SHA-256 of any readable source, read in fixed-size chunks.
///
/// Produces the same digest as [`hash_bytes`] over the full content. Read
/// errors are returned as-is; no digest is produced for a partial read.
pub fn hash_stream<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Streams a file from disk through [`hash_stream`].
pub fn hash_file(path: &Path) -> Result<String, StorageError> {
    let read_err = |e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    hash_stream(&mut file).map_err(read_err)
}

/// Digest of a value's canonical JSON encoding.
///
/// The value goes through `serde_json::Value` first, whose object map keeps
/// keys sorted, so the encoding does not depend on construction order.
pub fn hash_config<T: Serialize>(config: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(config)?;
    Ok(hash_bytes(canonical.as_bytes()))
}

/// Sorted-key JSON encoding used for hashing and persistence.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&value)
}

/// True for a 64-character hex string.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
