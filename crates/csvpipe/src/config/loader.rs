use std::path::Path;

use crate::config::schema::{Settings, SETTINGS_VERSION};
use crate::error::ConfigError;

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if settings.version != SETTINGS_VERSION {
        return invalid(format!("Unsupported config version: {}", settings.version));
    }
    if settings.storage_root.as_os_str().is_empty() {
        return invalid("storage_root must not be empty".to_string());
    }
    if settings.worker_count == 0 {
        return invalid("worker_count must be greater than zero".to_string());
    }
    if settings.queue_capacity == 0 {
        return invalid("queue_capacity must be greater than zero".to_string());
    }
    if settings.upload.max_bytes == 0 {
        return invalid("upload.max_bytes must be greater than zero".to_string());
    }
    if settings.upload.allowed_mime_types.is_empty() {
        return invalid("upload.allowed_mime_types must list at least one type".to_string());
    }
    if let Some(i) = settings
        .mapping_targets
        .iter()
        .position(|t| t.trim().is_empty())
    {
        return invalid(format!("mapping_targets[{}] is empty", i));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::storage::content_store::DEFAULT_MAX_UPLOAD_BYTES;

    #[test]
    fn test_minimal_settings_get_defaults() {
        let settings = load_settings_from_str(r#"{"storage_root": "/var/lib/csvpipe"}"#).unwrap();
        assert_eq!(settings.version, "1.0");
        assert!(settings.worker_count > 0);
        assert_eq!(settings.queue_capacity, 256);
        assert_eq!(settings.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(settings
            .upload
            .allowed_mime_types
            .contains(&"text/csv".to_string()));
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Text);
        assert!(settings.database_path().ends_with("csvpipe.db"));
    }

    #[test]
    fn test_full_settings() {
        let settings = load_settings_from_str(
            r#"{
                "version": "1.0",
                "storage_root": "/data",
                "database_path": "/db/meta.db",
                "worker_count": 3,
                "queue_capacity": 8,
                "upload": {"max_bytes": 1024, "allowed_mime_types": ["text/csv"]},
                "logging": {"level": "debug", "format": "json"},
                "mapping_targets": ["email", "firstname"]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.worker_count, 3);
        assert_eq!(settings.upload.allowed_mime_types, vec!["text/csv"]);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.database_path(), std::path::PathBuf::from("/db/meta.db"));
        assert_eq!(settings.mapping_targets.len(), 2);
    }

    #[test]
    fn test_invalid_settings() {
        let cases = [
            r#"{"version": "2.0", "storage_root": "/d"}"#,
            r#"{"storage_root": ""}"#,
            r#"{"storage_root": "/d", "worker_count": 0}"#,
            r#"{"storage_root": "/d", "queue_capacity": 0}"#,
            r#"{"storage_root": "/d", "upload": {"max_bytes": 0}}"#,
            r#"{"storage_root": "/d", "upload": {"allowed_mime_types": []}}"#,
            r#"{"storage_root": "/d", "mapping_targets": ["ok", " "]}"#,
        ];
        for case in cases {
            assert!(
                matches!(load_settings_from_str(case), Err(ConfigError::Validation { .. })),
                "{}",
                case
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            load_settings_from_str("{"),
            Err(ConfigError::ParseJson(_))
        ));
        assert!(matches!(
            load_settings_from_str("{}"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csvpipe.json");
        std::fs::write(&path, r#"{"storage_root": "/d"}"#).unwrap();
        assert!(load_settings(&path).is_ok());
        assert!(matches!(
            load_settings(dir.path().join("missing.json")),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
