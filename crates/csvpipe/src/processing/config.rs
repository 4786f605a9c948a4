use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CsvPipeError;
use crate::hashing;

/// Mapping target that drops a column from the output.
pub const EXCLUDE_SENTINEL: &str = "Do Not Import";

fn default_merge_delimiter() -> String {
    " ".to_string()
}

/// Per-job transformation settings.
///
/// An empty config is valid and runs only the empty-column removal stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingConfig {
    pub remove_duplicates: bool,
    /// Key columns for duplicate detection, in order. Ignored unless
    /// `remove_duplicates` is set.
    pub duplicate_check_columns: Vec<String>,
    pub merge_columns: Vec<String>,
    pub merge_delimiter: String,
    /// Source column name to target name or [`EXCLUDE_SENTINEL`].
    pub column_mappings: BTreeMap<String, String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: false,
            duplicate_check_columns: Vec::new(),
            merge_columns: Vec::new(),
            merge_delimiter: default_merge_delimiter(),
            column_mappings: BTreeMap::new(),
        }
    }
}

impl ProcessingConfig {
    /// True when the target means "do not import". Blank targets count too.
    pub fn is_excluded(target: &str) -> bool {
        let target = target.trim();
        target.is_empty() || target.eq_ignore_ascii_case(EXCLUDE_SENTINEL)
    }

    /// Rejects configs that can never produce a usable result.
    pub fn validate(&self) -> Result<(), CsvPipeError> {
        if self.duplicate_check_columns.iter().any(|c| c.is_empty()) {
            return Err(CsvPipeError::validation(
                "duplicateCheckColumns contains an empty column name",
            ));
        }
        if self.merge_columns.iter().any(|c| c.is_empty()) {
            return Err(CsvPipeError::validation(
                "mergeColumns contains an empty column name",
            ));
        }
        if self.column_mappings.keys().any(|k| k.is_empty()) {
            return Err(CsvPipeError::validation(
                "columnMappings contains an empty source column name",
            ));
        }
        if !self.column_mappings.is_empty()
            && self.column_mappings.values().all(|t| Self::is_excluded(t))
        {
            return Err(CsvPipeError::validation(
                "columnMappings excludes every column; nothing would be imported",
            ));
        }
        Ok(())
    }

    /// Canonical form: ordered sets deduplicated, unused fields reset.
    ///
    /// Two configs that behave identically normalize to the same value.
    pub fn normalized(&self) -> Self {
        let remove_duplicates = self.remove_duplicates;
        let duplicate_check_columns = if remove_duplicates {
            dedup_preserving_order(&self.duplicate_check_columns)
        } else {
            Vec::new()
        };
        let merge_columns = dedup_preserving_order(&self.merge_columns);
        let merge_delimiter = if merge_columns.is_empty() {
            default_merge_delimiter()
        } else {
            self.merge_delimiter.clone()
        };

        Self {
            remove_duplicates,
            duplicate_check_columns,
            merge_columns,
            merge_delimiter,
            column_mappings: self.column_mappings.clone(),
        }
    }

    /// Memoization key: SHA-256 over the sorted-key JSON of the normalized config.
    pub fn config_hash(&self) -> Result<String, serde_json::Error> {
        hashing::hash_config(&self.normalized())
    }

    pub fn has_mappings(&self) -> bool {
        !self.column_mappings.is_empty()
    }
}

fn dedup_preserving_order(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}
