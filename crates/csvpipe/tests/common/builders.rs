#![allow(dead_code)]

use std::collections::BTreeMap;

use csvpipe::ProcessingConfig;

/// Builds CSV bytes row by row.
#[derive(Default)]
pub struct CsvBuilder {
    lines: Vec<String>,
}

impl CsvBuilder {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            lines: vec![headers.join(",")],
        }
    }

    pub fn row(mut self, cells: &[&str]) -> Self {
        self.lines.push(cells.join(","));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out.into_bytes()
    }
}

/// Fluent construction of a [`ProcessingConfig`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: ProcessingConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dedupe_on(mut self, columns: &[&str]) -> Self {
        self.config.remove_duplicates = true;
        self.config.duplicate_check_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn merge(mut self, columns: &[&str], delimiter: &str) -> Self {
        self.config.merge_columns = columns.iter().map(|c| c.to_string()).collect();
        self.config.merge_delimiter = delimiter.to_string();
        self
    }

    pub fn map(mut self, source: &str, target: &str) -> Self {
        self.config
            .column_mappings
            .insert(source.to_string(), target.to_string());
        self
    }

    pub fn mappings(mut self, pairs: &[(&str, &str)]) -> Self {
        self.config.column_mappings = pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect::<BTreeMap<_, _>>();
        self
    }

    pub fn build(self) -> ProcessingConfig {
        self.config
    }
}
