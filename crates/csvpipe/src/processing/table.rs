use serde::{Deserialize, Serialize};

use super::error::TransformError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// In-memory tabular data: a header plus positional string rows.
///
/// Rows may be shorter than the header; missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parses comma-separated bytes; the first record is the header.
    ///
    /// Quoted fields keep embedded delimiters and newlines verbatim. Ragged
    /// rows are accepted as-is.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, TransformError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut records = reader.records();
        let headers = match records.next() {
            Some(record) => record?.iter().map(str::to_string).collect(),
            None => return Ok(Self::default()),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Serializes back to CSV, quoting only where needed.
    pub fn to_csv(&self) -> Result<Vec<u8>, TransformError> {
        if self.headers.is_empty() && self.rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }

        writer
            .into_inner()
            .map_err(|e| TransformError::Serialize(e.to_string()))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell at `(row, column)`, or `""` when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Position of the first header named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Header plus the first `limit` rows, with counts for the whole table.
    pub fn preview(&self, limit: usize) -> Preview {
        self.window(0, limit)
    }

    /// Header plus rows `[offset, offset + limit)`.
    pub fn window(&self, offset: usize, limit: usize) -> Preview {
        let rows = self
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Preview {
            headers: self.headers.clone(),
            rows,
            total_rows: self.row_count(),
            total_columns: self.column_count(),
        }
    }
}

/// Bounded snapshot of a table, persisted with jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub total_columns: usize,
}

impl Preview {
    /// True when the snapshot holds every row of the source table.
    pub fn is_complete(&self) -> bool {
        self.rows.len() >= self.total_rows
    }
}
