use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to parse CSV: {0}")]
    Parse(#[from] csv::Error),

    #[error("Failed to serialize CSV: {0}")]
    Serialize(String),

    #[error("Column mapping leaves no columns to import")]
    NoColumnsMapped,
}
