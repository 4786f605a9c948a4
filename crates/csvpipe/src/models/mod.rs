//! Domain records built from repository rows.

pub mod file;
pub mod job;

pub use file::StoredFile;
pub use job::{JobStatus, ProcessingJob};
