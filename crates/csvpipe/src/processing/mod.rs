//! Transformation engine: an ordered set of table stages with progress reporting.

pub mod config;
pub mod error;
pub mod progress;
pub mod runner;
pub mod stages;
pub mod table;

pub use config::{ProcessingConfig, EXCLUDE_SENTINEL};
pub use error::TransformError;
pub use progress::{stage_percent, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{Pipeline, Stage};
pub use table::{Preview, Table};
