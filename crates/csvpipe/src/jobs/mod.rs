pub mod orchestrator;

pub use orchestrator::{JobCreation, Orchestrator, PREVIEW_ROWS};
