pub mod content_store;
pub mod filesystem;

pub use content_store::{ContentStore, UploadLimits};
pub use filesystem::FileStorage;
