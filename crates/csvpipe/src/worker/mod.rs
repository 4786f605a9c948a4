pub mod job;
pub mod pool;

pub use job::{InlineDispatcher, JobDispatcher, JobHandler, JobTicket};
pub use pool::WorkerPool;
