use std::sync::Arc;

use crate::error::WorkerError;

/// Unit of work handed to the workers: run job `job_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: String,
    pub file_id: String,
}

impl JobTicket {
    pub fn new(job_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            file_id: file_id.into(),
        }
    }
}

/// Executes one ticket to completion. Outcomes are recorded on the job row.
pub trait JobHandler: Send + Sync {
    fn handle(&self, ticket: &JobTicket);
}

/// Hands tickets off for execution without waiting for the result.
pub trait JobDispatcher: Send + Sync {
    fn dispatch(&self, ticket: JobTicket) -> Result<(), WorkerError>;
}

/// Runs each ticket on the calling thread before `dispatch` returns.
///
/// Used where deterministic, synchronous processing is wanted.
pub struct InlineDispatcher {
    handler: Arc<dyn JobHandler>,
}

impl InlineDispatcher {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self { handler }
    }
}

impl JobDispatcher for InlineDispatcher {
    fn dispatch(&self, ticket: JobTicket) -> Result<(), WorkerError> {
        self.handler.handle(&ticket);
        Ok(())
    }
}
