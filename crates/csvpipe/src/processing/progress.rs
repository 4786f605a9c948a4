use super::runner::Stage;

/// Events emitted by the pipeline while a table is transformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StageCompleted {
        stage: Stage,
        completed: usize,
        total: usize,
        percent: u8,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for callers that do not track progress.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// `completed / total * 100`, rounded to the nearest integer.
pub fn stage_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total);
    ((completed * 100 + total / 2) / total) as u8
}
