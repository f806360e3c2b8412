//! Hooks for observing the repair pipeline.

use std::time::Duration;

/// How a claimed task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Done,
    RetryScheduled,
    /// Failed in a way retries cannot fix.
    Skipped,
    /// Failed after exhausting its retries.
    Abandoned,
}

impl TaskOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::RetryScheduled => "retry_scheduled",
            Self::Skipped => "skipped",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Receives pipeline notifications. Every method defaults to a no-op.
pub trait RepairObserver: Send + Sync {
    fn event_received(&self, _subject: &str) {}

    fn task_enqueued(&self, _task_type: &str) {}

    fn task_finished(&self, _task_type: &str, _outcome: TaskOutcome, _elapsed: Duration) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RepairObserver for NoopObserver {}
