//! Task Queue Config

use std::time::Duration;

use clap::Args;
use product_service_app::repair::{TaskServerSettings, tasks::RetryPolicy};

/// Retry budget and task server tuning.
#[derive(Debug, Args)]
pub struct QueueConfig {
    /// Reruns allowed after the first failure
    #[arg(long, env = "TASK_MAX_RETRY", default_value_t = 5)]
    pub task_max_retry: u32,

    /// How long finished tasks are kept, in seconds
    #[arg(long, env = "TASK_RETENTION_SECONDS", default_value_t = 24 * 60 * 60)]
    pub task_retention_seconds: u64,

    /// Tasks executed in parallel
    #[arg(long, env = "TASK_CONCURRENCY", default_value_t = 10)]
    pub task_concurrency: usize,

    /// Execution limit per task, in seconds
    #[arg(long, env = "TASK_TIMEOUT_SECONDS", default_value_t = 30)]
    pub task_timeout_seconds: u64,

    /// How long a claim outlives the execution limit, in seconds
    #[arg(long, env = "TASK_LEASE_MARGIN_SECONDS", default_value_t = 10)]
    pub task_lease_margin_seconds: u64,

    /// Idle wait between polls of an empty queue, in milliseconds
    #[arg(long, env = "TASK_POLL_INTERVAL_MS", default_value_t = 1_000)]
    pub task_poll_interval_ms: u64,

    /// Interval between purges of expired tasks, in seconds
    #[arg(long, env = "TASK_PURGE_INTERVAL_SECONDS", default_value_t = 60 * 60)]
    pub task_purge_interval_seconds: u64,
}

impl QueueConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retry: self.task_max_retry,
            retention: Duration::from_secs(self.task_retention_seconds),
        }
    }

    pub fn server_settings(&self) -> TaskServerSettings {
        TaskServerSettings {
            concurrency: self.task_concurrency,
            poll_interval: Duration::from_millis(self.task_poll_interval_ms),
            task_timeout: Duration::from_secs(self.task_timeout_seconds),
            lease_margin: Duration::from_secs(self.task_lease_margin_seconds.max(1)),
            purge_interval: Duration::from_secs(self.task_purge_interval_seconds.max(1)),
        }
    }
}
