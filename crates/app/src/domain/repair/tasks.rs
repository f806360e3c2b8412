//! Repair tasks and the queue contracts they travel through.

use std::{num::TryFromIntError, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::products::models::ObjectId;

/// Task type for thumbnail reference repairs.
pub const UPDATE_THUMBNAIL_TASK: &str = "product:updateThumbnail";

/// Rewrite every product referencing `old_thumbnail` to `new_thumbnail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairTask {
    #[serde(rename = "oldObjectID")]
    pub old_thumbnail: ObjectId,

    #[serde(rename = "newObjectID")]
    pub new_thumbnail: ObjectId,
}

impl RepairTask {
    /// Encode the repair as a queueable task.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_new_task(&self, policy: RetryPolicy) -> Result<NewTask, serde_json::Error> {
        Ok(NewTask {
            uuid: Uuid::now_v7(),
            task_type: UPDATE_THUMBNAIL_TASK.to_string(),
            payload: serde_json::to_vec(self)?,
            max_retry: policy.max_retry,
            retention: policy.retention,
        })
    }
}

/// Retry budget and how long finished tasks are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry: u32,
    pub retention: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: 5,
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub uuid: Uuid,
    pub task_type: String,
    pub payload: Vec<u8>,
    pub max_retry: u32,
    pub retention: Duration,
}

/// A task leased to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    pub uuid: Uuid,
    pub task_type: String,
    pub payload: Vec<u8>,

    /// Executions so far, counting the current one.
    pub attempts: u32,
    pub max_retry: u32,
}

impl ClaimedTask {
    pub fn retries_exhausted(&self) -> bool {
        self.attempts > self.max_retry
    }

    pub fn lease(&self) -> TaskLease {
        TaskLease {
            uuid: self.uuid,
            attempts: self.attempts,
        }
    }
}

/// One claim of a task. Settling through a lease that has since been
/// reclaimed by another worker changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLease {
    pub uuid: Uuid,
    pub attempts: u32,
}

/// Lifecycle state of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Enqueued,
    Processing,
    RetryScheduled,
    Done,
    Abandoned,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Processing => "processing",
            Self::RetryScheduled => "retry_scheduled",
            Self::Done => "done",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enqueued" => Some(Self::Enqueued),
            "processing" => Some(Self::Processing),
            "retry_scheduled" => Some(Self::RetryScheduled),
            "done" => Some(Self::Done),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// Producer side of the task queue.
#[automock]
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: NewTask) -> Result<Uuid, TaskQueueError>;
}

/// Consumer side of the task queue.
#[automock]
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Lease the next runnable task of one of `task_types` for `lease`.
    async fn claim(
        &self,
        task_types: &[String],
        lease: Duration,
    ) -> Result<Option<ClaimedTask>, TaskQueueError>;

    /// Mark the leased run as done.
    ///
    /// Every settle method fails with [`TaskQueueError::LeaseLost`] when the
    /// task is no longer held under `lease`.
    async fn complete(&self, lease: TaskLease) -> Result<(), TaskQueueError>;

    /// Make the task runnable again after `delay`.
    async fn schedule_retry(
        &self,
        lease: TaskLease,
        delay: Duration,
        error: &str,
    ) -> Result<(), TaskQueueError>;

    /// Stop retrying the task.
    async fn abandon(&self, lease: TaskLease, error: &str) -> Result<(), TaskQueueError>;

    /// Delete finished tasks past their retention. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, TaskQueueError>;
}

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error("task storage error")]
    Sql(#[from] sqlx::Error),

    #[error("task value out of range")]
    OutOfRange(#[from] TryFromIntError),

    #[error("lease on task {0} was lost before settling")]
    LeaseLost(Uuid),
}
