//! Repair pipeline errors.

use thiserror::Error;

use crate::domain::{
    products::ProductsServiceError,
    repair::{events::EventStreamError, tasks::TaskQueueError},
};

/// Failure while turning a stream message into a task.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("failed to acknowledge message")]
    Ack(#[from] EventStreamError),

    #[error("failed to decode event payload")]
    Decode(#[from] serde_json::Error),

    #[error("failed to enqueue repair task")]
    Enqueue(#[from] TaskQueueError),
}

/// Failure while executing a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("malformed task payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("no handler registered for task type {0}")]
    UnknownTaskType(String),

    #[error("task timed out")]
    Timeout,

    #[error("product store failure: {0}")]
    Store(#[source] ProductsServiceError),
}

impl TaskError {
    /// Whether running the task again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_not_retried() {
        let decode = serde_json::from_slice::<serde_json::Value>(b"{")
            .map_err(TaskError::Decode)
            .err();

        assert!(
            decode.is_some_and(|error| !error.is_retryable()),
            "decode errors must not be retried"
        );
        assert!(!TaskError::UnknownTaskType("x".to_string()).is_retryable());
        assert!(TaskError::Timeout.is_retryable());
        assert!(TaskError::Store(ProductsServiceError::Sql(sqlx::Error::PoolTimedOut)).is_retryable());
    }
}
