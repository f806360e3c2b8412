//! Postgres-backed task queue.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, Postgres, Row, postgres::PgRow, query, query_as, query_scalar};
use uuid::Uuid;

use crate::{
    database::Db,
    domain::repair::tasks::{
        ClaimedTask, NewTask, TaskBroker, TaskLease, TaskQueue, TaskQueueError, TaskStatus,
    },
};

const ENQUEUE_TASK_SQL: &str = include_str!("sql/enqueue_task.sql");
const CLAIM_TASK_SQL: &str = include_str!("sql/claim_task.sql");
const COMPLETE_TASK_SQL: &str = include_str!("sql/complete_task.sql");
const RETRY_TASK_SQL: &str = include_str!("sql/retry_task.sql");
const ABANDON_TASK_SQL: &str = include_str!("sql/abandon_task.sql");
const PURGE_EXPIRED_TASKS_SQL: &str = include_str!("sql/purge_expired_tasks.sql");
const TASK_STATUS_SQL: &str = include_str!("sql/task_status.sql");

fn held(lease: TaskLease, rows_affected: u64) -> Result<(), TaskQueueError> {
    if rows_affected == 0 {
        return Err(TaskQueueError::LeaseLost(lease.uuid));
    }

    Ok(())
}

/// Tasks stored in the `tasks` table and claimed with `SKIP LOCKED` leases.
#[derive(Debug, Clone)]
pub struct PgTaskQueue {
    db: Db,
}

impl PgTaskQueue {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Current status of a task, or `None` once it has been purged.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    pub async fn status(&self, task: Uuid) -> Result<Option<TaskStatus>, TaskQueueError> {
        let status = query_scalar::<Postgres, String>(TASK_STATUS_SQL)
            .bind(task)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(status.as_deref().and_then(TaskStatus::parse))
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, task: NewTask) -> Result<Uuid, TaskQueueError> {
        let max_retry = i32::try_from(task.max_retry)?;
        let retention = i64::try_from(task.retention.as_secs())?;

        let uuid = query_scalar::<Postgres, Uuid>(ENQUEUE_TASK_SQL)
            .bind(task.uuid)
            .bind(task.task_type)
            .bind(task.payload)
            .bind(max_retry)
            .bind(retention)
            .fetch_one(self.db.pool())
            .await?;

        Ok(uuid)
    }
}

#[async_trait]
impl TaskBroker for PgTaskQueue {
    async fn claim(
        &self,
        task_types: &[String],
        lease: Duration,
    ) -> Result<Option<ClaimedTask>, TaskQueueError> {
        let claimed = query_as::<Postgres, ClaimedTask>(CLAIM_TASK_SQL)
            .bind(task_types)
            .bind(lease.as_secs_f64())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(claimed)
    }

    async fn complete(&self, lease: TaskLease) -> Result<(), TaskQueueError> {
        let settled = query(COMPLETE_TASK_SQL)
            .bind(lease.uuid)
            .bind(i32::try_from(lease.attempts)?)
            .execute(self.db.pool())
            .await?;

        held(lease, settled.rows_affected())
    }

    async fn schedule_retry(
        &self,
        lease: TaskLease,
        delay: Duration,
        error: &str,
    ) -> Result<(), TaskQueueError> {
        let settled = query(RETRY_TASK_SQL)
            .bind(lease.uuid)
            .bind(i32::try_from(lease.attempts)?)
            .bind(delay.as_secs_f64())
            .bind(error)
            .execute(self.db.pool())
            .await?;

        held(lease, settled.rows_affected())
    }

    async fn abandon(&self, lease: TaskLease, error: &str) -> Result<(), TaskQueueError> {
        let settled = query(ABANDON_TASK_SQL)
            .bind(lease.uuid)
            .bind(i32::try_from(lease.attempts)?)
            .bind(error)
            .execute(self.db.pool())
            .await?;

        held(lease, settled.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, TaskQueueError> {
        let purged = query(PURGE_EXPIRED_TASKS_SQL)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        Ok(purged)
    }
}

impl<'r> FromRow<'r, PgRow> for ClaimedTask {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let attempts: i32 = row.try_get("attempts")?;
        let max_retry: i32 = row.try_get("max_retry")?;

        Ok(Self {
            uuid: row.try_get("uuid")?,
            task_type: row.try_get("task_type")?,
            payload: row.try_get("payload")?,
            attempts: u32::try_from(attempts).map_err(|e| sqlx::Error::ColumnDecode {
                index: "attempts".to_string(),
                source: Box::new(e),
            })?,
            max_retry: u32::try_from(max_retry).map_err(|e| sqlx::Error::ColumnDecode {
                index: "max_retry".to_string(),
                source: Box::new(e),
            })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::{
        domain::{
            products::models::ObjectId,
            repair::tasks::{RepairTask, RetryPolicy, UPDATE_THUMBNAIL_TASK},
        },
        test::db::TestDb,
    };

    fn task_types() -> Vec<String> {
        vec![UPDATE_THUMBNAIL_TASK.to_string()]
    }

    fn repair(policy: RetryPolicy) -> Result<NewTask, serde_json::Error> {
        RepairTask {
            old_thumbnail: ObjectId::from("obj-1"),
            new_thumbnail: ObjectId::from("default"),
        }
        .to_new_task(policy)
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon for the PostgreSQL test container"]
    async fn claimed_task_is_leased_to_one_worker() -> TestResult {
        let db = TestDb::new().await;
        let queue = PgTaskQueue::new(Db::new(db.pool().clone()));

        let uuid = queue.enqueue(repair(RetryPolicy::default())?).await?;

        let claimed = queue
            .claim(&task_types(), Duration::from_secs(60))
            .await?;

        assert_eq!(claimed.as_ref().map(|task| task.uuid), Some(uuid));
        assert_eq!(claimed.map(|task| task.attempts), Some(1));

        let second = queue
            .claim(&task_types(), Duration::from_secs(60))
            .await?;

        assert_eq!(second, None);
        assert_eq!(queue.status(uuid).await?, Some(TaskStatus::Processing));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon for the PostgreSQL test container"]
    async fn expired_lease_is_reclaimed() -> TestResult {
        let db = TestDb::new().await;
        let queue = PgTaskQueue::new(Db::new(db.pool().clone()));

        let uuid = queue.enqueue(repair(RetryPolicy::default())?).await?;

        queue.claim(&task_types(), Duration::ZERO).await?;

        let reclaimed = queue
            .claim(&task_types(), Duration::from_secs(60))
            .await?;

        assert_eq!(reclaimed.as_ref().map(|task| task.uuid), Some(uuid));
        assert_eq!(reclaimed.map(|task| task.attempts), Some(2));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon for the PostgreSQL test container"]
    async fn stale_lease_cannot_settle_reclaimed_task() -> TestResult {
        let db = TestDb::new().await;
        let queue = PgTaskQueue::new(Db::new(db.pool().clone()));

        let uuid = queue.enqueue(repair(RetryPolicy::default())?).await?;

        let first = queue
            .claim(&task_types(), Duration::ZERO)
            .await?
            .ok_or("expected a first claim")?;

        let second = queue
            .claim(&task_types(), Duration::from_secs(60))
            .await?
            .ok_or("expected the expired lease to be reclaimed")?;

        let completed = queue.complete(first.lease()).await;

        assert!(
            matches!(completed, Err(TaskQueueError::LeaseLost(task)) if task == uuid),
            "stale complete should be refused, got {completed:?}"
        );

        let retried = queue
            .schedule_retry(first.lease(), Duration::ZERO, "timed out")
            .await;

        assert!(
            matches!(retried, Err(TaskQueueError::LeaseLost(_))),
            "stale retry should be refused, got {retried:?}"
        );
        assert_eq!(queue.status(uuid).await?, Some(TaskStatus::Processing));

        queue.complete(second.lease()).await?;

        assert_eq!(queue.status(uuid).await?, Some(TaskStatus::Done));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon for the PostgreSQL test container"]
    async fn retry_delays_next_claim() -> TestResult {
        let db = TestDb::new().await;
        let queue = PgTaskQueue::new(Db::new(db.pool().clone()));

        let uuid = queue.enqueue(repair(RetryPolicy::default())?).await?;

        let claimed = queue
            .claim(&task_types(), Duration::from_secs(60))
            .await?
            .ok_or("expected a claim")?;

        queue
            .schedule_retry(claimed.lease(), Duration::from_secs(600), "store unavailable")
            .await?;

        assert_eq!(queue.status(uuid).await?, Some(TaskStatus::RetryScheduled));

        let claimed = queue
            .claim(&task_types(), Duration::from_secs(60))
            .await?;

        assert_eq!(claimed, None);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a Docker daemon for the PostgreSQL test container"]
    async fn finished_tasks_are_purged_after_retention() -> TestResult {
        let db = TestDb::new().await;
        let queue = PgTaskQueue::new(Db::new(db.pool().clone()));

        let expiring = queue
            .enqueue(repair(RetryPolicy {
                max_retry: 1,
                retention: Duration::ZERO,
            })?)
            .await?;

        let kept = queue.enqueue(repair(RetryPolicy::default())?).await?;

        for _ in 0..2 {
            let claimed = queue
                .claim(&task_types(), Duration::from_secs(60))
                .await?
                .ok_or("expected a claim")?;

            if claimed.uuid == expiring {
                queue.complete(claimed.lease()).await?;
            } else {
                queue.abandon(claimed.lease(), "malformed payload").await?;
            }
        }

        let purged = queue.purge_expired().await?;

        assert_eq!(purged, 1);
        assert_eq!(queue.status(expiring).await?, None);
        assert_eq!(queue.status(kept).await?, Some(TaskStatus::Abandoned));

        Ok(())
    }
}
