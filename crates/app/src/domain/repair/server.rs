//! Task server: claims queued tasks and runs their handlers.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::{Duration, Instant},
};

use rustc_hash::FxHashMap;
use tokio::{sync::watch, task::JoinSet, time};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::domain::repair::{
    errors::TaskError,
    handler::TaskHandler,
    observer::{NoopObserver, RepairObserver, TaskOutcome},
    tasks::{ClaimedTask, TaskBroker, TaskQueueError},
};

/// Longest delay between retries.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy)]
pub struct TaskServerSettings {
    /// Number of workers claiming tasks in parallel.
    pub concurrency: usize,

    /// Idle wait when the queue is empty.
    pub poll_interval: Duration,

    /// Per-task execution limit.
    pub task_timeout: Duration,

    /// Extra time a claim is held past `task_timeout`, covering the settle write.
    pub lease_margin: Duration,

    pub purge_interval: Duration,
}

impl TaskServerSettings {
    /// How long a claimed task stays invisible to other workers.
    pub fn lease(&self) -> Duration {
        self.task_timeout + self.lease_margin
    }
}

impl Default for TaskServerSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval: Duration::from_secs(1),
            task_timeout: Duration::from_secs(30),
            lease_margin: Duration::from_secs(10),
            purge_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Backoff before the next run, `2^attempts` seconds capped at
/// [`MAX_RETRY_DELAY`].
pub fn retry_delay(attempts: u32) -> Duration {
    let exponent = attempts.min(10);

    Duration::from_secs(1_u64 << exponent).min(MAX_RETRY_DELAY)
}

#[derive(Clone)]
pub struct TaskServer {
    broker: Arc<dyn TaskBroker>,
    handlers: Arc<FxHashMap<String, Arc<dyn TaskHandler>>>,
    observer: Arc<dyn RepairObserver>,
    settings: TaskServerSettings,
}

impl Debug for TaskServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TaskServer")
            .field("task_types", &self.task_types())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TaskServer {
    pub fn new(broker: Arc<dyn TaskBroker>, settings: TaskServerSettings) -> Self {
        Self {
            broker,
            handlers: Arc::new(FxHashMap::default()),
            observer: Arc::new(NoopObserver),
            settings,
        }
    }

    /// Route tasks of `task_type` to `handler`.
    #[must_use]
    pub fn register(mut self, task_type: &str, handler: Arc<dyn TaskHandler>) -> Self {
        Arc::make_mut(&mut self.handlers).insert(task_type.to_string(), handler);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RepairObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn task_types(&self) -> Vec<String> {
        let mut task_types: Vec<String> = self.handlers.keys().cloned().collect();

        task_types.sort_unstable();
        task_types
    }

    /// Run workers and the purge loop until `shutdown` flips to `true`.
    ///
    /// Workers finish the task they are running before exiting.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut workers = JoinSet::new();

        for worker in 0..self.settings.concurrency.max(1) {
            let server = self.clone();
            let shutdown = shutdown.clone();

            workers.spawn(async move { server.work(worker, shutdown).await });
        }

        let server = self.clone();

        workers.spawn(async move { server.purge(shutdown).await });

        info!(
            concurrency = self.settings.concurrency,
            task_types = ?self.task_types(),
            "task server started"
        );

        while let Some(joined) = workers.join_next().await {
            if let Err(error) = joined {
                error!("task server worker panicked: {error}");
            }
        }

        info!("task server stopped");
    }

    async fn work(&self, worker: usize, mut shutdown: watch::Receiver<bool>) {
        debug!(worker, "task worker started");

        while !*shutdown.borrow() {
            let processed = match self.process_next().await {
                Ok(processed) => processed,
                Err(error) => {
                    warn!(worker, "failed to process task: {error}");
                    false
                }
            };

            if processed {
                continue;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = time::sleep(self.settings.poll_interval) => {}
            }
        }

        debug!(worker, "task worker stopped");
    }

    async fn purge(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.settings.purge_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    match self.broker.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => info!(purged, "purged expired tasks"),
                        Err(error) => warn!("failed to purge expired tasks: {error}"),
                    }
                }
            }
        }
    }

    /// Claim and run one task. Returns `false` when nothing was runnable.
    ///
    /// # Errors
    ///
    /// Returns an error when the broker cannot be reached.
    pub async fn process_next(&self) -> Result<bool, TaskQueueError> {
        let Some(task) = self
            .broker
            .claim(&self.task_types(), self.settings.lease())
            .await?
        else {
            return Ok(false);
        };

        let span = info_span!(
            "repair_task",
            task = %task.uuid,
            task_type = %task.task_type,
            attempts = task.attempts
        );

        let started = Instant::now();

        let settled = async {
            let result = self.execute(&task).await;

            self.settle(&task, result).await
        }
        .instrument(span)
        .await;

        let outcome = match settled {
            Ok(outcome) => outcome,
            Err(TaskQueueError::LeaseLost(uuid)) => {
                warn!(
                    task = %uuid,
                    task_type = %task.task_type,
                    attempts = task.attempts,
                    "lease lost before settling, leaving task to its new owner"
                );

                return Ok(true);
            }
            Err(error) => return Err(error),
        };

        self.observer
            .task_finished(&task.task_type, outcome, started.elapsed());

        Ok(true)
    }

    async fn execute(&self, task: &ClaimedTask) -> Result<(), TaskError> {
        let Some(handler) = self.handlers.get(&task.task_type) else {
            return Err(TaskError::UnknownTaskType(task.task_type.clone()));
        };

        time::timeout(self.settings.task_timeout, handler.handle(&task.payload))
            .await
            .map_err(|_elapsed| TaskError::Timeout)?
    }

    async fn settle(
        &self,
        task: &ClaimedTask,
        result: Result<(), TaskError>,
    ) -> Result<TaskOutcome, TaskQueueError> {
        let error = match result {
            Ok(()) => {
                self.broker.complete(task.lease()).await?;

                debug!(task = %task.uuid, task_type = %task.task_type, "task done");

                return Ok(TaskOutcome::Done);
            }
            Err(error) => error,
        };

        let message = error.to_string();

        if !error.is_retryable() {
            warn!(task = %task.uuid, task_type = %task.task_type, "skipping task: {message}");

            self.broker.abandon(task.lease(), &message).await?;

            return Ok(TaskOutcome::Skipped);
        }

        if task.retries_exhausted() {
            error!(
                task = %task.uuid,
                task_type = %task.task_type,
                attempts = task.attempts,
                "abandoning task after retries: {message}"
            );

            self.broker.abandon(task.lease(), &message).await?;

            return Ok(TaskOutcome::Abandoned);
        }

        let delay = retry_delay(task.attempts);

        warn!(
            task = %task.uuid,
            task_type = %task.task_type,
            attempts = task.attempts,
            delay_secs = delay.as_secs(),
            "retrying task: {message}"
        );

        self.broker
            .schedule_retry(task.lease(), delay, &message)
            .await?;

        Ok(TaskOutcome::RetryScheduled)
    }
}
