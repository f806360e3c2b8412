//! Turns stream events into repair tasks.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    products::models::ObjectId,
    repair::{
        errors::ConsumeError,
        events::{DomainEvent, EventSubscription, StreamMessage},
        observer::{NoopObserver, RepairObserver},
        tasks::{RepairTask, RetryPolicy, TaskQueue},
    },
};

/// Consumes domain events and enqueues a repair task per deleted object.
#[derive(Clone)]
pub struct RepairEventConsumer {
    queue: Arc<dyn TaskQueue>,
    default_thumbnail: ObjectId,
    policy: RetryPolicy,
    observer: Arc<dyn RepairObserver>,
}

impl Debug for RepairEventConsumer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RepairEventConsumer")
            .field("default_thumbnail", &self.default_thumbnail)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RepairEventConsumer {
    pub fn new(queue: Arc<dyn TaskQueue>, default_thumbnail: ObjectId, policy: RetryPolicy) -> Self {
        Self {
            queue,
            default_thumbnail,
            policy,
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RepairObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Consume `subscription` until it ends or `shutdown` flips to `true`.
    pub async fn run(
        &self,
        mut subscription: Box<dyn EventSubscription>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("repair event consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    continue;
                }
                next = subscription.next_message() => next,
            };

            match next {
                Some(Ok(message)) => {
                    if let Err(error) = self.handle_message(message.as_ref()).await {
                        warn!(subject = message.subject(), "failed to handle event: {error}");
                    }
                }
                Some(Err(error)) => warn!("failed to receive event: {error}"),
                None => {
                    info!("event subscription closed");
                    break;
                }
            }
        }

        info!("repair event consumer stopped");
    }

    /// Handle one message, returning the enqueued task if any.
    ///
    /// The message is acknowledged before the task is enqueued, so a crash in
    /// between loses the repair.
    ///
    /// # Errors
    ///
    /// Returns an error when acknowledging, decoding or enqueueing fails.
    #[instrument(name = "repair_event", skip_all, fields(subject = message.subject()))]
    pub async fn handle_message(
        &self,
        message: &dyn StreamMessage,
    ) -> Result<Option<Uuid>, ConsumeError> {
        self.observer.event_received(message.subject());

        message.ack().await?;

        let Some(event) = DomainEvent::decode(message.subject(), message.payload())? else {
            warn!(subject = message.subject(), "ignoring event with unknown subject");

            return Ok(None);
        };

        match event {
            DomainEvent::ObjectDeleted { object } => {
                let task = RepairTask {
                    old_thumbnail: object,
                    new_thumbnail: self.default_thumbnail.clone(),
                }
                .to_new_task(self.policy)?;

                let task_type = task.task_type.clone();
                let uuid = self.queue.enqueue(task).await?;

                self.observer.task_enqueued(&task_type);

                info!(task = %uuid, %task_type, "enqueued repair task");

                Ok(Some(uuid))
            }
        }
    }
}
