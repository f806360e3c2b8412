//! Domain events and the durable stream they arrive on.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::Duration,
};

use async_nats::jetstream::{
    self, Context, Message,
    consumer::{AckPolicy, PullConsumer, pull},
    stream::{self, StorageType},
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::products::models::ObjectId;

/// Subject a storage service publishes on when an object is deleted.
pub const THUMBNAIL_DELETED_SUBJECT: &str = "product.thumbnail.deleted";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Event relevant to product consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A referenced object no longer exists.
    ObjectDeleted { object: ObjectId },
}

/// Wire payload of an object-deleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDeletedPayload {
    #[serde(rename = "objectID")]
    pub object_id: ObjectId,
}

impl DomainEvent {
    /// Decode a message by subject. Unknown subjects yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when a known subject carries a malformed payload.
    pub fn decode(subject: &str, payload: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        match subject {
            THUMBNAIL_DELETED_SUBJECT => {
                let payload: ObjectDeletedPayload = serde_json::from_slice(payload)?;

                Ok(Some(Self::ObjectDeleted {
                    object: payload.object_id,
                }))
            }
            _ => Ok(None),
        }
    }
}

/// A message received from the durable stream.
#[async_trait]
pub trait StreamMessage: Send + Sync {
    fn subject(&self) -> &str;

    fn payload(&self) -> &[u8];

    /// Acknowledge the message so it is not redelivered.
    async fn ack(&self) -> Result<(), EventStreamError>;
}

/// A durable subscription yielding messages until the stream ends.
#[async_trait]
pub trait EventSubscription: Send {
    async fn next_message(
        &mut self,
    ) -> Option<Result<Box<dyn StreamMessage>, EventStreamError>>;
}

/// Stream, consumer and connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: String,
    pub stream_name: String,
    pub subjects: Vec<String>,
    pub durable_name: String,
    pub filter_subject: String,
    pub max_age: Duration,
}

/// JetStream-backed event stream.
#[derive(Clone)]
pub struct JetStreamEvents {
    context: Context,
    settings: StreamSettings,
}

impl Debug for JetStreamEvents {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JetStreamEvents")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl JetStreamEvents {
    /// Connect to the NATS server.
    ///
    /// # Errors
    ///
    /// Returns an error when the server cannot be reached.
    pub async fn connect(settings: StreamSettings) -> Result<Self, EventStreamError> {
        let client = async_nats::connect(settings.url.as_str())
            .await
            .map_err(EventStreamError::Connect)?;

        Ok(Self {
            context: jetstream::new(client),
            settings,
        })
    }

    /// Create the stream with file storage and the configured retention, if
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream cannot be created or fetched.
    pub async fn ensure_stream(&self) -> Result<stream::Stream, EventStreamError> {
        let stream = self
            .context
            .get_or_create_stream(stream::Config {
                name: self.settings.stream_name.clone(),
                subjects: self.settings.subjects.clone(),
                storage: StorageType::File,
                max_age: self.settings.max_age,
                ..Default::default()
            })
            .await
            .map_err(|error| EventStreamError::Setup(Box::new(error)))?;

        info!(stream = %self.settings.stream_name, "event stream ready");

        Ok(stream)
    }

    /// Bind the durable consumer and start pulling messages.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream or consumer cannot be set up.
    pub async fn subscribe(&self) -> Result<JetStreamSubscription, EventStreamError> {
        let stream = self.ensure_stream().await?;

        let consumer: PullConsumer = stream
            .get_or_create_consumer(
                &self.settings.durable_name,
                pull::Config {
                    durable_name: Some(self.settings.durable_name.clone()),
                    ack_policy: AckPolicy::Explicit,
                    filter_subject: self.settings.filter_subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|error| EventStreamError::Setup(Box::new(error)))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|error| EventStreamError::Setup(Box::new(error)))?;

        info!(
            consumer = %self.settings.durable_name,
            subject = %self.settings.filter_subject,
            "subscribed to event stream"
        );

        Ok(JetStreamSubscription { messages })
    }
}

pub struct JetStreamSubscription {
    messages: pull::Stream,
}

impl Debug for JetStreamSubscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JetStreamSubscription").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSubscription for JetStreamSubscription {
    async fn next_message(
        &mut self,
    ) -> Option<Result<Box<dyn StreamMessage>, EventStreamError>> {
        let next = self.messages.next().await?;

        Some(
            next.map(|message| Box::new(JetStreamMessage(message)) as Box<dyn StreamMessage>)
                .map_err(|error| EventStreamError::Receive(Box::new(error))),
        )
    }
}

struct JetStreamMessage(Message);

#[async_trait]
impl StreamMessage for JetStreamMessage {
    fn subject(&self) -> &str {
        &self.0.subject
    }

    fn payload(&self) -> &[u8] {
        &self.0.payload
    }

    async fn ack(&self) -> Result<(), EventStreamError> {
        self.0.ack().await.map_err(EventStreamError::Ack)
    }
}

#[derive(Debug, Error)]
pub enum EventStreamError {
    #[error("failed to connect to event stream")]
    Connect(#[source] async_nats::ConnectError),

    #[error("failed to set up event stream: {0}")]
    Setup(#[source] BoxError),

    #[error("failed to receive message: {0}")]
    Receive(#[source] BoxError),

    #[error("failed to acknowledge message: {0}")]
    Ack(#[source] BoxError),
}
