//! Event Stream Config

use std::time::Duration;

use clap::Args;
use product_service_app::repair::events::{StreamSettings, THUMBNAIL_DELETED_SUBJECT};

/// JetStream stream and durable consumer settings.
#[derive(Debug, Args)]
pub struct StreamConfig {
    /// NATS server address
    #[arg(long, env = "NATS_URL", default_value = "nats://localhost:4222")]
    pub nats_url: String,

    #[arg(long, env = "NATS_STREAM", default_value = "PRODUCT")]
    pub nats_stream: String,

    /// Subjects captured by the stream
    #[arg(long, env = "NATS_SUBJECTS", value_delimiter = ',', default_value = "product.>")]
    pub nats_subjects: Vec<String>,

    /// Durable consumer shared by every worker
    #[arg(long, env = "NATS_DURABLE_NAME", default_value = "product-repair")]
    pub nats_durable_name: String,

    /// Message retention in hours
    #[arg(long, env = "NATS_MAX_AGE_HOURS", default_value_t = 72)]
    pub nats_max_age_hours: u64,
}

impl StreamConfig {
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            url: self.nats_url.clone(),
            stream_name: self.nats_stream.clone(),
            subjects: self.nats_subjects.clone(),
            durable_name: self.nats_durable_name.clone(),
            filter_subject: THUMBNAIL_DELETED_SUBJECT.to_string(),
            max_age: Duration::from_secs(self.nats_max_age_hours * 60 * 60),
        }
    }
}
