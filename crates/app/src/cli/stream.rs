use std::time::Duration;

use clap::Args;
use product_service_app::repair::events::{
    JetStreamEvents, StreamSettings, THUMBNAIL_DELETED_SUBJECT,
};

#[derive(Debug, Args)]
pub(crate) struct EnsureStreamArgs {
    /// NATS server address
    #[arg(long, env = "NATS_URL", default_value = "nats://localhost:4222")]
    url: String,

    #[arg(long, env = "NATS_STREAM", default_value = "PRODUCT")]
    stream_name: String,

    /// Subjects captured by the stream
    #[arg(long, env = "NATS_SUBJECTS", value_delimiter = ',', default_value = "product.>")]
    subjects: Vec<String>,

    /// Message retention in hours
    #[arg(long, env = "NATS_MAX_AGE_HOURS", default_value_t = 72)]
    max_age_hours: u64,
}

pub(crate) async fn ensure_stream(args: EnsureStreamArgs) -> Result<(), String> {
    let events = JetStreamEvents::connect(StreamSettings {
        url: args.url,
        stream_name: args.stream_name,
        subjects: args.subjects,
        durable_name: String::new(),
        filter_subject: THUMBNAIL_DELETED_SUBJECT.to_string(),
        max_age: Duration::from_secs(args.max_age_hours * 60 * 60),
    })
    .await
    .map_err(|error| format!("failed to connect to NATS: {error}"))?;

    events
        .ensure_stream()
        .await
        .map_err(|error| format!("failed to create stream: {error}"))?;

    Ok(())
}
