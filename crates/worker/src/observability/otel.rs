//! OTLP export of repair pipeline traces.

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};

use crate::config::WorkerConfig;

use super::ObservabilityError;

pub(super) const TRACER_NAME: &str = "product-repair";

/// Service identity plus the stream and durable consumer this worker drains.
fn resource(config: &WorkerConfig) -> Resource {
    Resource::builder_empty()
        .with_service_name(config.observability.otel_service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new(
                "deployment.environment.name",
                config.observability.deployment_environment.clone(),
            ),
            KeyValue::new("messaging.system", "nats"),
            KeyValue::new("messaging.destination.name", config.stream.nats_stream.clone()),
            KeyValue::new(
                "messaging.consumer.group.name",
                config.stream.nats_durable_name.clone(),
            ),
        ])
        .build()
}

pub(super) fn tracer_provider(
    config: &WorkerConfig,
) -> Result<SdkTracerProvider, ObservabilityError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.observability.otel_endpoint.clone())
        .with_timeout(Duration::from_secs(config.observability.otel_timeout_seconds))
        .build()?;

    let ratio = config.observability.otel_sample_ratio.clamp(0.0, 1.0);

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            ratio,
        ))))
        .with_resource(resource(config))
        .with_batch_exporter(exporter)
        .build())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use opentelemetry::{Key, Value};
    use testresult::TestResult;

    use super::*;
    use crate::config::TEST_ARGS;

    #[test]
    fn resource_names_stream_and_durable_consumer() -> TestResult {
        let config = WorkerConfig::try_parse_from(
            TEST_ARGS
                .into_iter()
                .chain(["--nats-stream", "CATALOG", "--otel-service-name", "repairs"]),
        )?;

        let resource = resource(&config);

        assert_eq!(
            resource.get(&Key::new("service.name")),
            Some(Value::from("repairs"))
        );
        assert_eq!(
            resource.get(&Key::new("messaging.destination.name")),
            Some(Value::from("CATALOG"))
        );
        assert_eq!(
            resource.get(&Key::new("messaging.consumer.group.name")),
            Some(Value::from("product-repair"))
        );

        Ok(())
    }
}
