//! Subscriber setup and telemetry lifecycle.

use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace::SdkTracerProvider};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{
    WorkerConfig,
    observability::{LogFormat, LoggingConfig},
};

use super::otel;

#[derive(Debug, Error)]
pub(crate) enum ObservabilityError {
    #[error("failed to build OTLP exporter: {0}")]
    OtlpExporter(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("failed to install tracing subscriber: {0}")]
    TracingSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the tracer provider alive so buffered spans can be flushed on exit.
#[derive(Debug)]
pub(crate) struct Observability {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Observability {
    pub(crate) fn init(config: &WorkerConfig) -> Result<Self, ObservabilityError> {
        let tracer_provider = config
            .observability
            .otel_enabled
            .then(|| otel::tracer_provider(config))
            .transpose()?;

        if tracer_provider.is_some() {
            global::set_text_map_propagator(TraceContextPropagator::new());
        }

        let otel_layer = tracer_provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(otel::TRACER_NAME))
        });

        tracing_subscriber::registry()
            .with(fmt_layer(&config.logging))
            .with(otel_layer)
            .with(env_filter(&config.logging))
            .try_init()?;

        info!(
            format = ?config.logging.log_format,
            otel = tracer_provider.is_some(),
            "logging initialised"
        );

        Ok(Self { tracer_provider })
    }

    /// Flush spans still buffered by the batch exporter.
    pub(crate) fn shutdown(self) {
        let Some(provider) = self.tracer_provider else {
            return;
        };

        if let Err(source) = provider.shutdown() {
            error!("failed to flush repair traces: {source}");
        }
    }
}

fn fmt_layer(logging: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if logging.log_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(span_events);

    match logging.log_format {
        LogFormat::Compact => layer
            .compact()
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    }
}

fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_unset| EnvFilter::new(logging.default_directives()))
}
