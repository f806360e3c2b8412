//! Logging & Trace Export Config

use clap::Args;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Log output for the worker and the product crates it drives.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Level for the product crates; dependencies stay at `warn`
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Log every closed repair task span with its busy and idle time
    #[arg(long, env = "LOG_SPAN_CLOSE", default_value_t = false)]
    pub log_span_close: bool,
}

impl LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> String {
        let level = &self.log_level;

        format!("warn,product_service_app={level},product_service_worker={level}")
    }
}

/// OTLP export of repair task traces.
#[derive(Debug, Args)]
pub struct ObservabilityConfig {
    #[arg(long, env = "OTEL_ENABLED", default_value_t = false)]
    pub otel_enabled: bool,

    /// OTLP gRPC collector
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = "http://localhost:4317")]
    pub otel_endpoint: String,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_TIMEOUT_SECONDS", default_value_t = 3)]
    pub otel_timeout_seconds: u64,

    /// Reported as `service.name`
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "product-repair-worker")]
    pub otel_service_name: String,

    #[arg(long, env = "DEPLOYMENT_ENVIRONMENT", default_value = "development")]
    pub deployment_environment: String,

    /// Share of repair traces kept, in [0.0, 1.0]
    #[arg(long, env = "OTEL_TRACE_SAMPLE_RATIO", default_value_t = 1.0)]
    pub otel_sample_ratio: f64,
}
