//! Worker configuration module

use std::net::SocketAddr;

use clap::Parser;

use crate::config::{
    app::AppConfig,
    observability::{LoggingConfig, ObservabilityConfig},
    queue::QueueConfig,
    server::StatusListenerConfig,
    stream::StreamConfig,
};

pub(crate) mod app;
pub(crate) mod observability;
pub(crate) mod queue;
pub(crate) mod server;
pub(crate) mod stream;

/// Product repair worker configuration
#[derive(Debug, Parser)]
#[command(name = "product-service-worker", about = "Product repair worker", long_about = None)]
pub struct WorkerConfig {
    /// Health and metrics listener.
    #[command(flatten)]
    pub status: StatusListenerConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Trace export settings.
    #[command(flatten)]
    pub observability: ObservabilityConfig,

    /// Products stack settings.
    #[command(flatten)]
    pub app: AppConfig,

    /// Event stream settings.
    #[command(flatten)]
    pub stream: StreamConfig,

    /// Task queue settings.
    #[command(flatten)]
    pub queue: QueueConfig,
}

impl WorkerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        self.status.socket_addr()
    }
}

#[cfg(test)]
pub(crate) const TEST_ARGS: [&str; 9] = [
    "product-service-worker",
    "--database-url",
    "postgres://localhost/products",
    "--authority-url",
    "http://authority",
    "--storage-url",
    "http://storage",
    "--default-thumbnail-id",
    "default-thumbnail",
];
