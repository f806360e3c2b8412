//! Logging, repair traces and repair metrics.

mod init;
mod metrics;
mod otel;

pub(crate) use init::{Observability, ObservabilityError};
pub(crate) use metrics::{PrometheusObserver, metrics_handler};
