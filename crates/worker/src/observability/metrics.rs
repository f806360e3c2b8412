//! Prometheus metrics for the repair pipeline and their exposition endpoint.

use std::{sync::OnceLock, time::Duration};

use product_service_app::repair::observer::{RepairObserver, TaskOutcome};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use salvo::{
    Request, Response, handler,
    http::{
        StatusCode,
        header::{CONTENT_TYPE, HeaderValue},
    },
};
use tracing::error;

#[derive(Debug)]
struct RepairMetrics {
    registry: Registry,
    events_received_total: IntCounterVec,
    tasks_enqueued_total: IntCounterVec,
    tasks_finished_total: IntCounterVec,
    task_duration_seconds: HistogramVec,
}

static REPAIR_METRICS: OnceLock<Option<RepairMetrics>> = OnceLock::new();

/// Records pipeline notifications in the process-wide registry.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PrometheusObserver;

impl RepairObserver for PrometheusObserver {
    fn event_received(&self, subject: &str) {
        if let Some(metrics) = metrics() {
            metrics
                .events_received_total
                .with_label_values(&[subject])
                .inc();
        }
    }

    fn task_enqueued(&self, task_type: &str) {
        if let Some(metrics) = metrics() {
            metrics
                .tasks_enqueued_total
                .with_label_values(&[task_type])
                .inc();
        }
    }

    fn task_finished(&self, task_type: &str, outcome: TaskOutcome, elapsed: Duration) {
        let Some(metrics) = metrics() else {
            return;
        };

        metrics
            .tasks_finished_total
            .with_label_values(&[task_type, outcome.as_str()])
            .inc();

        metrics
            .task_duration_seconds
            .with_label_values(&[task_type])
            .observe(elapsed.as_secs_f64());
    }
}

#[handler]
pub(crate) async fn metrics_handler(_req: &mut Request, res: &mut Response) {
    let Some(metrics) = metrics() else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();

    let mut encoded = Vec::new();

    if let Err(source) = encoder.encode(&metric_families, &mut encoded) {
        error!("failed to encode metrics response: {source}");
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);

        return;
    }

    let content_type = match HeaderValue::from_str(encoder.format_type()) {
        Ok(value) => value,
        Err(source) => {
            error!("failed to encode metrics content type header: {source}");
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);

            return;
        }
    };

    res.headers_mut().insert(CONTENT_TYPE, content_type);
    res.render(String::from_utf8_lossy(&encoded).into_owned());
}

fn metrics() -> Option<&'static RepairMetrics> {
    REPAIR_METRICS.get_or_init(build_metrics).as_ref()
}

fn counter(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(metric) => Some(metric),
        Err(source) => {
            error!("failed to create {name} metric: {source}");
            None
        }
    }
}

fn build_metrics() -> Option<RepairMetrics> {
    let registry = Registry::new();

    let events_received_total = counter(
        "product_repair_events_received_total",
        "Stream messages received, partitioned by subject.",
        &["subject"],
    )?;

    let tasks_enqueued_total = counter(
        "product_repair_tasks_enqueued_total",
        "Repair tasks enqueued, partitioned by task type.",
        &["task_type"],
    )?;

    let tasks_finished_total = counter(
        "product_repair_tasks_finished_total",
        "Repair task executions, partitioned by task type and outcome.",
        &["task_type", "outcome"],
    )?;

    let task_duration_seconds = match HistogramVec::new(
        HistogramOpts::new(
            "product_repair_task_duration_seconds",
            "Repair task execution time in seconds, partitioned by task type.",
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["task_type"],
    ) {
        Ok(metric) => metric,
        Err(source) => {
            error!("failed to create task_duration metric: {source}");
            return None;
        }
    };

    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(events_received_total.clone()),
        Box::new(tasks_enqueued_total.clone()),
        Box::new(tasks_finished_total.clone()),
        Box::new(task_duration_seconds.clone()),
    ];

    for collector in collectors {
        if let Err(source) = registry.register(collector) {
            error!("failed to register repair metric: {source}");
            return None;
        }
    }

    Some(RepairMetrics {
        registry,
        events_received_total,
        tasks_enqueued_total,
        tasks_finished_total,
        task_duration_seconds,
    })
}
