//! Repair pipeline liveness

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

/// Which pipeline loops are still running.
#[derive(Debug, Clone, Default)]
pub(crate) struct PipelineHealth {
    consumer: Arc<AtomicBool>,
    task_server: Arc<AtomicBool>,
}

/// Marks a loop as running until dropped.
#[derive(Debug)]
pub(crate) struct Running(Arc<AtomicBool>);

impl Drop for Running {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn running(flag: &Arc<AtomicBool>) -> Running {
    flag.store(true, Ordering::Release);

    Running(Arc::clone(flag))
}

impl PipelineHealth {
    pub(crate) fn consumer_running(&self) -> Running {
        running(&self.consumer)
    }

    pub(crate) fn task_server_running(&self) -> Running {
        running(&self.task_server)
    }

    fn report(&self) -> HealthResponse {
        let consumer = self.consumer.load(Ordering::Acquire);
        let task_server = self.task_server.load(Ordering::Acquire);

        HealthResponse {
            status: if consumer && task_server { "ok" } else { "degraded" }.to_string(),
            consumer,
            task_server,
        }
    }
}

/// Healthcheck response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` while both loops run, `degraded` otherwise
    pub status: String,

    pub consumer: bool,

    pub task_server: bool,
}

/// Reports consumer and task server liveness; 503 once either has stopped.
#[endpoint(tags("health"), summary = "Repair pipeline liveness")]
pub(crate) async fn handler(
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<HealthResponse>, StatusError> {
    let health = depot
        .obtain::<PipelineHealth>()
        .map_err(|_missing| StatusError::internal_server_error())?;

    let report = health.report();

    if report.status != "ok" {
        res.status_code(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use salvo::{
        affix_state::inject,
        test::{ResponseExt, TestClient},
    };
    use testresult::TestResult;

    use super::*;

    fn service(health: PipelineHealth) -> Service {
        Service::new(
            Router::new()
                .hoop(inject(health))
                .push(Router::with_path("healthcheck").get(handler)),
        )
    }

    #[tokio::test]
    async fn reports_ok_while_both_loops_run() -> TestResult {
        let health = PipelineHealth::default();
        let _consumer = health.consumer_running();
        let _task_server = health.task_server_running();

        let mut response = TestClient::get("http://example.com/healthcheck")
            .send(&service(health.clone()))
            .await;

        assert_eq!(response.status_code, Some(StatusCode::OK));

        let body: HealthResponse = response.take_json().await?;

        assert_eq!(body.status, "ok");

        Ok(())
    }

    #[tokio::test]
    async fn stopped_consumer_degrades_health() -> TestResult {
        let health = PipelineHealth::default();
        let consumer = health.consumer_running();
        let _task_server = health.task_server_running();

        drop(consumer);

        let mut response = TestClient::get("http://example.com/healthcheck")
            .send(&service(health.clone()))
            .await;

        assert_eq!(response.status_code, Some(StatusCode::SERVICE_UNAVAILABLE));

        let body: HealthResponse = response.take_json().await?;

        assert_eq!(body.status, "degraded");
        assert!(!body.consumer, "consumer should be reported stopped");
        assert!(body.task_server, "task server should still run");

        Ok(())
    }
}
