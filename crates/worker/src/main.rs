//! Product repair worker
//!
//! Consumes object-deletion events, queues thumbnail repairs and runs them,
//! exposing `/healthcheck` and `/metrics` alongside.

use std::{process, sync::Arc};

use product_service_app::{
    context::AppContext,
    repair::{
        RepairEventConsumer, TaskServer,
        events::JetStreamEvents,
        handler::UpdateThumbnailHandler,
        observer::RepairObserver,
        tasks::UPDATE_THUMBNAIL_TASK,
    },
};
use salvo::{affix_state::inject, prelude::*};
use tokio::sync::watch;
use tracing::{error, info};

use crate::{
    config::WorkerConfig,
    healthcheck::PipelineHealth,
    observability::{Observability, PrometheusObserver},
};

mod config;
mod healthcheck;
mod observability;
mod shutdown;

#[tokio::main]
pub async fn main() {
    let config = WorkerConfig::load().unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized yet, must use eprintln for config errors"
        )]
        {
            eprintln!("Configuration error: {e}");
        }

        process::exit(1);
    });

    let observability = Observability::init(&config).unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialize, must use eprintln"
        )]
        {
            eprintln!("Observability error: {e}");
        }

        process::exit(1);
    });

    let app = match AppContext::from_settings(config.app.app_settings()).await {
        Ok(app) => app,
        Err(init_error) => {
            error!("failed to initialize app context: {init_error}");

            process::exit(1);
        }
    };

    let subscription = match JetStreamEvents::connect(config.stream.stream_settings()).await {
        Ok(events) => match events.subscribe().await {
            Ok(subscription) => subscription,
            Err(stream_error) => {
                error!("failed to subscribe to event stream: {stream_error}");

                process::exit(1);
            }
        },
        Err(stream_error) => {
            error!("failed to connect to event stream: {stream_error}");

            process::exit(1);
        }
    };

    let observer: Arc<dyn RepairObserver> = Arc::new(PrometheusObserver);

    let consumer = RepairEventConsumer::new(
        app.tasks.clone(),
        config.app.default_thumbnail(),
        config.queue.retry_policy(),
    )
    .with_observer(Arc::clone(&observer));

    let task_server = TaskServer::new(app.tasks.clone(), config.queue.server_settings())
        .register(
            UPDATE_THUMBNAIL_TASK,
            Arc::new(UpdateThumbnailHandler::new(Arc::clone(&app.store))),
        )
        .with_observer(observer);

    let (pipeline_tx, pipeline_rx) = watch::channel(false);
    let health = PipelineHealth::default();

    let consuming = tokio::spawn({
        let shutdown = pipeline_rx.clone();
        let running = health.consumer_running();

        async move {
            let _running = running;

            consumer.run(Box::new(subscription), shutdown).await;
        }
    });

    let processing = tokio::spawn({
        let running = health.task_server_running();

        async move {
            let _running = running;

            task_server.run(pipeline_rx).await;
        }
    });

    let router = Router::new()
        .hoop(CatchPanic::new())
        .hoop(inject(health))
        .push(Router::with_path("healthcheck").get(healthcheck::handler))
        .push(Router::with_path("metrics").get(observability::metrics_handler));

    let addr = config.socket_addr();

    info!("Starting worker endpoints on {addr}");

    let listener = TcpListener::new(addr).bind().await;

    let server = Server::new(listener);

    let handle = server.handle();

    tokio::spawn(async move {
        if let Err(error) = shutdown::listen(pipeline_tx, handle).await {
            error!("failed to listen for shutdown signal: {error}");
        }
    });

    server.serve(router).await;

    for (name, joined) in [("consumer", consuming.await), ("task server", processing.await)] {
        if let Err(error) = joined {
            error!("{name} stopped abnormally: {error}");
        }
    }

    info!("worker stopped");

    observability.shutdown();
}
