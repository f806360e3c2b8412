use clap::Args;
use product_service_app::{
    database::{self, Db},
    repair::{queue::PgTaskQueue, tasks::TaskBroker},
};
use tracing::info;

#[derive(Debug, Args)]
pub(crate) struct PurgeTasksArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn purge(args: PurgeTasksArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let purged = PgTaskQueue::new(Db::new(pool))
        .purge_expired()
        .await
        .map_err(|error| format!("failed to purge tasks: {error}"))?;

    info!(purged, "purged expired tasks");

    Ok(())
}
