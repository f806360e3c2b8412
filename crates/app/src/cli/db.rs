use clap::Args;
use product_service_app::database::{self, Db};
use tracing::info;

#[derive(Debug, Args)]
pub(crate) struct MigrateArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn migrate(args: MigrateArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    Db::new(pool)
        .migrate()
        .await
        .map_err(|error| format!("failed to apply migrations: {error}"))?;

    info!("database migrated");

    Ok(())
}
