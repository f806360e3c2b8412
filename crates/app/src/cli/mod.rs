use clap::{Parser, Subcommand};

mod db;
mod search;
mod stream;
mod tasks;

#[derive(Debug, Parser)]
#[command(name = "product-service", about = "Product service administration", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate(db::MigrateArgs),

    /// Create the product search index
    InitIndex(search::InitIndexArgs),

    /// Create the domain event stream
    EnsureStream(stream::EnsureStreamArgs),

    /// Delete finished tasks past their retention
    PurgeTasks(tasks::PurgeTasksArgs),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Migrate(args) => db::migrate(args).await,
            Commands::InitIndex(args) => search::init_index(args).await,
            Commands::EnsureStream(args) => stream::ensure_stream(args).await,
            Commands::PurgeTasks(args) => tasks::purge(args).await,
        }
    }
}
