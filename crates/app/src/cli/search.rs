use clap::Args;
use product_service_app::products::search::{OpenSearchConfig, OpenSearchIndex};
use tracing::info;

#[derive(Debug, Args)]
pub(crate) struct InitIndexArgs {
    /// OpenSearch address
    #[arg(long, env = "OPENSEARCH_ADDR", default_value = "http://localhost:9200")]
    addr: String,

    /// Index holding product documents
    #[arg(long, env = "OPENSEARCH_INDEX", default_value = "products")]
    index: String,

    #[arg(long, env = "OPENSEARCH_USERNAME", default_value = "")]
    username: String,

    #[arg(long, env = "OPENSEARCH_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Skip TLS certificate verification
    #[arg(long, env = "OPENSEARCH_INSECURE")]
    insecure: bool,
}

pub(crate) async fn init_index(args: InitIndexArgs) -> Result<(), String> {
    let index = OpenSearchIndex::new(OpenSearchConfig {
        addr: args.addr,
        index: args.index.clone(),
        username: args.username,
        password: args.password,
        insecure: args.insecure,
    })
    .map_err(|error| format!("failed to build search client: {error}"))?;

    let created = index
        .create_index()
        .await
        .map_err(|error| format!("failed to create index: {error}"))?;

    if created {
        info!(index = %args.index, "created search index");
    } else {
        info!(index = %args.index, "search index already exists");
    }

    Ok(())
}
