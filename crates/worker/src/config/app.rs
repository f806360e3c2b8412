//! Products Stack Config

use std::time::Duration;

use clap::Args;
use product_service_app::{
    clients::{authority::AuthorityConfig, storage::StorageConfig},
    context::{AppSettings, CacheSettings},
    products::{
        ProductsSettings, models::ObjectId, pagination::PaginationLimits,
        search::OpenSearchConfig,
    },
};

/// Database, cache, search and collaborator settings.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Redis URL for the product cache; caching is off when unset
    #[arg(long, env = "REDIS_CACHE_URL", hide_env_values = true)]
    pub redis_cache_url: Option<String>,

    /// Cached product lifetime in seconds
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 300)]
    pub cache_ttl_seconds: u64,

    /// `OpenSearch` address
    #[arg(long, env = "OPENSEARCH_URL", default_value = "http://localhost:9200")]
    pub opensearch_url: String,

    /// Index holding product documents
    #[arg(long, env = "OPENSEARCH_INDEX", default_value = "products")]
    pub opensearch_index: String,

    #[arg(long, env = "OPENSEARCH_USERNAME", default_value = "")]
    pub opensearch_username: String,

    #[arg(long, env = "OPENSEARCH_PASSWORD", default_value = "", hide_env_values = true)]
    pub opensearch_password: String,

    /// Skip TLS certificate verification for `OpenSearch`
    #[arg(long, env = "OPENSEARCH_INSECURE", default_value_t = false)]
    pub opensearch_insecure: bool,

    /// Authority service address
    #[arg(long, env = "AUTHORITY_URL")]
    pub authority_url: String,

    /// Storage service address
    #[arg(long, env = "STORAGE_URL")]
    pub storage_url: String,

    /// Timeout for collaborator calls in seconds
    #[arg(long, env = "CLIENT_TIMEOUT_SECONDS", default_value_t = 5)]
    pub client_timeout_seconds: u64,

    #[arg(long, env = "PAGINATION_DEFAULT_LIMIT", default_value_t = 10)]
    pub pagination_default_limit: u32,

    #[arg(long, env = "PAGINATION_MAX_LIMIT", default_value_t = 20)]
    pub pagination_max_limit: u32,

    /// Concurrent lookups per batch read
    #[arg(long, env = "BATCH_FETCH_CONCURRENCY", default_value_t = 10)]
    pub batch_fetch_concurrency: usize,

    /// Thumbnail assigned when a product's thumbnail is deleted
    #[arg(long, env = "DEFAULT_THUMBNAIL_ID")]
    pub default_thumbnail_id: String,
}

impl AppConfig {
    pub fn default_thumbnail(&self) -> ObjectId {
        ObjectId::new(self.default_thumbnail_id.clone())
    }

    /// Settings handed to the app crate.
    pub fn app_settings(&self) -> AppSettings {
        let timeout = Duration::from_secs(self.client_timeout_seconds);

        AppSettings {
            database_url: self.database_url.clone(),
            cache: CacheSettings {
                url: self
                    .redis_cache_url
                    .clone()
                    .filter(|url| !url.trim().is_empty()),
                ttl: Duration::from_secs(self.cache_ttl_seconds),
            },
            search: OpenSearchConfig {
                addr: self.opensearch_url.clone(),
                index: self.opensearch_index.clone(),
                username: self.opensearch_username.clone(),
                password: self.opensearch_password.clone(),
                insecure: self.opensearch_insecure,
            },
            authority: AuthorityConfig {
                addr: self.authority_url.clone(),
                timeout,
            },
            storage: StorageConfig {
                addr: self.storage_url.clone(),
                timeout,
            },
            products: ProductsSettings {
                pagination: PaginationLimits {
                    default_limit: self.pagination_default_limit,
                    max_limit: self.pagination_max_limit,
                },
                batch_concurrency: self.batch_fetch_concurrency,
                default_thumbnail: self.default_thumbnail(),
            },
        }
    }
}
