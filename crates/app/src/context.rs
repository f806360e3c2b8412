//! App Context

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Duration,
};

use thiserror::Error;
use tracing::info;

use crate::{
    clients::{
        authority::{AuthorityConfig, AuthorityError, HttpAuthorityClient},
        storage::{HttpObjectMetadataClient, ObjectMetadataError, StorageConfig},
    },
    database::{self, Db},
    domain::{
        products::{
            ProductsService, ProductsSettings, ProductsUsecase,
            cache::{CacheError, DisabledProductCache, ProductCache, RedisProductCache},
            repository::PgProductsRepository,
            search::{OpenSearchConfig, OpenSearchIndex, SearchError},
            store::{CachedProductStore, ProductStore},
        },
        repair::queue::PgTaskQueue,
    },
};

/// Redis cache settings. Without a URL every read goes to the database.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub url: Option<String>,
    pub ttl: Duration,
}

/// Everything needed to wire the products stack.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub database_url: String,
    pub cache: CacheSettings,
    pub search: OpenSearchConfig,
    pub authority: AuthorityConfig,
    pub storage: StorageConfig,
    pub products: ProductsSettings,
}

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to connect to cache")]
    Cache(#[source] CacheError),

    #[error("failed to build search client")]
    Search(#[source] SearchError),

    #[error("failed to build authority client")]
    Authority(#[source] AuthorityError),

    #[error("failed to build storage client")]
    Storage(#[source] ObjectMetadataError),
}

#[derive(Clone)]
pub struct AppContext {
    pub products: Arc<dyn ProductsService>,
    pub store: Arc<dyn ProductStore>,
    pub tasks: Arc<PgTaskQueue>,
    pub search: Arc<OpenSearchIndex>,
    pub db: Db,
}

impl Debug for AppContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AppContext")
            .field("search", &self.search)
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build application context from settings.
    ///
    /// # Errors
    ///
    /// Returns an error when a backing service cannot be reached or a client
    /// cannot be constructed.
    pub async fn from_settings(settings: AppSettings) -> Result<Self, AppInitError> {
        let pool = database::connect(&settings.database_url)
            .await
            .map_err(AppInitError::Database)?;

        let db = Db::new(pool);

        let cache: Arc<dyn ProductCache> = if let Some(url) = &settings.cache.url {
            Arc::new(
                RedisProductCache::connect(url, settings.cache.ttl)
                    .await
                    .map_err(AppInitError::Cache)?,
            )
        } else {
            info!("product cache disabled");

            Arc::new(DisabledProductCache)
        };

        let search =
            Arc::new(OpenSearchIndex::new(settings.search).map_err(AppInitError::Search)?);

        let store: Arc<dyn ProductStore> = Arc::new(CachedProductStore::new(
            Arc::new(PgProductsRepository::new(db.clone())),
            cache,
            search.clone(),
        ));

        let authority =
            HttpAuthorityClient::new(settings.authority).map_err(AppInitError::Authority)?;

        let objects =
            HttpObjectMetadataClient::new(settings.storage).map_err(AppInitError::Storage)?;

        let products = ProductsUsecase::new(
            Arc::new(authority),
            Arc::new(objects),
            Arc::clone(&store),
            settings.products,
        );

        Ok(Self {
            products: Arc::new(products),
            store,
            tasks: Arc::new(PgTaskQueue::new(db.clone())),
            search,
            db,
        })
    }
}
