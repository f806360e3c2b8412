//! Product read-through cache.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    time::Duration,
};

use async_trait::async_trait;
use mockall::automock;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use thiserror::Error;

use crate::domain::products::models::{Product, ProductUuid};

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Product),
    /// The product is known not to exist.
    NegativeHit,
    Miss,
}

/// Key-value cache of products by UUID. Absent products are cached as `None`.
#[automock]
#[async_trait]
pub trait ProductCache: Send + Sync {
    async fn get(&self, product: ProductUuid) -> Result<CacheLookup, CacheError>;

    async fn put(&self, product: ProductUuid, entry: Option<Product>) -> Result<(), CacheError>;

    async fn invalidate(&self, products: &[ProductUuid]) -> Result<(), CacheError>;
}

pub fn cache_key(product: ProductUuid) -> String {
    format!("products:id:{product}")
}

/// Redis-backed product cache storing JSON values with a TTL.
#[derive(Clone)]
pub struct RedisProductCache {
    connection: ConnectionManager,
    ttl: Duration,
}

impl Debug for RedisProductCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RedisProductCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RedisProductCache {
    /// Connect to Redis at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection, ttl })
    }
}

#[async_trait]
impl ProductCache for RedisProductCache {
    async fn get(&self, product: ProductUuid) -> Result<CacheLookup, CacheError> {
        let mut connection = self.connection.clone();

        let cached: Option<String> = connection.get(cache_key(product)).await?;

        let Some(raw) = cached else {
            return Ok(CacheLookup::Miss);
        };

        Ok(match serde_json::from_str::<Option<Product>>(&raw)? {
            Some(product) => CacheLookup::Hit(product),
            None => CacheLookup::NegativeHit,
        })
    }

    async fn put(&self, product: ProductUuid, entry: Option<Product>) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();

        let raw = serde_json::to_string(&entry)?;

        connection
            .set_ex::<_, _, ()>(cache_key(product), raw, self.ttl.as_secs())
            .await?;

        Ok(())
    }

    async fn invalidate(&self, products: &[ProductUuid]) -> Result<(), CacheError> {
        if products.is_empty() {
            return Ok(());
        }

        let mut connection = self.connection.clone();

        let keys: Vec<String> = products.iter().copied().map(cache_key).collect();

        connection.del::<_, ()>(keys).await?;

        Ok(())
    }
}

/// Cache used when caching is turned off; every lookup misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProductCache;

#[async_trait]
impl ProductCache for DisabledProductCache {
    async fn get(&self, _product: ProductUuid) -> Result<CacheLookup, CacheError> {
        Ok(CacheLookup::Miss)
    }

    async fn put(&self, _product: ProductUuid, _entry: Option<Product>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate(&self, _products: &[ProductUuid]) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error")]
    Redis(#[from] redis::RedisError),

    #[error("cache entry encoding error")]
    Encoding(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn cache_key_is_namespaced_by_uuid() {
        let uuid = ProductUuid::new();

        assert_eq!(cache_key(uuid), format!("products:id:{uuid}"));
    }

    #[test]
    fn absent_entry_encodes_as_null() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&None::<Product>)?, "null");

        Ok(())
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() -> TestResult {
        let cache = DisabledProductCache;
        let uuid = ProductUuid::new();

        cache.put(uuid, None).await?;

        assert_eq!(cache.get(uuid).await?, CacheLookup::Miss);

        Ok(())
    }
}
