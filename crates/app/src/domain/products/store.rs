//! Product Store

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, info, warn};

use crate::domain::products::{
    cache::{CacheLookup, ProductCache},
    data::NewProductRecord,
    errors::ProductsServiceError,
    models::{ObjectId, Product, ProductUuid},
    pagination::{IdPage, OwnerScope, PaginationRequest},
    repository::ProductRepository,
    search::{ProductDocument, SearchIndex},
};

/// Product persistence with cache and search projection kept in step.
#[automock]
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, product: NewProductRecord) -> Result<Product, ProductsServiceError>;

    async fn update(&self, product: Product) -> Result<Product, ProductsServiceError>;

    /// Tombstone a live product.
    async fn delete_by_uuid(&self, product: ProductUuid) -> Result<Product, ProductsServiceError>;

    /// Read-through lookup; tombstoned products are returned as such.
    async fn find_by_uuid(
        &self,
        product: ProductUuid,
    ) -> Result<Option<Product>, ProductsServiceError>;

    /// Page of identifiers answered by the relational store.
    async fn find_paginated_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError>;

    /// Page of identifiers answered by the search projection.
    async fn find_search_paginated_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError>;

    /// Point every product referencing `old` at `new`. Returns the number of
    /// products rewritten.
    async fn update_all_thumbnail(
        &self,
        old: &ObjectId,
        new: &ObjectId,
    ) -> Result<usize, ProductsServiceError>;
}

/// Writes go to the repository first, then the search index, then the cache.
/// Failures after the repository write are logged and do not fail the call.
#[derive(Clone)]
pub struct CachedProductStore {
    repository: Arc<dyn ProductRepository>,
    cache: Arc<dyn ProductCache>,
    search: Arc<dyn SearchIndex>,
}

impl Debug for CachedProductStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CachedProductStore").finish_non_exhaustive()
    }
}

impl CachedProductStore {
    pub fn new(
        repository: Arc<dyn ProductRepository>,
        cache: Arc<dyn ProductCache>,
        search: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            repository,
            cache,
            search,
        }
    }

    async fn propagate(&self, products: &[Product]) {
        for product in products {
            if let Err(error) = self.search.index(ProductDocument::from(product)).await {
                warn!(product = %product.uuid, "failed to index product: {error}");
            }
        }

        let uuids: Vec<ProductUuid> = products.iter().map(|product| product.uuid).collect();

        if let Err(error) = self.cache.invalidate(&uuids).await {
            warn!(products = uuids.len(), "failed to invalidate cached products: {error}");
        }
    }
}

#[async_trait]
impl ProductStore for CachedProductStore {
    async fn create(&self, product: NewProductRecord) -> Result<Product, ProductsServiceError> {
        let created = self.repository.create_product(product).await?;

        self.propagate(std::slice::from_ref(&created)).await;

        Ok(created)
    }

    async fn update(&self, product: Product) -> Result<Product, ProductsServiceError> {
        let updated = self.repository.update_product(product).await?;

        self.propagate(std::slice::from_ref(&updated)).await;

        Ok(updated)
    }

    async fn delete_by_uuid(&self, product: ProductUuid) -> Result<Product, ProductsServiceError> {
        let deleted = self
            .repository
            .delete_product(product)
            .await?
            .ok_or(ProductsServiceError::NotFound)?;

        self.propagate(std::slice::from_ref(&deleted)).await;

        Ok(deleted)
    }

    async fn find_by_uuid(
        &self,
        product: ProductUuid,
    ) -> Result<Option<Product>, ProductsServiceError> {
        match self.cache.get(product).await {
            Ok(CacheLookup::Hit(cached)) => return Ok(Some(cached)),
            Ok(CacheLookup::NegativeHit) => return Ok(None),
            Ok(CacheLookup::Miss) => {}
            Err(error) => {
                debug!(%product, "cache lookup failed, reading through: {error}");
            }
        }

        let found = self.repository.find_product(product).await?;

        if let Err(error) = self.cache.put(product, found.clone()).await {
            warn!(%product, "failed to cache product: {error}");
        }

        Ok(found)
    }

    async fn find_paginated_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError> {
        self.repository.find_paginated_uuids(request, owner).await
    }

    async fn find_search_paginated_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError> {
        Ok(self.search.search(request, owner).await?)
    }

    async fn update_all_thumbnail(
        &self,
        old: &ObjectId,
        new: &ObjectId,
    ) -> Result<usize, ProductsServiceError> {
        let rewritten = self.repository.update_all_thumbnail(old, new).await?;

        self.propagate(&rewritten).await;

        info!(%old, %new, products = rewritten.len(), "rewrote thumbnail references");

        Ok(rewritten.len())
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use mockall::predicate::eq;
    use redis::{ErrorKind, RedisError};
    use testresult::TestResult;

    use super::*;
    use crate::domain::products::{
        cache::{CacheError, MockProductCache},
        models::UserId,
        repository::MockProductRepository,
        search::{MockSearchIndex, SearchError},
    };

    fn product(thumbnail: &str) -> Product {
        let now = Timestamp::now();

        Product {
            uuid: ProductUuid::new(),
            name: "Chair".to_string(),
            description: "Oak chair".to_string(),
            price: 9900,
            thumbnail: ObjectId::from(thumbnail),
            owner: UserId::from("alice"),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn record(product: &Product) -> NewProductRecord {
        NewProductRecord {
            uuid: product.uuid,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            thumbnail: product.thumbnail.clone(),
            owner: product.owner.clone(),
        }
    }

    #[tokio::test]
    async fn create_indexes_and_invalidates() -> TestResult {
        let stored = product("obj-1");
        let uuid = stored.uuid;
        let returned = stored.clone();

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();
        let mut search = MockSearchIndex::new();

        repository
            .expect_create_product()
            .once()
            .return_once(move |_| Ok(returned));

        search
            .expect_index()
            .withf(move |document| document.id == uuid)
            .once()
            .return_once(|_| Ok(()));

        cache
            .expect_invalidate()
            .withf(move |uuids| uuids == [uuid])
            .once()
            .return_once(|_| Ok(()));

        let store =
            CachedProductStore::new(Arc::new(repository), Arc::new(cache), Arc::new(search));

        let created = store.create(record(&stored)).await?;

        assert_eq!(created, stored);

        Ok(())
    }

    #[tokio::test]
    async fn propagation_failures_do_not_fail_the_write() -> TestResult {
        let stored = product("obj-1");
        let returned = stored.clone();

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();
        let mut search = MockSearchIndex::new();

        repository
            .expect_update_product()
            .once()
            .return_once(move |_| Ok(returned));

        search.expect_index().once().return_once(|_| {
            Err(SearchError::UnexpectedResponse("cluster red".to_string()))
        });

        cache.expect_invalidate().once().return_once(|_| {
            Err(CacheError::Redis(RedisError::from((
                ErrorKind::IoError,
                "cache down",
            ))))
        });

        let store =
            CachedProductStore::new(Arc::new(repository), Arc::new(cache), Arc::new(search));

        let updated = store.update(stored.clone()).await?;

        assert_eq!(updated, stored);

        Ok(())
    }

    #[tokio::test]
    async fn repository_failure_skips_propagation() {
        let stored = product("obj-1");

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();
        let mut search = MockSearchIndex::new();

        repository
            .expect_update_product()
            .once()
            .return_once(|_| Err(ProductsServiceError::Sql(sqlx::Error::PoolTimedOut)));

        search.expect_index().never();
        cache.expect_invalidate().never();

        let store =
            CachedProductStore::new(Arc::new(repository), Arc::new(cache), Arc::new(search));

        let result = store.update(stored).await;

        assert!(
            matches!(result, Err(ProductsServiceError::Sql(_))),
            "expected storage failure, got {result:?}"
        );
    }

    #[tokio::test]
    async fn cache_hit_skips_repository() -> TestResult {
        let cached = product("obj-1");
        let uuid = cached.uuid;
        let hit = cached.clone();

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();

        cache
            .expect_get()
            .with(eq(uuid))
            .once()
            .return_once(move |_| Ok(CacheLookup::Hit(hit)));

        repository.expect_find_product().never();

        let store = CachedProductStore::new(
            Arc::new(repository),
            Arc::new(cache),
            Arc::new(MockSearchIndex::new()),
        );

        assert_eq!(store.find_by_uuid(uuid).await?, Some(cached));

        Ok(())
    }

    #[tokio::test]
    async fn negative_hit_returns_none_without_repository() -> TestResult {
        let uuid = ProductUuid::new();

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();

        cache
            .expect_get()
            .once()
            .return_once(|_| Ok(CacheLookup::NegativeHit));

        repository.expect_find_product().never();

        let store = CachedProductStore::new(
            Arc::new(repository),
            Arc::new(cache),
            Arc::new(MockSearchIndex::new()),
        );

        assert_eq!(store.find_by_uuid(uuid).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn miss_reads_through_and_caches_absence() -> TestResult {
        let uuid = ProductUuid::new();

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();

        cache
            .expect_get()
            .once()
            .return_once(|_| Ok(CacheLookup::Miss));

        repository
            .expect_find_product()
            .with(eq(uuid))
            .once()
            .return_once(|_| Ok(None));

        cache
            .expect_put()
            .withf(move |product, entry| *product == uuid && entry.is_none())
            .once()
            .return_once(|_, _| Ok(()));

        let store = CachedProductStore::new(
            Arc::new(repository),
            Arc::new(cache),
            Arc::new(MockSearchIndex::new()),
        );

        assert_eq!(store.find_by_uuid(uuid).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn delete_of_missing_product_is_not_found() {
        let mut repository = MockProductRepository::new();

        repository
            .expect_delete_product()
            .once()
            .return_once(|_| Ok(None));

        let store = CachedProductStore::new(
            Arc::new(repository),
            Arc::new(MockProductCache::new()),
            Arc::new(MockSearchIndex::new()),
        );

        let result = store.delete_by_uuid(ProductUuid::new()).await;

        assert!(
            matches!(result, Err(ProductsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn thumbnail_rewrite_reindexes_every_affected_product() -> TestResult {
        let first = product("default");
        let second = product("default");
        let rewritten = vec![first.clone(), second.clone()];

        let mut repository = MockProductRepository::new();
        let mut cache = MockProductCache::new();
        let mut search = MockSearchIndex::new();

        repository
            .expect_update_all_thumbnail()
            .withf(|old, new| old.as_str() == "obj-9" && new.as_str() == "default")
            .once()
            .return_once(move |_, _| Ok(rewritten));

        search.expect_index().times(2).returning(|_| Ok(()));

        cache
            .expect_invalidate()
            .withf(move |uuids| uuids == [first.uuid, second.uuid])
            .once()
            .return_once(|_| Ok(()));

        let store =
            CachedProductStore::new(Arc::new(repository), Arc::new(cache), Arc::new(search));

        let count = store
            .update_all_thumbnail(&ObjectId::from("obj-9"), &ObjectId::from("default"))
            .await?;

        assert_eq!(count, 2);

        Ok(())
    }
}
