//! Products service.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use async_trait::async_trait;
use mockall::automock;
use smallvec::smallvec;
use tracing::{debug, info};

use crate::{
    clients::{authority::Authority, storage::ObjectMetadata},
    domain::products::{
        access::AccessGuard,
        batch::BatchFetcher,
        data::{NewProduct, ProductUpdate},
        errors::ProductsServiceError,
        models::{ObjectId, Product, ProductUuid, RequestContext, UserId},
        pagination::{
            DataSource, OwnerScope, PaginatedUuids, PaginationLimits, PaginationRequest,
            PaginationRouter,
        },
        permissions::{Action, Permission},
        store::ProductStore,
    },
};

/// Tunables for [`ProductsUsecase`].
#[derive(Debug, Clone)]
pub struct ProductsSettings {
    pub pagination: PaginationLimits,
    pub batch_concurrency: usize,

    /// Reference products fall back to when their thumbnail is deleted.
    /// Always accepted as a thumbnail.
    pub default_thumbnail: ObjectId,
}

#[derive(Clone)]
pub struct ProductsUsecase {
    guard: AccessGuard,
    objects: Arc<dyn ObjectMetadata>,
    store: Arc<dyn ProductStore>,
    pagination: PaginationRouter,
    batch: BatchFetcher,
    default_thumbnail: ObjectId,
}

impl Debug for ProductsUsecase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ProductsUsecase")
            .field("pagination", &self.pagination)
            .field("batch", &self.batch)
            .field("default_thumbnail", &self.default_thumbnail)
            .finish_non_exhaustive()
    }
}

impl ProductsUsecase {
    #[must_use]
    pub fn new(
        authority: Arc<dyn Authority>,
        objects: Arc<dyn ObjectMetadata>,
        store: Arc<dyn ProductStore>,
        settings: ProductsSettings,
    ) -> Self {
        Self {
            guard: AccessGuard::new(authority),
            objects,
            pagination: PaginationRouter::new(&store, settings.pagination),
            batch: BatchFetcher::new(Arc::clone(&store), settings.batch_concurrency),
            store,
            default_thumbnail: settings.default_thumbnail,
        }
    }

    /// Check that `thumbnail` is a public image the caller can see.
    async fn validate_thumbnail(
        &self,
        caller: &UserId,
        thumbnail: &ObjectId,
    ) -> Result<(), ProductsServiceError> {
        if *thumbnail == self.default_thumbnail {
            return Ok(());
        }

        let object = self
            .objects
            .get_object(caller, thumbnail)
            .await
            .map_err(|error| {
                debug!(%thumbnail, "thumbnail lookup failed: {error}");

                ProductsServiceError::ReferenceNotFound
            })?;

        if !object.is_image() {
            return Err(ProductsServiceError::ReferenceTypeNotAllowed);
        }

        if !object.is_public {
            return Err(ProductsServiceError::ReferenceNotPublic);
        }

        Ok(())
    }

    /// Resolve how far a listing may see past the caller's own products.
    async fn listing_scope(
        &self,
        caller: &UserId,
        include_deleted: bool,
    ) -> Result<OwnerScope, ProductsServiceError> {
        if include_deleted {
            self.guard
                .check_any(caller, smallvec![Permission::ALL, Permission::READ_DELETED])
                .await?;

            return Ok(OwnerScope::All);
        }

        if self
            .guard
            .check_any(caller, smallvec![Permission::ALL, Permission::READ_OTHER])
            .await
            .is_ok()
        {
            return Ok(OwnerScope::All);
        }

        self.guard
            .check_any(caller, smallvec![Permission::READ])
            .await?;

        Ok(OwnerScope::Owner(caller.clone()))
    }
}

#[async_trait]
impl ProductsService for ProductsUsecase {
    async fn create_product(
        &self,
        ctx: RequestContext,
        product: NewProduct,
    ) -> Result<Product, ProductsServiceError> {
        self.guard.check(&ctx.caller, Action::Create, None).await?;

        self.validate_thumbnail(&ctx.caller, &product.thumbnail)
            .await?;

        let created = self.store.create(product.into_record(ctx.caller)).await?;

        info!(product = %created.uuid, owner = %created.owner, "created product");

        Ok(created)
    }

    async fn update_product(
        &self,
        ctx: RequestContext,
        product: ProductUuid,
        update: ProductUpdate,
    ) -> Result<Product, ProductsServiceError> {
        let existing = self
            .store
            .find_by_uuid(product)
            .await?
            .filter(|existing| !existing.is_deleted())
            .ok_or(ProductsServiceError::NotFound)?;

        self.guard
            .check(&ctx.caller, Action::Update, Some(&existing))
            .await?;

        self.validate_thumbnail(&ctx.caller, &update.thumbnail)
            .await?;

        let updated = self.store.update(update.apply(existing)).await?;

        info!(product = %updated.uuid, "updated product");

        Ok(updated)
    }

    async fn delete_product(
        &self,
        ctx: RequestContext,
        product: ProductUuid,
    ) -> Result<(), ProductsServiceError> {
        let existing = self
            .store
            .find_by_uuid(product)
            .await?
            .ok_or(ProductsServiceError::NotFound)?;

        if existing.is_deleted() {
            return Err(ProductsServiceError::AlreadyDeleted);
        }

        self.guard
            .check(&ctx.caller, Action::Delete, Some(&existing))
            .await?;

        self.store.delete_by_uuid(product).await?;

        info!(%product, "deleted product");

        Ok(())
    }

    async fn get_product(
        &self,
        ctx: RequestContext,
        product: ProductUuid,
    ) -> Result<Product, ProductsServiceError> {
        let found = self
            .store
            .find_by_uuid(product)
            .await?
            .ok_or(ProductsServiceError::NotFound)?;

        match self
            .guard
            .check(&ctx.caller, Action::Read, Some(&found))
            .await
        {
            Ok(()) => Ok(found),
            Err(ProductsServiceError::Unauthorized) if found.is_deleted() => {
                Err(ProductsServiceError::NotFound)
            }
            Err(error) => Err(error),
        }
    }

    async fn get_products(
        &self,
        ctx: RequestContext,
        products: Vec<ProductUuid>,
    ) -> Result<Vec<Product>, ProductsServiceError> {
        self.guard.check(&ctx.caller, Action::Read, None).await?;

        let mut found = self.batch.fetch_many(&products).await;

        if found.iter().any(Product::is_deleted)
            && self
                .guard
                .check_any(&ctx.caller, smallvec![Permission::ALL, Permission::READ_DELETED])
                .await
                .is_err()
        {
            found.retain(|product| !product.is_deleted());
        }

        Ok(found)
    }

    async fn list_product_uuids(
        &self,
        ctx: RequestContext,
        request: PaginationRequest,
        source: DataSource,
    ) -> Result<PaginatedUuids, ProductsServiceError> {
        let owner = self
            .listing_scope(&ctx.caller, request.include_deleted)
            .await?;

        self.pagination.paginate(request, owner, source).await
    }
}

#[automock]
#[async_trait]
pub trait ProductsService: Send + Sync {
    /// Create a product owned by the caller.
    async fn create_product(
        &self,
        ctx: RequestContext,
        product: NewProduct,
    ) -> Result<Product, ProductsServiceError>;

    /// Update the mutable fields of a live product.
    async fn update_product(
        &self,
        ctx: RequestContext,
        product: ProductUuid,
        update: ProductUpdate,
    ) -> Result<Product, ProductsServiceError>;

    /// Tombstone a product.
    async fn delete_product(
        &self,
        ctx: RequestContext,
        product: ProductUuid,
    ) -> Result<(), ProductsServiceError>;

    /// Retrieve a single product.
    async fn get_product(
        &self,
        ctx: RequestContext,
        product: ProductUuid,
    ) -> Result<Product, ProductsServiceError>;

    /// Retrieve many products in request order, skipping unknown identifiers.
    async fn get_products(
        &self,
        ctx: RequestContext,
        products: Vec<ProductUuid>,
    ) -> Result<Vec<Product>, ProductsServiceError>;

    /// List one page of product identifiers.
    async fn list_product_uuids(
        &self,
        ctx: RequestContext,
        request: PaginationRequest,
        source: DataSource,
    ) -> Result<PaginatedUuids, ProductsServiceError>;
}
