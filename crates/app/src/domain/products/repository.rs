//! Products Repository

use async_trait::async_trait;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use mockall::automock;
use sqlx::{FromRow, Postgres, QueryBuilder, Row, postgres::PgRow, query_as};
use uuid::Uuid;

use crate::{
    database::Db,
    domain::products::{
        data::NewProductRecord,
        errors::ProductsServiceError,
        models::{ObjectId, Product, ProductUuid, UserId},
        pagination::{IdPage, OwnerScope, PaginationRequest},
    },
};

const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const FIND_PRODUCT_SQL: &str = include_str!("sql/find_product.sql");
const UPDATE_PRODUCT_SQL: &str = include_str!("sql/update_product.sql");
const DELETE_PRODUCT_SQL: &str = include_str!("sql/delete_product.sql");
const UPDATE_ALL_THUMBNAIL_SQL: &str = include_str!("sql/update_all_thumbnail.sql");

/// Relational source of truth for products.
#[automock]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create_product(
        &self,
        product: NewProductRecord,
    ) -> Result<Product, ProductsServiceError>;

    /// Persist the mutable fields of a live product.
    async fn update_product(&self, product: Product) -> Result<Product, ProductsServiceError>;

    /// Tombstone a live product, returning it. `None` when no live row matched.
    async fn delete_product(
        &self,
        product: ProductUuid,
    ) -> Result<Option<Product>, ProductsServiceError>;

    /// Find a product, tombstoned or not.
    async fn find_product(
        &self,
        product: ProductUuid,
    ) -> Result<Option<Product>, ProductsServiceError>;

    async fn find_paginated_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError>;

    /// Rewrite every product referencing `old` to reference `new`.
    async fn update_all_thumbnail(
        &self,
        old: &ObjectId,
        new: &ObjectId,
    ) -> Result<Vec<Product>, ProductsServiceError>;
}

#[derive(Debug, Clone)]
pub struct PgProductsRepository {
    db: Db,
}

impl PgProductsRepository {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for PgProductsRepository {
    async fn create_product(
        &self,
        product: NewProductRecord,
    ) -> Result<Product, ProductsServiceError> {
        let price = i64::try_from(product.price)?;

        let created = query_as::<Postgres, Product>(CREATE_PRODUCT_SQL)
            .bind(product.uuid.into_uuid())
            .bind(product.name)
            .bind(product.description)
            .bind(price)
            .bind(product.thumbnail.as_str())
            .bind(product.owner.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(created)
    }

    async fn update_product(&self, product: Product) -> Result<Product, ProductsServiceError> {
        let price = i64::try_from(product.price)?;

        let updated = query_as::<Postgres, Product>(UPDATE_PRODUCT_SQL)
            .bind(product.uuid.into_uuid())
            .bind(product.name)
            .bind(product.description)
            .bind(price)
            .bind(product.thumbnail.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(updated)
    }

    async fn delete_product(
        &self,
        product: ProductUuid,
    ) -> Result<Option<Product>, ProductsServiceError> {
        let deleted = query_as::<Postgres, Product>(DELETE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(deleted)
    }

    async fn find_product(
        &self,
        product: ProductUuid,
    ) -> Result<Option<Product>, ProductsServiceError> {
        let found = query_as::<Postgres, Product>(FIND_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(found)
    }

    async fn find_paginated_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError> {
        let count = count_query(request, owner)
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let uuids = page_query(request, owner)
            .build_query_scalar::<Uuid>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(IdPage {
            uuids: uuids.into_iter().map(ProductUuid::from_uuid).collect(),
            count: u64::try_from(count).unwrap_or_default(),
        })
    }

    async fn update_all_thumbnail(
        &self,
        old: &ObjectId,
        new: &ObjectId,
    ) -> Result<Vec<Product>, ProductsServiceError> {
        let updated = query_as::<Postgres, Product>(UPDATE_ALL_THUMBNAIL_SQL)
            .bind(old.as_str())
            .bind(new.as_str())
            .fetch_all(self.db.pool())
            .await?;

        Ok(updated)
    }
}

fn count_query(
    request: &PaginationRequest,
    owner: &OwnerScope,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT COUNT(*) FROM products");

    push_filters(&mut query, request, owner);

    query
}

/// One page of matching uuids. Only whitelisted columns reach `ORDER BY`;
/// `uuid` breaks ties so pages are stable.
fn page_query(
    request: &PaginationRequest,
    owner: &OwnerScope,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT uuid FROM products");

    push_filters(&mut query, request, owner);

    query.push(" ORDER BY ");

    for field in request.sort_fields() {
        query
            .push(field.column.column())
            .push(" ")
            .push(field.direction())
            .push(", ");
    }

    query
        .push("uuid LIMIT ")
        .push_bind(request.limit)
        .push(" OFFSET ")
        .push_bind(request.offset());

    query
}

/// Append the visibility, ownership and free-text filters shared by the
/// count and page queries.
fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    request: &PaginationRequest,
    owner: &OwnerScope,
) {
    builder.push(" WHERE TRUE");

    if !request.include_deleted {
        builder.push(" AND deleted_at IS NULL");
    }

    if let OwnerScope::Owner(owner) = owner {
        builder
            .push(" AND owner_id = ")
            .push_bind(owner.as_str().to_string());
    }

    let search = request.search.trim();

    if !search.is_empty() {
        let pattern = format!("%{}%", escape_like(search));

        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }

        escaped.push(c);
    }

    escaped
}

impl<'r> FromRow<'r, PgRow> for Product {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let price_i64: i64 = row.try_get("price")?;

        let price = u64::try_from(price_i64).map_err(|e| sqlx::Error::ColumnDecode {
            index: "price".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price,
            thumbnail: ObjectId::new(row.try_get::<String, _>("thumbnail_id")?),
            owner: UserId::new(row.try_get::<String, _>("owner_id")?),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            deleted_at: row
                .try_get::<Option<SqlxTimestamp>, _>("deleted_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}
