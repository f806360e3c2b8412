//! Paginated product listings.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::products::{
    errors::ProductsServiceError,
    models::{ProductUuid, UserId},
    store::ProductStore,
};

/// Page size bounds applied when sanitizing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 20,
        }
    }
}

/// Listing request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaginationRequest {
    /// Free-text query; empty matches everything.
    pub search: String,

    /// Sort keys such as `"+name"` or `"-price"`.
    pub sort: Vec<String>,

    pub limit: i64,
    pub page: i64,
    pub include_deleted: bool,
}

impl PaginationRequest {
    /// Clamp limit and page into range.
    #[must_use]
    pub fn sanitize(mut self, limits: PaginationLimits) -> Self {
        if self.limit <= 0 {
            self.limit = i64::from(limits.default_limit);
        }

        if self.limit > i64::from(limits.max_limit) {
            self.limit = i64::from(limits.max_limit);
        }

        if self.page <= 0 {
            self.page = 1;
        }

        self
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Recognised sort fields in request order; unknown keys are dropped.
    pub fn sort_fields(&self) -> Vec<SortField> {
        self.sort
            .iter()
            .filter_map(|raw| {
                let field = SortField::parse(raw);

                if field.is_none() {
                    debug!(sort = %raw, "ignoring unknown sort key");
                }

                field
            })
            .collect()
    }
}

/// Sortable product column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Description,
    Price,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "description" => Some(Self::Description),
            "price" => Some(Self::Price),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    /// Relational column name.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    /// Field to sort by in the search projection. Text fields sort on their
    /// keyword sub-field.
    pub fn search_key(self) -> String {
        match self {
            Self::Name | Self::Description => format!("{}.keyword", self.column()),
            Self::Price | Self::CreatedAt | Self::UpdatedAt => self.column().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub column: SortColumn,
    pub descending: bool,
}

impl SortField {
    /// Parse `"-col"` as descending and `"col"` or `"+col"` as ascending.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let descending = raw.starts_with('-');
        let key = raw.trim_start_matches(|c: char| c == '+' || c == '-');

        SortColumn::from_key(key).map(|column| Self { column, descending })
    }

    pub const fn direction(self) -> &'static str {
        if self.descending { "desc" } else { "asc" }
    }
}

/// Ownership restriction applied on top of a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    All,
    Owner(UserId),
}

/// Which backend answers a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Relational,
    #[default]
    Search,
}

/// One page of identifiers and the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdPage {
    pub uuids: Vec<ProductUuid>,
    pub count: u64,
}

/// A page of product identifiers with paging metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedUuids {
    pub uuids: Vec<ProductUuid>,
    pub count: u64,
    pub max_page: u64,
    /// The sanitized request that produced this page.
    pub meta: PaginationRequest,
}

impl PaginatedUuids {
    pub fn new(meta: PaginationRequest, page: IdPage) -> Self {
        let limit = u64::try_from(meta.limit).unwrap_or(1).max(1);

        Self {
            max_page: page.count.div_ceil(limit),
            uuids: page.uuids,
            count: page.count,
            meta,
        }
    }
}

/// A backend able to answer listings.
#[automock]
#[async_trait]
pub trait PaginationSource: Send + Sync {
    async fn page_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError>;
}

/// Answers listings from the relational store.
#[derive(Clone)]
pub struct RelationalSource {
    store: Arc<dyn ProductStore>,
}

impl RelationalSource {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

impl Debug for RelationalSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RelationalSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl PaginationSource for RelationalSource {
    async fn page_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError> {
        self.store.find_paginated_uuids(request, owner).await
    }
}

/// Answers listings from the search projection.
#[derive(Clone)]
pub struct ProjectionSource {
    store: Arc<dyn ProductStore>,
}

impl ProjectionSource {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

impl Debug for ProjectionSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ProjectionSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl PaginationSource for ProjectionSource {
    async fn page_uuids(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, ProductsServiceError> {
        self.store.find_search_paginated_uuids(request, owner).await
    }
}

/// Sanitizes listing requests and routes them to a backend.
#[derive(Clone)]
pub struct PaginationRouter {
    limits: PaginationLimits,
    relational: Arc<dyn PaginationSource>,
    projection: Arc<dyn PaginationSource>,
}

impl Debug for PaginationRouter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PaginationRouter")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl PaginationRouter {
    /// Route over both backends of `store`.
    pub fn new(store: &Arc<dyn ProductStore>, limits: PaginationLimits) -> Self {
        Self::with_sources(
            limits,
            Arc::new(RelationalSource::new(Arc::clone(store))),
            Arc::new(ProjectionSource::new(Arc::clone(store))),
        )
    }

    pub fn with_sources(
        limits: PaginationLimits,
        relational: Arc<dyn PaginationSource>,
        projection: Arc<dyn PaginationSource>,
    ) -> Self {
        Self {
            limits,
            relational,
            projection,
        }
    }

    fn source(&self, hint: DataSource) -> &dyn PaginationSource {
        match hint {
            DataSource::Relational => self.relational.as_ref(),
            DataSource::Search => self.projection.as_ref(),
        }
    }

    /// Sanitize `request` and fetch one page from the backend named by `hint`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn paginate(
        &self,
        request: PaginationRequest,
        owner: OwnerScope,
        hint: DataSource,
    ) -> Result<PaginatedUuids, ProductsServiceError> {
        let request = request.sanitize(self.limits);

        let page = self.source(hint).page_uuids(&request, &owner).await?;

        Ok(PaginatedUuids::new(request, page))
    }
}
