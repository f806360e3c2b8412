//! Product search projection.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::products::{
    models::{ObjectId, Product, ProductUuid, UserId},
    pagination::{IdPage, OwnerScope, PaginationRequest},
};

/// Fields matched by free-text search.
pub const SEARCH_FIELDS: [&str; 2] = ["name", "description"];

/// Share of query terms a document must match.
pub const MINIMUM_SHOULD_MATCH: &str = "50%";

const ANALYZER: &str = "product_analyzer";

/// Denormalized product as stored in the search projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    pub id: ProductUuid,
    pub name: String,
    pub description: String,
    pub price: u64,
    pub thumbnail_id: ObjectId,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl From<&Product> for ProductDocument {
    fn from(product: &Product) -> Self {
        Self {
            id: product.uuid,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            thumbnail_id: product.thumbnail.clone(),
            owner_id: product.owner.clone(),
            created_at: product.created_at,
            updated_at: product.updated_at,
            deleted_at: product.deleted_at,
        }
    }
}

/// Query-optimized projection of the relational products.
#[automock]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for a product.
    async fn index(&self, document: ProductDocument) -> Result<(), SearchError>;

    /// Find one page of matching product identifiers.
    async fn search(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, SearchError>;
}

/// Connection settings for the OpenSearch cluster.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// Cluster address, e.g. `"https://localhost:9200"`.
    pub addr: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Accept self-signed certificates.
    pub insecure: bool,
}

/// HTTP client for an OpenSearch products index.
#[derive(Debug, Clone)]
pub struct OpenSearchIndex {
    config: OpenSearchConfig,
    http: Client,
}

impl OpenSearchIndex {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: OpenSearchConfig) -> Result<Self, SearchError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self { config, http })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/{}", self.config.addr, path));

        match &self.config.username {
            Some(username) => builder.basic_auth(username, self.config.password.as_deref()),
            None => builder,
        }
    }

    /// Create the products index with its analyzer and mappings.
    ///
    /// Succeeds when the index already exists.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure or an unexpected response.
    pub async fn create_index(&self) -> Result<bool, SearchError> {
        let response = self
            .request(Method::PUT, &self.config.index)
            .json(&index_definition())
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(true);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if text.contains("resource_already_exists_exception") {
            return Ok(false);
        }

        Err(SearchError::UnexpectedResponse(format!(
            "index creation failed with status {status}: {text}"
        )))
    }
}

async fn ensure_success(response: Response, operation: &str) -> Result<Response, SearchError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    Err(SearchError::UnexpectedResponse(format!(
        "{operation} failed with status {status}: {text}"
    )))
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    async fn index(&self, document: ProductDocument) -> Result<(), SearchError> {
        let path = format!("{}/_doc/{}", self.config.index, document.id);

        let response = self
            .request(Method::PUT, &path)
            .json(&document)
            .send()
            .await?;

        ensure_success(response, "index").await?;

        Ok(())
    }

    async fn search(
        &self,
        request: &PaginationRequest,
        owner: &OwnerScope,
    ) -> Result<IdPage, SearchError> {
        let path = format!("{}/_search", self.config.index);

        let response = self
            .request(Method::POST, &path)
            .json(&search_body(request, owner))
            .send()
            .await?;

        let parsed: SearchResponse = ensure_success(response, "search").await?.json().await?;

        Ok(IdPage {
            uuids: parsed.hits.hits.into_iter().map(|hit| hit.source.id).collect(),
            count: parsed.hits.total.value,
        })
    }
}

/// Build the search request body for a sanitized listing request.
pub fn search_body(request: &PaginationRequest, owner: &OwnerScope) -> Value {
    let matcher = if request.search.trim().is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({
            "multi_match": {
                "query": request.search,
                "fields": SEARCH_FIELDS,
                "minimum_should_match": MINIMUM_SHOULD_MATCH,
            }
        })
    };

    let mut filter = Vec::new();

    if let OwnerScope::Owner(owner) = owner {
        filter.push(json!({ "term": { "owner_id": owner.as_str() } }));
    }

    let mut must_not = Vec::new();

    if !request.include_deleted {
        must_not.push(json!({ "exists": { "field": "deleted_at" } }));
    }

    let sort: Vec<Value> = request
        .sort_fields()
        .into_iter()
        .map(|field| json!({ field.column.search_key(): { "order": field.direction() } }))
        .collect();

    json!({
        "from": request.offset(),
        "size": request.limit,
        "track_total_hits": true,
        "_source": ["id"],
        "query": {
            "bool": {
                "must": [matcher],
                "filter": filter,
                "must_not": must_not,
            }
        },
        "sort": sort,
    })
}

/// Settings and mappings for the products index.
pub fn index_definition() -> Value {
    let text_field = json!({
        "type": "text",
        "analyzer": ANALYZER,
        "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } },
    });

    json!({
        "settings": {
            "analysis": {
                "analyzer": {
                    ANALYZER: {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding"],
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "name": text_field,
                "description": text_field,
                "price": { "type": "long" },
                "thumbnail_id": { "type": "keyword" },
                "owner_id": { "type": "keyword" },
                "created_at": { "type": "date" },
                "updated_at": { "type": "date" },
                "deleted_at": { "type": "date" },
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    total: SearchTotal,
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchTotal {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    id: ProductUuid,
}

/// Errors that can occur when communicating with the search cluster.
#[derive(Debug, Error)]
pub enum SearchError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from search cluster: {0}")]
    UnexpectedResponse(String),
}
