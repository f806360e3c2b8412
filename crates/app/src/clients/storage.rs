//! Storage service client for object metadata lookups.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::products::models::{ObjectId, UserId};

/// Object type accepted as a product thumbnail.
pub const IMAGE_OBJECT_TYPE: &str = "IMAGE";

/// Metadata describing a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectInfo {
    #[serde(rename = "type")]
    pub object_type: String,

    #[serde(default)]
    pub is_public: bool,
}

impl ObjectInfo {
    pub fn is_image(&self) -> bool {
        self.object_type == IMAGE_OBJECT_TYPE
    }
}

/// Resolves object references held by the storage service.
#[automock]
#[async_trait]
pub trait ObjectMetadata: Send + Sync {
    /// Fetch metadata for `object` as seen by `user`.
    async fn get_object(
        &self,
        user: &UserId,
        object: &ObjectId,
    ) -> Result<ObjectInfo, ObjectMetadataError>;
}

/// Configuration for connecting to the storage service.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage server address, e.g. `"http://localhost:8082"`.
    pub addr: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpObjectMetadataClient {
    base: Url,
    http: Client,
}

impl HttpObjectMetadataClient {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the address is not a usable base URL or the
    /// HTTP client cannot be constructed.
    pub fn new(config: StorageConfig) -> Result<Self, ObjectMetadataError> {
        let base = Url::parse(&config.addr)
            .map_err(|error| ObjectMetadataError::InvalidAddress(error.to_string()))?;

        if base.cannot_be_a_base() {
            return Err(ObjectMetadataError::InvalidAddress(config.addr));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { base, http })
    }

    /// `{base}/v1/objects/{object}`, with `object` escaped as one segment.
    fn object_url(&self, object: &ObjectId) -> Url {
        let mut url = self.base.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "objects"])
                .push(object.as_str());
        }

        url
    }
}

#[async_trait]
impl ObjectMetadata for HttpObjectMetadataClient {
    async fn get_object(
        &self,
        user: &UserId,
        object: &ObjectId,
    ) -> Result<ObjectInfo, ObjectMetadataError> {
        let response = self
            .http
            .get(self.object_url(object))
            .query(&[("user_id", user.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ObjectMetadataError::NotFound);
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(ObjectMetadataError::UnexpectedResponse(format!(
                "object lookup failed with status {status}: {text}"
            )));
        }

        Ok(response.json().await?)
    }
}

/// Errors that can occur when communicating with the storage service.
#[derive(Debug, Error)]
pub enum ObjectMetadataError {
    #[error("object not found")]
    NotFound,

    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from storage: {0}")]
    UnexpectedResponse(String),

    #[error("invalid storage address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn client(addr: &str) -> Result<HttpObjectMetadataClient, ObjectMetadataError> {
        HttpObjectMetadataClient::new(StorageConfig {
            addr: addr.to_string(),
            timeout: Duration::from_secs(1),
        })
    }

    #[test]
    fn object_id_is_escaped_as_one_path_segment() -> TestResult {
        let client = client("http://storage:8082/")?;

        let url = client.object_url(&ObjectId::from("img/1?size=2#top"));

        assert_eq!(url.path(), "/v1/objects/img%2F1%3Fsize=2%23top");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let plain = client.object_url(&ObjectId::from("img-1"));

        assert_eq!(plain.as_str(), "http://storage:8082/v1/objects/img-1");

        Ok(())
    }

    #[test]
    fn unusable_address_is_rejected() {
        let result = client("mailto:storage@example.com");

        assert!(
            matches!(result, Err(ObjectMetadataError::InvalidAddress(_))),
            "expected an invalid address error, got {result:?}"
        );
    }

    #[test]
    fn object_info_decodes_storage_payload() -> Result<(), serde_json::Error> {
        let info: ObjectInfo = serde_json::from_str(r#"{"type":"IMAGE","is_public":true}"#)?;

        assert!(info.is_image(), "expected an image object");
        assert!(info.is_public, "expected a public object");

        let private: ObjectInfo = serde_json::from_str(r#"{"type":"VIDEO"}"#)?;

        assert!(!private.is_image(), "video is not an image");
        assert!(!private.is_public, "visibility defaults to private");

        Ok(())
    }
}
