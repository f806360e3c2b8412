//! Authority client for permission checks.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::products::{models::UserId, permissions::Permission};

/// Answers whether a user holds permissions.
#[automock]
#[async_trait]
pub trait Authority: Send + Sync {
    /// Returns `true` when `user` holds at least one of `permissions`.
    async fn has_access(
        &self,
        user: &UserId,
        permissions: &[Permission],
    ) -> Result<bool, AuthorityError>;
}

/// Configuration for connecting to the Authority service.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Authority server address, e.g. `"http://localhost:8081"`.
    pub addr: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// HTTP client for the Authority access-check endpoint.
#[derive(Debug, Clone)]
pub struct HttpAuthorityClient {
    config: AuthorityConfig,
    http: Client,
}

impl HttpAuthorityClient {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: AuthorityConfig) -> Result<Self, AuthorityError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl Authority for HttpAuthorityClient {
    async fn has_access(
        &self,
        user: &UserId,
        permissions: &[Permission],
    ) -> Result<bool, AuthorityError> {
        let url = format!("{}/v1/access/check", self.config.addr);

        let response = self
            .http
            .post(&url)
            .json(&AccessCheckRequest {
                user_id: user.as_str(),
                permissions,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(AuthorityError::UnexpectedResponse(format!(
                "access check failed with status {status}: {text}"
            )));
        }

        let parsed: AccessCheckResponse = response.json().await?;

        parsed.value.ok_or_else(|| {
            AuthorityError::UnexpectedResponse("access check returned no value".to_string())
        })
    }
}

#[derive(Debug, Serialize)]
struct AccessCheckRequest<'a> {
    user_id: &'a str,
    permissions: &'a [Permission],
}

#[derive(Debug, Deserialize)]
struct AccessCheckResponse {
    #[serde(default)]
    value: Option<bool>,
}

/// Errors that can occur when communicating with the Authority.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Authority returned a non-2xx response or unexpected body.
    #[error("unexpected response from authority: {0}")]
    UnexpectedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_lists_permission_names() -> Result<(), serde_json::Error> {
        let body = serde_json::to_value(AccessCheckRequest {
            user_id: "user-1",
            permissions: &[Permission::ALL, Permission::FULL_ACCESS],
        })?;

        assert_eq!(
            body,
            serde_json::json!({
                "user_id": "user-1",
                "permissions": ["PRODUCT_ALL", "FULL_ACCESS"],
            })
        );

        Ok(())
    }

    #[test]
    fn empty_response_has_no_value() -> Result<(), serde_json::Error> {
        let parsed: AccessCheckResponse = serde_json::from_str("{}")?;

        assert_eq!(parsed.value, None);

        Ok(())
    }
}
