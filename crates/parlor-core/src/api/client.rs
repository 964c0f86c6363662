//! API client for the chat backend's auth endpoints.
//!
//! This module provides the `ApiClient` struct, the reqwest-backed
//! implementation of `AuthBackend`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::models::{Credentials, Registration, TokenResponse, UserProfile};

use super::{ApiError, AuthBackend};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, used when no config is supplied.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Route table for the auth endpoints, relative to `base_url`.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub base_url: String,
    pub register: String,
    pub login: String,
    pub me: String,
    pub logout: String,
    pub refresh: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            register: "/api/auth/register".to_string(),
            login: "/api/auth/login".to_string(),
            me: "/api/auth/me".to_string(),
            logout: "/api/auth/logout".to_string(),
            refresh: "/api/auth/refresh".to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// API client for the chat backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(endpoints: Endpoints) -> Result<Self, ApiError> {
        Self::with_timeout(endpoints, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoints: Endpoints, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            Endpoints::new(config.api_url.clone()),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url)))
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoints.url(path);
        debug!(url = %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse(response, &url).await
    }

    async fn post_bearer(&self, path: &str, token: &str) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoints.url(path);
        debug!(url = %url, "POST (bearer)");
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        Self::check_response(response).await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn register(&self, form: &Registration) -> Result<Value, ApiError> {
        self.post(&self.endpoints.register, form).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        self.post(&self.endpoints.login, credentials).await
    }

    async fn me(&self, token: &str) -> Result<UserProfile, ApiError> {
        let url = self.endpoints.url(&self.endpoints.me);
        debug!(url = %url, "GET (bearer)");
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let body: Value = Self::parse(response, &url).await?;
        UserProfile::try_from(body).map_err(ApiError::InvalidResponse)
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.post_bearer(&self.endpoints.logout, token).await?;
        Ok(())
    }

    async fn refresh(&self, token: &str) -> Result<TokenResponse, ApiError> {
        let url = self.endpoints.url(&self.endpoints.refresh);
        let response = self.post_bearer(&self.endpoints.refresh, token).await?;
        Self::parse(response, &url).await
    }
}
