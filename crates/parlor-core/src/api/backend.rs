use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Credentials, Registration, TokenResponse, UserProfile};

use super::ApiError;

/// The five auth calls the session layer depends on.
///
/// Every method that takes a `token` sends it as `Authorization: Bearer`.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn register(&self, form: &Registration) -> Result<Value, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError>;

    /// Identity of the token's owner.
    async fn me(&self, token: &str) -> Result<UserProfile, ApiError>;

    /// Server-side revocation. The response body is ignored.
    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    async fn refresh(&self, token: &str) -> Result<TokenResponse, ApiError>;
}
