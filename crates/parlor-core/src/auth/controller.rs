//! Session lifecycle: bootstrap, login, logout and token refresh.
//!
//! `SessionController` is the only writer of `Session`. Three timelines touch
//! it concurrently (startup `init`, user-driven login/logout, and the
//! background refresh loop), so every operation that suspends on the network
//! records the session generation first and applies its result only if the
//! generation is unchanged. A logout always moves the generation forward,
//! which makes it authoritative over anything still in flight.

use std::sync::Arc;

use chrono::Duration;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::AuthBackend;
use crate::models::{Credentials, Registration, UserProfile};

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::session::{ErrorKind, Session, SessionPhase};
use super::token;

/// How a `refresh_token` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token is stored and in use.
    Refreshed,
    /// The token was expired or the backend refused; the session is anonymous.
    LoggedOut,
    /// Nothing to refresh.
    NotAuthenticated,
    /// The session changed while the request was in flight; result dropped.
    Discarded,
    /// `refresh_if_due` found the token still comfortably valid.
    NotDue,
}

pub struct SessionController {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn CredentialStore>,
    session: Arc<Session>,
    init_once: OnceCell<()>,
    ttl_days: Option<u32>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_session(backend, store, Arc::new(Session::new()))
    }

    pub fn with_session(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn CredentialStore>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            backend,
            store,
            session,
            init_once: OnceCell::new(),
            ttl_days: None,
        }
    }

    /// Lifetime passed to the store on every save.
    pub fn with_ttl_days(mut self, days: u32) -> Self {
        self.ttl_days = Some(days);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// `Authorization` header value for other authenticated requests.
    pub fn authorization(&self) -> Option<String> {
        let state = self.session.read();
        if !state.is_authenticated() {
            return None;
        }
        state.credential().map(|t| format!("Bearer {}", t))
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Restore the stored session, once per process.
    ///
    /// Concurrent callers share a single run; later calls return immediately.
    /// `initialized` is set when this resolves, whatever the outcome.
    pub async fn init(&self) {
        self.init_once.get_or_init(|| self.run_init()).await;
    }

    async fn run_init(&self) {
        let generation = {
            let mut state = self.session.write();
            if state.is_initialized() {
                return;
            }
            if state.is_authenticated() {
                debug!("Session already authenticated, nothing to restore");
                state.mark_initialized();
                return;
            }
            state.set_phase(SessionPhase::Initializing);
            state.generation()
        };

        let stored = self.store.load().filter(|t| token::is_valid(Some(t)));
        match stored {
            None => {
                debug!("No valid stored token");
                self.settle_anonymous(generation);
            }
            Some(token) => {
                {
                    let mut state = self.session.write();
                    if state.generation() == generation {
                        state.set_tentative_credential(token.clone());
                    }
                }
                match self.backend.me(&token).await {
                    Ok(user) => {
                        let mut state = self.session.write();
                        if state.generation() == generation {
                            info!(user = ?user.username(), "Session restored");
                            state.authenticate(user, token);
                        } else {
                            debug!("Session changed during init, keeping newer state");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Stored token rejected by backend");
                        self.settle_anonymous(generation);
                    }
                }
            }
        }

        self.session.write().mark_initialized();
    }

    /// Drop to anonymous and forget the stored token, unless a newer
    /// operation already owns the session.
    fn settle_anonymous(&self, generation: u64) {
        let mut state = self.session.write();
        if state.generation() == generation {
            state.reset(SessionPhase::Anonymous);
            self.store.clear();
        }
    }

    // =========================================================================
    // User actions
    // =========================================================================

    pub async fn register(&self, form: &Registration) -> Result<Value, AuthError> {
        match self.backend.register(form).await {
            Ok(body) => {
                self.session.write().clear_error(ErrorKind::Register);
                info!(username = %form.username, "Registration succeeded");
                Ok(body)
            }
            Err(e) => {
                let err = AuthError::from(e);
                warn!(error = %err, "Registration failed");
                self.session
                    .write()
                    .set_error(ErrorKind::Register, err.user_message());
                Err(err)
            }
        }
    }

    /// Exchange credentials for a token and confirm it with the identity
    /// endpoint. Either both succeed and the session is authenticated, or the
    /// session ends anonymous with nothing persisted.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, AuthError> {
        let generation = self.session.write().advance();
        info!(user = %credentials.identifier, "Logging in");

        let result = self.try_login(credentials, generation).await;
        if let Err(ref err) = result {
            warn!(error = %err, "Login failed");
            let mut state = self.session.write();
            if state.generation() == generation {
                state.reset(SessionPhase::Anonymous);
                self.store.clear();
                state.set_error(ErrorKind::Login, err.user_message());
            }
        }
        result
    }

    async fn try_login(
        &self,
        credentials: &Credentials,
        generation: u64,
    ) -> Result<UserProfile, AuthError> {
        let response = self.backend.login(credentials).await?;
        let token = response.access_token;
        if !token::is_valid(Some(&token)) {
            return Err(AuthError::InvalidToken);
        }

        {
            let mut state = self.session.write();
            if state.generation() != generation {
                return Err(AuthError::Superseded);
            }
            self.store.save(&token, self.ttl_days);
            state.set_tentative_credential(token.clone());
        }

        let user = self.backend.me(&token).await.map_err(AuthError::Profile)?;

        let mut state = self.session.write();
        if state.generation() != generation {
            return Err(AuthError::Superseded);
        }
        state.authenticate(user.clone(), token);
        state.clear_error(ErrorKind::Login);
        info!(user = ?user.username(), "Login successful");
        Ok(user)
    }

    /// Forget the session locally, then tell the backend. Never fails.
    pub async fn logout(&self) {
        let (token, generation) = {
            let mut state = self.session.write();
            let token = state
                .credential()
                .map(str::to_string)
                .or_else(|| self.store.load());
            state.reset(SessionPhase::LoggingOut);
            self.store.clear();
            (token, state.generation())
        };

        if let Some(token) = token {
            if let Err(e) = self.backend.logout(&token).await {
                warn!(error = %e, "Logout notification failed");
            }
        }

        let mut state = self.session.write();
        if state.generation() == generation {
            state.set_phase(SessionPhase::Anonymous);
        }
        info!("Logged out");
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Trade the current token for a fresh one.
    ///
    /// An already expired token is not sent; the session is logged out
    /// instead. Any failure also ends in logout.
    pub async fn refresh_token(&self) -> RefreshOutcome {
        enum Start {
            Skip,
            Expired,
            Send(String, u64),
        }

        let start = {
            let mut state = self.session.write();
            if !state.is_authenticated() {
                Start::Skip
            } else {
                match state.credential().filter(|t| token::is_valid(Some(t))) {
                    Some(current) => {
                        let current = current.to_string();
                        state.set_phase(SessionPhase::Refreshing);
                        Start::Send(current, state.generation())
                    }
                    None => Start::Expired,
                }
            }
        };

        let (current, generation) = match start {
            Start::Skip => return RefreshOutcome::NotAuthenticated,
            Start::Expired => {
                debug!("Token expired before refresh, logging out");
                self.logout().await;
                return RefreshOutcome::LoggedOut;
            }
            Start::Send(current, generation) => (current, generation),
        };

        let refreshed = match self.backend.refresh(&current).await {
            Ok(response) if token::is_valid(Some(&response.access_token)) => {
                Ok(response.access_token)
            }
            Ok(_) => Err("Invalid token received".to_string()),
            Err(e) => Err(e.to_string()),
        };

        match refreshed {
            Ok(new_token) => {
                let mut state = self.session.write();
                if state.generation() != generation || !state.is_authenticated() {
                    debug!("Session changed during refresh, discarding new token");
                    return RefreshOutcome::Discarded;
                }
                self.store.save(&new_token, self.ttl_days);
                state.replace_credential(new_token);
                debug!("Token refreshed");
                RefreshOutcome::Refreshed
            }
            Err(reason) => {
                let stale = {
                    let state = self.session.read();
                    state.generation() != generation || state.credential() != Some(current.as_str())
                };
                if stale {
                    debug!(reason = %reason, "Refresh failed for a token no longer in use");
                    return RefreshOutcome::Discarded;
                }
                warn!(reason = %reason, "Token refresh failed, logging out");
                self.logout().await;
                RefreshOutcome::LoggedOut
            }
        }
    }

    /// Refresh only when the token is expired or expires within `buffer`.
    pub async fn refresh_if_due(&self, buffer: Duration) -> RefreshOutcome {
        let due = {
            let state = self.session.read();
            if !state.is_authenticated() {
                return RefreshOutcome::NotAuthenticated;
            }
            match state.credential() {
                Some(t) => !token::is_valid(Some(t)) || token::needs_refresh(t, buffer),
                None => true,
            }
        };
        if due {
            self.refresh_token().await
        } else {
            RefreshOutcome::NotDue
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::api::ApiError;
    use crate::auth::MemoryStore;
    use crate::models::TokenResponse;

    #[derive(Default)]
    struct CountingBackend {
        refresh_calls: AtomicUsize,
        logout_calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthBackend for CountingBackend {
        async fn register(&self, _: &Registration) -> Result<Value, ApiError> {
            Err(ApiError::InvalidResponse("unused".into()))
        }
        async fn login(&self, _: &Credentials) -> Result<TokenResponse, ApiError> {
            Err(ApiError::InvalidResponse("unused".into()))
        }
        async fn me(&self, _: &str) -> Result<UserProfile, ApiError> {
            Err(ApiError::InvalidResponse("unused".into()))
        }
        async fn logout(&self, _: &str) -> Result<(), ApiError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn refresh(&self, _: &str) -> Result<TokenResponse, ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenResponse {
                access_token: token_expiring_in(3600),
                token_type: None,
            })
        }
    }

    fn token_expiring_in(secs: i64) -> String {
        let claims = json!({"sub": "alice", "exp": Utc::now().timestamp() + secs});
        format!(
            "h.{}.s",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap())
        )
    }

    #[tokio::test]
    async fn test_refresh_with_expired_token_logs_out_without_request() {
        let backend = Arc::new(CountingBackend::default());
        let expired = token_expiring_in(-1);
        let store = Arc::new(MemoryStore::with_token(&expired));
        let session = Arc::new(Session::new());
        session.write().authenticate(
            UserProfile::new(serde_json::Map::from_iter([("id".to_string(), json!(1))])),
            expired,
        );
        let controller = SessionController::with_session(backend.clone(), store.clone(), session);

        assert_eq!(controller.refresh_token().await, RefreshOutcome::LoggedOut);

        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
        let state = controller.session().read();
        assert!(!state.is_authenticated());
        assert_eq!(state.phase(), SessionPhase::Anonymous);
        drop(state);
        assert_eq!(store.load(), None);
    }
}
