#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};

use parlor_core::api::{ApiError, AuthBackend};
use parlor_core::auth::{MemoryStore, SessionController};
use parlor_core::models::{Credentials, Registration, TokenResponse, UserProfile};

pub fn make_token(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}

pub fn token_expiring_in(secs: i64) -> String {
    make_token(json!({"sub": "alice", "exp": Utc::now().timestamp() + secs}))
}

fn rejected(status: u16, detail: &str) -> ApiError {
    ApiError::Rejected {
        status,
        detail: detail.to_string(),
    }
}

/// In-memory backend whose answers are set per test.
pub struct ScriptedBackend {
    pub login_reply: Mutex<Result<String, (u16, String)>>,
    /// `None` answers 401.
    pub me_reply: Mutex<Option<Value>>,
    pub refresh_reply: Mutex<Result<String, (u16, String)>>,
    /// Served in order before falling back to `refresh_reply`.
    pub refresh_queue: Mutex<VecDeque<String>>,
    pub register_reply: Mutex<Result<Value, (u16, String)>>,
    pub logout_fails: Mutex<bool>,
    /// Applied to `me` and `refresh`.
    pub delay: Mutex<Duration>,

    pub login_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            login_reply: Mutex::new(Err((401, "Incorrect username or password".into()))),
            me_reply: Mutex::new(None),
            refresh_reply: Mutex::new(Err((401, "Token is invalid or expired".into()))),
            refresh_queue: Mutex::new(VecDeque::new()),
            register_reply: Mutex::new(Ok(json!({"message": "User created successfully"}))),
            logout_fails: Mutex::new(false),
            delay: Mutex::new(Duration::ZERO),
            login_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_login(&self, token: &str) {
        *self.login_reply.lock() = Ok(token.to_string());
    }

    pub fn reject_login(&self, status: u16, detail: &str) {
        *self.login_reply.lock() = Err((status, detail.to_string()));
    }

    pub fn set_profile(&self, profile: Value) {
        *self.me_reply.lock() = Some(profile);
    }

    pub fn accept_refresh(&self, token: &str) {
        *self.refresh_reply.lock() = Ok(token.to_string());
    }

    /// Answer the next refresh with `token`; later ones use `refresh_reply`.
    pub fn accept_refresh_once(&self, token: &str) {
        self.refresh_queue.lock().push_back(token.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn register(&self, _form: &Registration) -> Result<Value, ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.register_reply.lock().clone();
        reply.map_err(|(status, detail)| rejected(status, &detail))
    }

    async fn login(&self, _credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.login_reply.lock().clone();
        reply
            .map(|access_token| TokenResponse {
                access_token,
                token_type: Some("bearer".into()),
            })
            .map_err(|(status, detail)| rejected(status, &detail))
    }

    async fn me(&self, _token: &str) -> Result<UserProfile, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let reply = self.me_reply.lock().clone();
        match reply {
            Some(profile) => UserProfile::try_from(profile).map_err(ApiError::InvalidResponse),
            None => Err(rejected(401, "Token is invalid or expired")),
        }
    }

    async fn logout(&self, _token: &str) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if *self.logout_fails.lock() {
            return Err(rejected(503, "Service unavailable"));
        }
        Ok(())
    }

    async fn refresh(&self, _token: &str) -> Result<TokenResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.refresh_queue.lock().pop_front();
        self.pause().await;
        let reply = match queued {
            Some(token) => Ok(token),
            None => self.refresh_reply.lock().clone(),
        };
        reply
            .map(|access_token| TokenResponse {
                access_token,
                token_type: Some("bearer".into()),
            })
            .map_err(|(status, detail)| rejected(status, &detail))
    }
}

pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemoryStore>,
    pub controller: Arc<SessionController>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_stored_token(token: &str) -> Self {
        Self::with_store(MemoryStore::with_token(token))
    }

    fn with_store(store: MemoryStore) -> Self {
        let backend = Arc::new(ScriptedBackend::new());
        let store = Arc::new(store);
        let controller = Arc::new(SessionController::new(backend.clone(), store.clone()));
        Self {
            backend,
            store,
            controller,
        }
    }
}
