use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// Where the controller's state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Unknown,
    Initializing,
    Authenticated,
    Anonymous,
    LoggingOut,
    Refreshing,
}

/// Which user action produced `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Login,
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

/// The process-wide authentication record.
///
/// `authenticated` implies both `user` and `credential` are set; the only
/// way to set it is `authenticate`, which takes both. `generation` moves
/// forward whenever a user action or a transition to anonymous makes older
/// in-flight results obsolete.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    authenticated: bool,
    user: Option<UserProfile>,
    credential: Option<String>,
    initialized: bool,
    last_error: Option<SessionErrorInfo>,
    phase: SessionPhase,
    generation: u64,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_error(&self) -> Option<&SessionErrorInfo> {
        self.last_error.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ===== Mutations (controller only) =====

    /// Invalidate every in-flight operation and return the new generation.
    pub(crate) fn advance(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    /// Hold a credential that has not been confirmed by the backend yet.
    pub(crate) fn set_tentative_credential(&mut self, credential: String) {
        self.credential = Some(credential);
    }

    pub(crate) fn authenticate(&mut self, user: UserProfile, credential: String) {
        self.user = Some(user);
        self.credential = Some(credential);
        self.authenticated = true;
        self.phase = SessionPhase::Authenticated;
    }

    /// Swap the credential of an authenticated session.
    pub(crate) fn replace_credential(&mut self, credential: String) {
        debug_assert!(self.authenticated);
        self.credential = Some(credential);
        self.phase = SessionPhase::Authenticated;
    }

    /// Drop user and credential. Moves the generation forward.
    pub(crate) fn reset(&mut self, phase: SessionPhase) {
        self.authenticated = false;
        self.user = None;
        self.credential = None;
        self.phase = phase;
        self.advance();
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn set_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.last_error = Some(SessionErrorInfo {
            kind,
            message: message.into(),
        });
    }

    pub(crate) fn clear_error(&mut self, kind: ErrorKind) {
        if self.last_error.as_ref().is_some_and(|e| e.kind == kind) {
            self.last_error = None;
        }
    }
}

/// Read-only copy of the session for UIs and serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionSnapshot {
    pub authenticated: bool,
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown> | null"))]
    pub user: Option<UserProfile>,
    pub initialized: bool,
    pub last_error: Option<SessionErrorInfo>,
    pub phase: SessionPhase,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            authenticated: state.authenticated,
            user: state.user.clone(),
            initialized: state.initialized,
            last_error: state.last_error.clone(),
            phase: state.phase,
        }
    }
}

/// Shared handle to the session record.
///
/// Reads are synchronous so route guards and request builders never wait on
/// the network. Only `SessionController` obtains the write half.
#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.read().is_initialized()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().user().cloned()
    }

    /// The bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.read().credential().map(str::to_string)
    }

    pub fn last_error(&self) -> Option<SessionErrorInfo> {
        self.read().last_error().cloned()
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.read())
    }
}
