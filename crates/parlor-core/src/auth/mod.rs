//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `CredentialStore`: persistence of the access token (keyring, file, memory)
//! - `token`: pure structural and expiry checks on tokens
//! - `Session`: the shared authentication record
//! - `SessionController`: init, login, logout, register and refresh
//! - `spawn_refresh_loop`: periodic refresh in the background

pub mod controller;
pub mod credentials;
pub mod error;
pub mod refresh;
pub mod session;
pub mod token;

pub use controller::{RefreshOutcome, SessionController};
pub use credentials::{open_store, CredentialStore, FileStore, KeyringStore, MemoryStore};
pub use error::AuthError;
pub use refresh::{spawn_refresh_loop, RefreshHandle};
pub use session::{ErrorKind, Session, SessionErrorInfo, SessionPhase, SessionSnapshot, SessionState};
