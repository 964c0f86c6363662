//! Parlor core: client-side session management for the Parlor chat service.
//!
//! The crate owns the lifecycle of the bearer token (login, logout, restore
//! on startup, periodic refresh) and answers navigation questions from it.
//! The backend is reached through `api::AuthBackend`; the token is persisted
//! through `auth::CredentialStore`.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{ApiClient, ApiError, AuthBackend, Endpoints};
pub use auth::{AuthError, CredentialStore, Session, SessionController};
pub use config::Config;
pub use guard::{Access, Navigation, Route, RouteGuard};
pub use models::{Credentials, Registration, UserProfile};
