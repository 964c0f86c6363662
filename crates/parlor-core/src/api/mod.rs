//! REST API client module for the chat backend's auth endpoints.
//!
//! The session controller talks to the backend through the `AuthBackend`
//! trait; `ApiClient` is the reqwest implementation. Tests substitute a
//! scripted backend.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::AuthBackend;
pub use client::{ApiClient, Endpoints};
pub use error::ApiError;
