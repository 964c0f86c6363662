//! Data models exchanged with the chat backend's auth endpoints.
//!
//! - `UserProfile`: opaque identity document returned by `/auth/me`
//! - `Credentials`, `Registration`: request bodies
//! - `TokenResponse`: login and refresh responses

pub mod user;

pub use user::{Credentials, Registration, TokenResponse, UserProfile};
