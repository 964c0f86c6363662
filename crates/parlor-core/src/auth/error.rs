use thiserror::Error;

use crate::api::ApiError;

/// Failures that `login` and `register` hand back to the caller.
///
/// `init`, `logout` and `refresh_token` never produce one; they settle in an
/// anonymous session instead.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend refused the request, or could not be reached.
    #[error(transparent)]
    Backend(#[from] ApiError),

    #[error("Invalid token received")]
    InvalidToken,

    #[error("Failed to get user info: {0}")]
    Profile(#[source] ApiError),

    /// A logout or newer login overtook this one while it was in flight.
    #[error("Login was superseded by another session change")]
    Superseded,
}

impl AuthError {
    /// Message suitable for showing next to the form that triggered it.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Backend(ApiError::NetworkError(e)) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::Backend(ApiError::NetworkError(_)) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}
