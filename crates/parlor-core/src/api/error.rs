use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response. `detail` is the backend's message when it sent one.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct DetailBody {
    detail: serde_json::Value,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of an error body.
    ///
    /// FastAPI-style backends answer `{"detail": "..."}`; validation errors
    /// carry a list there instead, which is rendered as JSON.
    fn extract_detail(body: &str) -> Option<String> {
        let parsed: DetailBody = serde_json::from_str(body).ok()?;
        match parsed.detail {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = Self::extract_detail(body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Request failed with status {}", status)
            } else {
                Self::truncate_body(body)
            }
        });
        ApiError::Rejected {
            status: status.as_u16(),
            detail,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_uses_detail() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"detail": "Incorrect username or password"}"#,
        );
        assert_eq!(err.to_string(), "Incorrect username or password");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_from_status_structured_detail() {
        let err = ApiError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}]}"#,
        );
        assert!(err.to_string().contains("field required"));
    }

    #[test]
    fn test_from_status_plain_body() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "upstream down");
        assert!(!err.is_network());
    }

    #[test]
    fn test_from_status_empty_body() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated"));
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
    }
}
