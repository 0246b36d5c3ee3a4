use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the attached credential, or none was attached
    /// for a route that needs one.
    #[error("{}", .detail.as_deref().unwrap_or("Unauthorized - token may be expired"))]
    Unauthorized { detail: Option<String> },

    #[error("Access denied: {}", describe(.detail, .body))]
    AccessDenied { detail: Option<String>, body: String },

    #[error("Not found: {}", describe(.detail, .body))]
    NotFound { detail: Option<String>, body: String },

    /// Any other 4xx, typically a `detail` such as "Already liked"
    #[error("{}", describe(.detail, .body))]
    Rejected {
        status: u16,
        detail: Option<String>,
        body: String,
    },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {}", describe(.detail, .body))]
    ServerError { detail: Option<String>, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Backend `detail` when present, else the truncated raw body
fn describe(detail: &Option<String>, body: &str) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None if body.is_empty() => "(empty response body)".to_string(),
        None => body.to_string(),
    }
}

/// Error body shape produced by the backend: `{"detail": ...}`.
/// Validation failures carry a list instead of a string.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    detail: serde_json::Value,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
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

    /// Extract the human-readable `detail` field from an error body
    pub(crate) fn detail_from_body(body: &str) -> Option<String> {
        let payload: ErrorPayload = serde_json::from_str(body).ok()?;
        match payload.detail {
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        // The raw body is kept for diagnostics only; it is never shown as the detail
        let detail = Self::detail_from_body(body);
        let body = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized { detail },
            403 => ApiError::AccessDenied { detail, body },
            404 => ApiError::NotFound { detail, body },
            429 => ApiError::RateLimited,
            code @ 400..=499 => ApiError::Rejected {
                status: code,
                detail,
                body,
            },
            500..=599 => ApiError::ServerError { detail, body },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, describe(&detail, &body))),
        }
    }

    /// The backend-supplied `detail`, when the failure came with one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { detail }
            | ApiError::AccessDenied { detail, .. }
            | ApiError::NotFound { detail, .. }
            | ApiError::Rejected { detail, .. }
            | ApiError::ServerError { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::AccessDenied { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::RateLimited => Some(429),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message to show the user: the backend detail verbatim, or `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::NetworkError(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.detail().unwrap_or(fallback).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_uses_detail() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"detail":"Invalid credentials"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), Some("Invalid credentials"));
        assert_eq!(err.to_string(), "Invalid credentials");

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":"Already liked"}"#);
        assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
        assert_eq!(err.user_message("Like failed"), "Already liked");
    }

    #[test]
    fn test_from_status_without_detail() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.detail(), None);
        assert_eq!(err.user_message("Login failed"), "Login failed");

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, ApiError::ServerError { ref body, .. } if body == "upstream down"));
        assert_eq!(err.detail(), None);
        assert_eq!(err.to_string(), "Server error: upstream down");
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
    }

    #[test]
    fn test_plain_text_server_error_uses_fallback() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        assert_eq!(err.detail(), None);
        assert_eq!(err.user_message("Login failed"), "Login failed");
        assert_eq!(err.to_string(), "Server error: Internal Server Error");
    }

    #[test]
    fn test_empty_body_uses_fallback() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.user_message("Error loading feed"), "Error loading feed");
        assert_eq!(err.to_string(), "Server error: (empty response body)");

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":""}"#);
        assert_eq!(err.detail(), None);
        assert_eq!(err.user_message("Like failed"), "Like failed");
    }

    #[test]
    fn test_validation_detail_list_kept_as_json() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email address"}]}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.status(), Some(422));
        assert!(err.detail().unwrap().contains("not a valid email"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
