use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired")]
    SessionExpired,

    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            429 => ApiError::RateLimited {
                retry_after: retry_after_from_body(body),
            },
            403 => ApiError::AccessDenied(Self::truncate_body(body)),
            404 => ApiError::NotFound(Self::truncate_body(body)),
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// Extract `data.retry_after` (seconds) from a 429 body.
///
/// Accepts integers, floats (rounded up) and numeric strings. Anything
/// missing, malformed or not positive yields `None`.
pub fn retry_after_from_body(body: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(body).ok()?;
    let secs = match value.pointer("/data/retry_after")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if secs.is_finite() && secs > 0.0 {
        Some(secs.ceil() as u64)
    } else {
        None
    }
}
