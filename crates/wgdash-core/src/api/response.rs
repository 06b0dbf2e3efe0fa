//! The `{status, message, data}` envelope every dashboard endpoint returns.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;

const SESSION_EXPIRED_MESSAGE: &str = "Session expired";
const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    #[serde(default)]
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// A failure produced on the client side.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn session_expired() -> Self {
        Self::failure(SESSION_EXPIRED_MESSAGE)
    }

    pub fn rate_limited() -> Self {
        Self::failure(RATE_LIMITED_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        self.status
    }

    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }
}

impl ApiResponse<Value> {
    /// Decode `data` into `U`, turning a `status: false` envelope into an error.
    pub fn into_data<U: DeserializeOwned>(self) -> Result<U, ApiError> {
        if !self.status {
            return Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| "Request failed".to_string()),
            ));
        }
        serde_json::from_value(self.data.unwrap_or(Value::Null))
            .map_err(|e| ApiError::InvalidResponse(format!("Unexpected data shape: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope_without_optional_fields() {
        let resp: ApiResponse = serde_json::from_str(r#"{"status": true}"#).expect("parse envelope");
        assert!(resp.is_success());
        assert_eq!(resp.message, None);
        assert_eq!(resp.data, None);

        let resp: ApiResponse = serde_json::from_str(r#"{"data": null}"#).expect("parse envelope");
        assert!(!resp.status);
    }

    #[test]
    fn test_failure_payloads() {
        let expired: ApiResponse = ApiResponse::session_expired();
        assert!(!expired.status);
        assert_eq!(expired.message_or(""), "Session expired");

        let limited: ApiResponse = ApiResponse::rate_limited();
        assert_eq!(limited.message_or(""), "Rate limit exceeded");
    }

    #[test]
    fn test_into_data() {
        let resp: ApiResponse =
            serde_json::from_str(r#"{"status": true, "data": {"n": 3}}"#).expect("parse envelope");
        let data: std::collections::HashMap<String, u32> = resp.into_data().expect("decode data");
        assert_eq!(data["n"], 3);

        let rejected: ApiResponse = ApiResponse::failure("Peer not found");
        let err = rejected.into_data::<Value>().unwrap_err();
        assert_eq!(err.to_string(), "Request rejected: Peer not found");
    }
}
