//! Common types used across the server
//!
//! This module defines the request type handed to the admission actors and
//! the JSON bodies returned by the HTTP transport.

use quotacrab::RejectReason;
use serde::{Deserialize, Serialize};

/// Request header carrying the API key
pub const API_KEY_HEADER: &str = "api-key";

/// Quota ceiling of the presented credential
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Quota left in the current window
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// End of the current window (ms since epoch)
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Internal admission request
///
/// Every transport reduces its protocol-specific input to this form before
/// handing it to an admission actor.
#[derive(Debug, Clone)]
pub struct AdmitRequest {
    /// Presented API key, `None` when the header was absent
    pub key: Option<String>,
    /// Request time in ms since epoch
    pub now: i64,
}

/// Error body returned for every non-2xx response
///
/// # Example
///
/// ```json
/// {
///   "error": "Rate limit exceeded",
///   "resetTime": 1718000000000
/// }
/// ```
///
/// `resetTime` is only present on quota rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    pub error: String,
    #[serde(
        rename = "resetTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reset_time: Option<i64>,
}

impl HttpErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        HttpErrorResponse {
            error: error.into(),
            reset_time: None,
        }
    }

    pub fn rejected(reason: RejectReason, reset_time: Option<i64>) -> Self {
        HttpErrorResponse {
            error: reason.to_string(),
            reset_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_omits_reset_time() {
        let json = serde_json::to_string(&HttpErrorResponse::new("Invalid API key")).unwrap();
        assert_eq!(json, r#"{"error":"Invalid API key"}"#);
    }

    #[test]
    fn test_quota_body_carries_reset_time() {
        let body = HttpErrorResponse::rejected(RejectReason::QuotaExceeded, Some(42));
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"Rate limit exceeded","resetTime":42}"#);

        let parsed: HttpErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, body);
    }
}
