//! Remote API error types

use thiserror::Error;

/// Errors that can occur talking to the model service
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl LlmError {
    /// Build an `ApiError` from a non-success body, preferring the service's own message
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());
        LlmError::ApiError { status, message }
    }

    /// Whether the service rejected the credential
    ///
    /// Gemini answers an invalid key with 400 rather than 401.
    pub fn is_auth(&self) -> bool {
        match self {
            LlmError::ApiError { status: 401 | 403, .. } => true,
            LlmError::ApiError { status: 400, message } => message.contains("API key"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_extracts_service_message() {
        let body = r#"{"error":{"code":400,"message":"Please ensure that multiturn requests alternate","status":"INVALID_ARGUMENT"}}"#;
        let err = LlmError::from_status(400, body);
        match err {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Please ensure that multiturn requests alternate");
            }
            _ => panic!("Expected ApiError"),
        }
    }

    #[test]
    fn test_from_status_falls_back_to_body() {
        let err = LlmError::from_status(502, "Bad gateway");
        assert_eq!(err.to_string(), "API error 502: Bad gateway");
    }

    #[test]
    fn test_is_auth() {
        assert!(LlmError::from_status(403, "denied").is_auth());
        assert!(!LlmError::from_status(500, "oops").is_auth());
        let bad_key = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(LlmError::from_status(400, bad_key).is_auth());
        assert!(!LlmError::from_status(400, "bad request").is_auth());
        assert!(!LlmError::InvalidResponse("x".to_string()).is_auth());
    }
}
