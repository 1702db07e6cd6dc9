//! Error handling for backend API operations
//!
//! All client operations return [`Result<T>`]. The taxonomy separates
//! transport failures (retriable, never shown to the user for background
//! work) from backend rejections (carrying the server's `detail` string,
//! surfaced verbatim for user-initiated actions).

use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur when talking to the marketplace backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure reaching the backend (DNS, connect, timeout, TLS)
    ///
    /// Automatically converted from `reqwest::Error`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a 4xx/5xx status
    ///
    /// `detail` carries the server's error message when the body had one,
    /// otherwise the raw status line.
    #[error("backend error (HTTP {status}): {detail}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Server-provided `detail` string, or the status reason
        detail: String,
    },

    /// A response body did not match the expected shape
    ///
    /// Automatically converted from `serde_json::Error`.
    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL is not usable
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Create a backend error from a status code and detail string.
    pub fn backend(status: u16, detail: impl Into<String>) -> Self {
        ApiError::Backend {
            status,
            detail: detail.into(),
        }
    }

    /// Whether the operation might succeed if simply retried.
    ///
    /// Transport failures and server-side errors (5xx, 429) are transient;
    /// validation rejections and malformed responses are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Backend { status, .. } => *status >= 500 || *status == 429,
            ApiError::Decode(_) | ApiError::InvalidUrl(_) => false,
        }
    }

    /// A simplified message suitable for display in the UI.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ApiError::Backend { status, .. } if *status >= 500 => {
                format!("The server had a problem ({}). Please try again later.", status)
            }
            ApiError::Backend { detail, .. } => detail.clone(),
            ApiError::Decode(_) => "Received unexpected data from the server.".to_string(),
            ApiError::InvalidUrl(url) => format!("Invalid server address: {}", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let error = ApiError::backend(400, "Message content must not be empty");
        assert_eq!(
            error.to_string(),
            "backend error (HTTP 400): Message content must not be empty"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ApiError::backend(500, "internal error").is_recoverable());
        assert!(ApiError::backend(429, "slow down").is_recoverable());
        assert!(!ApiError::backend(400, "empty content").is_recoverable());
        assert!(!ApiError::backend(404, "unknown receiver").is_recoverable());
        assert!(!ApiError::InvalidUrl("not a url".to_string()).is_recoverable());
    }

    #[test]
    fn test_backend_detail_surfaced_verbatim() {
        let error = ApiError::backend(400, "You cannot message yourself");
        assert_eq!(error.user_message(), "You cannot message yourself");
    }

    #[test]
    fn test_server_error_user_message_hides_detail() {
        let error = ApiError::backend(503, "upstream connect timeout to 10.0.0.3");
        assert!(!error.user_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_decode_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let error: ApiError = json_error.into();
        assert!(matches!(error, ApiError::Decode(_)));
    }
}
