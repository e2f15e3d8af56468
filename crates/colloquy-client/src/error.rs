//! Error types for LLM client operations.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network-level failure from the underlying HTTP client.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Failure raised by the retry middleware stack.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    /// Failed to serialize a request or deserialize a response body.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The provider rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// The provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimitError {
        /// Suggested wait time before retrying, if the provider sent one.
        retry_after: Option<Duration>,
    },

    /// The client was constructed with an unusable configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The request failed local validation before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider returned a response the client cannot use, such as a
    /// completion with no choices.
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// The provider returned a non-success status not covered above.
    #[error("Request failed: {0}")]
    RequestError(String),

    /// The provider reported itself unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Tools were attached to a request for a client that does not
    /// support tool calling.
    #[error("Tools are not supported by this client")]
    ToolsNotSupported,
}

impl ClientError {
    /// Returns whether retrying the same request could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::MiddlewareError(_)
                | Self::RateLimitError { .. }
                | Self::ServiceUnavailable(_)
        )
    }
}

/// Error payload returned by OpenAI-compatible endpoints.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// The error detail object.
    pub error: ErrorDetail,
}

/// Detail of an API error response.
#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Provider-specific error type, when present.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    /// Provider-specific error code, when present.
    #[serde(default)]
    pub code: Option<String>,
}
