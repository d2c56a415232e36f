//! Error taxonomy for backend calls.
//!
//! DESIGN
//! ======
//! Every variant carries owned strings rather than source errors so the type
//! is `Clone`. A coalesced refresh hands the same outcome to every waiter,
//! which requires cloning the error.

use serde::Deserialize;

/// Errors produced by session and API operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Credentials were rejected, or the refresh token is invalid/expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The backend rejected the payload (HTTP 400). Carries the body verbatim.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The retried request was still unauthorized after a successful refresh.
    #[error("request still unauthorized after token refresh")]
    AuthorizationRetryExhausted,

    /// The requested resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with existing state (HTTP 409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success status.
    #[error("unexpected response status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The outgoing payload could not be serialized.
    #[error("request encode failed: {0}")]
    Encode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

#[derive(Deserialize)]
struct DetailBody {
    detail: String,
}

/// Pull the `detail` message out of a DRF-style error body, falling back to
/// the raw body.
fn detail_message(body: &str) -> String {
    serde_json::from_str::<DetailBody>(body).map_or_else(|_| body.trim().to_owned(), |parsed| parsed.detail)
}

impl ApiError {
    /// Map a non-success HTTP status and its body onto the taxonomy.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::Validation(body),
            401 => Self::Authentication(detail_message(&body)),
            404 => Self::NotFound(detail_message(&body)),
            409 => Self::Conflict(detail_message(&body)),
            _ => Self::Status { status, body },
        }
    }

    /// Stable machine-readable code for the variant.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "E_AUTHENTICATION",
            Self::Validation(_) => "E_VALIDATION",
            Self::Network(_) => "E_NETWORK",
            Self::AuthorizationRetryExhausted => "E_AUTH_RETRY_EXHAUSTED",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Conflict(_) => "E_CONFLICT",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
            Self::Encode(_) => "E_ENCODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// Whether repeating the same call later could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
