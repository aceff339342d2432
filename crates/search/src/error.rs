//! Error types for flight search operations.

use thiserror::Error;

/// Errors that can occur while authenticating with or querying a fare provider.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout(err.to_string())
        } else if err.is_decode() {
            SearchError::ParseError(err.to_string())
        } else {
            SearchError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::ParseError(err.to_string())
    }
}

impl From<url::ParseError> for SearchError {
    fn from(err: url::ParseError) -> Self {
        SearchError::RequestFailed(err.to_string())
    }
}

impl SearchError {
    /// Returns true for credential failures. These skip the rest of a route's
    /// searches rather than being treated as "no fare found".
    pub fn is_auth(&self) -> bool {
        matches!(self, SearchError::AuthenticationFailed(_))
    }
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;
