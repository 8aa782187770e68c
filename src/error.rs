use http::StatusCode;
use thiserror::Error;

/// The client's error type.
///
/// Consent/storage failures never surface here: the privacy manager absorbs
/// them and degrades to "no consent / no data" (see
/// [`crate::storage::StorageError`]). Everything a caller of the secure
/// client can observe is one of these variants.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A URL validation error (bad URL, wrong protocol, cross-origin).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A rate limit exceeded error. The message carries the remaining quota
    /// so callers can make backoff decisions.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// A network error from the underlying HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request timeout. The request was aborted after this many seconds.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A non-2xx HTTP response.
    #[error("API request failed with status {0}")]
    HttpStatus(StatusCode),

    /// A request/response serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A `Result` type that uses `ApiError` as the error type.
pub type Result<T> = std::result::Result<T, ApiError>;
