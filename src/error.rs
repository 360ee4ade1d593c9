//! Error types for the tunestream crate

use thiserror::Error;

/// Result type alias for tunestream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Error types that can occur while serving or preloading media
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Range not satisfiable for resource of {total} bytes")]
    RangeNotSatisfiable { total: u64 },

    #[error("Malformed Range header: {0}")]
    MalformedRange(String),

    #[error("Invalid resource path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Fetch of track '{track}' failed: {reason}")]
    UpstreamFetchFailure { track: String, reason: String },

    #[error("Music catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StreamError::NotFound(err.to_string()),
            _ => StreamError::IoError(err.to_string()),
        }
    }
}

impl StreamError {
    /// Convert error to HTTP status code
    ///
    /// Classification errors (not found, unsatisfiable range) become the
    /// matching 4xx status. A malformed range never reaches the client as an
    /// error because the responder degrades it to a full response; it is
    /// still mapped to 400 for callers that surface it directly.
    pub fn to_http_status(&self) -> u16 {
        match self {
            StreamError::NotFound(_) => 404,
            StreamError::InvalidPath(_) => 404,
            StreamError::RangeNotSatisfiable { .. } => 416,
            StreamError::MalformedRange(_) => 400,
            StreamError::ParseError(_) => 400,

            StreamError::UpstreamFetchFailure { .. } => 502,
            StreamError::HttpError(_) => 502,
            StreamError::CatalogUnavailable(_) => 503,

            StreamError::ConfigError(_) => 500,
            StreamError::IoError(_) => 500,
            StreamError::InternalError(_) => 500,
        }
    }

    /// Determine if this error is likely transient
    ///
    /// Used by the preload side to pick a log level: transient failures are
    /// expected on flaky networks, permanent ones usually point at a bad
    /// catalog entry.
    pub fn is_transient(&self) -> bool {
        match self {
            StreamError::HttpError(_) => true,
            StreamError::IoError(_) => true,
            StreamError::UpstreamFetchFailure { .. } => true,
            StreamError::CatalogUnavailable(_) => true,

            StreamError::ConfigError(_) => false,
            StreamError::NotFound(_) => false,
            StreamError::InvalidPath(_) => false,
            StreamError::RangeNotSatisfiable { .. } => false,
            StreamError::MalformedRange(_) => false,
            StreamError::ParseError(_) => false,
            StreamError::InternalError(_) => false,
        }
    }

    /// Create an UpstreamFetchFailure for a track
    pub fn fetch_failure(track: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::UpstreamFetchFailure {
            track: track.into(),
            reason: reason.into(),
        }
    }
}
