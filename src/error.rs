// Error types for asset publishing.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems detected before any request is sent. A run that hits one
/// of these does no partial work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("access token is missing or empty")]
    MissingToken,

    #[error("access token contains characters that cannot be sent in a header")]
    InvalidToken,

    #[error("API base must be an absolute http(s) URL, got {0:?}")]
    InvalidApiBase(String),

    #[error("repository {0} is not configured")]
    MissingField(&'static str),

    #[error("local directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no image files found in {}", .0.display())]
    NoAssets(PathBuf),

    #[error("nothing to publish")]
    EmptyBatch,
}

/// Errors while loading the configuration file or enumerating assets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Failure to build the asset list: either a precondition or a read error.
#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Io(#[from] ConfigError),
}

/// A classified failure of a single probe or write. Always scoped to one
/// file; the run records it and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Timeout, refused connection, DNS failure.
    #[error("network error: {0}")]
    Transport(String),

    #[error("authentication rejected ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The object changed remotely between probe and write.
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("store error ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unreadable response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Classify a non-success response. `rate_limit_exhausted` reflects the
    /// `x-ratelimit-remaining: 0` header, which GitHub pairs with a 403.
    pub fn from_status(status: u16, message: String, rate_limit_exhausted: bool) -> Self {
        match status {
            403 if rate_limit_exhausted => StoreError::RateLimited(message),
            401 | 403 => StoreError::Unauthorized { status, message },
            409 => StoreError::Conflict(message),
            413 => StoreError::PayloadTooLarge(message),
            422 if message.contains("sha") => StoreError::Conflict(message),
            429 => StoreError::RateLimited(message),
            _ => StoreError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}
