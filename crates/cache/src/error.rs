use thiserror::Error;

/// Errors returned by cache backends.
///
/// A missing or expired key is not an error; `get` returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("Cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// A stored value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client could not be created from its configuration.
    #[error("Cache connection error: {0}")]
    Connect(String),

    /// The cache was closed and no longer serves calls.
    #[error("Cache is closed")]
    Closed,
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
