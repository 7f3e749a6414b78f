//! Error types for the cache client.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache client.
///
/// All cache operations return `Result<T>` where `Result` is defined as `std::result::Result<T, Error>`.
/// The engine only ever surfaces [`Error::Computation`] (and [`Error::Shutdown`]) through
/// the futures handed to callers; backend faults are logged and degraded, never raised.
///
/// Errors are `Clone` so a single computation failure can be fanned out to every
/// observer of the in-flight promise.
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a value to cache bytes.
    ///
    /// This occurs when the value's `Serde` implementation fails.
    /// Common causes:
    /// - Value contains non-serializable types
    /// - Postcard codec error
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a value.
    ///
    /// This indicates corrupted or malformed data in the remote cache.
    /// The engine treats such entries as misses and recomputes.
    DeserializationError(String),

    /// Backend storage error (memcached connection lost, protocol error, etc).
    ///
    /// Never propagated through caller futures: reads degrade to misses,
    /// writes are logged and dropped.
    BackendError(String),

    /// Operation exceeded a configured timeout threshold.
    ///
    /// Backend get/set/delete timeouts are folded into the miss/ignore
    /// handling of [`Error::BackendError`]; this variant is used when the
    /// timeout itself is the interesting fact (e.g. waiting on a remove).
    Timeout(String),

    /// Configuration error during client initialization.
    ///
    /// Common causes:
    /// - No backend servers specified
    /// - Connection pool creation failed
    ConfigError(String),

    /// The user-supplied computation failed.
    ///
    /// This is the only error kind that flows through the in-flight promise
    /// to every caller coalesced onto the same key.
    Computation(String),

    /// The cache was used after `shutdown()`.
    Shutdown,

    /// Invalid cache entry: corrupted envelope or bad magic.
    ///
    /// Returned by the codec when the entry header is not ours. The engine
    /// treats such entries as misses and recomputes.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    ///
    /// Expected during deployments that change cached types; the entry is
    /// treated as a miss and recomputed.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from the cached entry)
        found: u32,
    },

    /// Feature not implemented or not enabled.
    ///
    /// Common causes:
    /// - Cargo feature not enabled (e.g. "memcached" for MemcachedBackend)
    NotImplemented(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Computation(msg) => write!(f, "Computation failed: {}", msg),
            Error::Shutdown => write!(f, "Cache has been shut down"),
            Error::InvalidCacheEntry(msg) => {
                write!(f, "Invalid cache entry: {}", msg)
            }
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Computation("boom".to_string());
        assert_eq!(err.to_string(), "Computation failed: boom");
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_error_clone_for_fanout() {
        let err = Error::Computation("shared".to_string());
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_shutdown_display() {
        assert_eq!(Error::Shutdown.to_string(), "Cache has been shut down");
    }
}
