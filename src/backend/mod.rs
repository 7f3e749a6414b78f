//! Backend client implementations.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "memcached")]
pub mod memcached;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};

/// Typed client for the remote key/value cache.
///
/// The engine consumes this narrow interface and nothing else; the wire
/// protocol, connection pooling and node discovery all live behind it.
///
/// **IMPORTANT:** All methods use `&self` to allow concurrent access.
/// Implementations should use interior mutability (pools, DashMap, etc.)
/// and be cheap to `Clone` — the engine clones the client into spawned
/// computation drivers.
///
/// Error contract: the engine logs backend errors and degrades (reads
/// become misses, writes are dropped); it never propagates them to caller
/// futures. Implementations should return `Err` rather than panic.
#[async_trait]
pub trait BackendClient: Send + Sync + Clone {
    /// Retrieve value bytes by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Cache miss (key not found)
    ///
    /// # Errors
    /// Returns `Err` on backend failure (connection lost, protocol error).
    /// Callers apply their own timeout around this future.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value bytes with optional TTL.
    ///
    /// TTL is encoded as non-negative whole seconds on the wire; values
    /// under one second truncate to 0, which memcached reads as "no
    /// expiry". `None` also means no expiry.
    ///
    /// # Errors
    /// Returns `Err` on backend failure.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key.
    ///
    /// # Errors
    /// Returns `Err` on backend failure.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Drop every entry the backend holds (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if the operation is not supported or fails.
    async fn flush(&self) -> Result<()>;

    /// Whether the backend is currently reachable.
    ///
    /// May flip false transiently; the engine reroutes to local-only
    /// coalescing while it is false.
    async fn is_available(&self) -> bool {
        true
    }

    /// Release client resources (connection pools, sockets).
    ///
    /// Called once by the cache on shutdown, after the in-flight tables
    /// have been cleared.
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_default_availability() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_available().await);
    }
}
