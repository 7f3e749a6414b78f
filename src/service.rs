//! High-level cache handle for web applications.
//!
//! Provides a convenient wrapper around CacheExpander with Arc for easy sharing.

use crate::backend::BackendClient;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::expander::{CacheExpander, CacheValue, OperationConfig};
use std::future::Future;
use std::sync::Arc;

/// High-level cache handle for web applications.
///
/// Wraps [`CacheExpander`] in `Arc` for easy sharing across threads without
/// requiring external `Arc<Mutex<>>` wrappers.
///
/// # Design
///
/// The engine uses `&self` methods throughout and all shared state lives
/// behind its own synchronization, so a plain `Arc` is enough; cloning a
/// `CacheService` is one reference-count bump.
///
/// # Example
///
/// ```ignore
/// use herd_cache::{CacheService, backend::InMemoryBackend};
///
/// // Create the service (can be shared across threads)
/// let cache: CacheService<Profile, _> = CacheService::new(InMemoryBackend::new());
///
/// // In your web service struct
/// pub struct ProfileService {
///     cache: CacheService<Profile, InMemoryBackend>,
///     db: Arc<Database>,
/// }
///
/// impl ProfileService {
///     pub async fn profile(&self, id: &str) -> Result<Option<Profile>> {
///         let db = self.db.clone();
///         let id_owned = id.to_string();
///         self.cache
///             .apply(id, async move { db.load_profile(&id_owned).await })
///             .await
///     }
/// }
/// ```
pub struct CacheService<V, B: BackendClient> {
    expander: Arc<CacheExpander<V, B>>,
}

impl<V, B> Clone for CacheService<V, B>
where
    B: BackendClient,
{
    fn clone(&self) -> Self {
        CacheService {
            expander: Arc::clone(&self.expander),
        }
    }
}

impl<V, B> CacheService<V, B>
where
    V: CacheValue,
    B: BackendClient + 'static,
{
    /// Create a new cache service with the given backend and defaults.
    pub fn new(backend: B) -> Self {
        CacheService {
            expander: Arc::new(CacheExpander::new(backend)),
        }
    }

    /// Create a new cache service with the given configuration.
    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        CacheService {
            expander: Arc::new(CacheExpander::with_config(backend, config)),
        }
    }

    /// Wrap an already-built engine (e.g. one carrying custom metrics or a
    /// custom hasher).
    pub fn from_expander(expander: CacheExpander<V, B>) -> Self {
        CacheService {
            expander: Arc::new(expander),
        }
    }

    /// Compute-or-coalesce. See [`CacheExpander::apply`].
    pub async fn apply<Fut>(&self, key: &str, compute: Fut) -> Result<Option<V>>
    where
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        self.expander.apply(key, compute).await
    }

    /// Compute-or-coalesce with per-operation overrides.
    /// See [`CacheExpander::apply_with`].
    pub async fn apply_with<Fut>(
        &self,
        key: &str,
        compute: Fut,
        op: OperationConfig<V>,
    ) -> Result<Option<V>>
    where
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        self.expander.apply_with(key, compute, op).await
    }

    /// Read-only lookup. See [`CacheExpander::get`].
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        self.expander.get(key).await
    }

    /// Remove a key from the backend. See [`CacheExpander::clear`].
    pub async fn clear(&self, key: &str) -> Result<()> {
        self.expander.clear(key).await
    }

    /// Drop the in-flight tables and flush the backend.
    /// See [`CacheExpander::clear_all`].
    pub async fn clear_all(&self, wait_for_clear: bool) -> Result<()> {
        self.expander.clear_all(wait_for_clear).await
    }

    /// Shut the cache down (idempotent). See [`CacheExpander::shutdown`].
    pub fn shutdown(&self) {
        self.expander.shutdown();
    }

    /// Get a reference to the underlying engine.
    ///
    /// Use this if you need direct access to engine methods.
    pub fn expander(&self) -> &CacheExpander<V, B> {
        &self.expander
    }
}
