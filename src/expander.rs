//! Cache engine - request coalescing, two-tier lookup and write-back.
//!
//! [`CacheExpander`] is the main entry point for cache operations. For any
//! given key it guarantees at most one value-computation in flight locally:
//! the first caller claims a slot in the fresh promise table and drives a
//! *generation* (backend lookup, computation, write-back, publish); every
//! concurrent caller for the same key coalesces onto that generation's
//! pending result. With the stale tier enabled, coalesced callers instead
//! race a stale-namespace backend lookup against the in-flight computation.

use crate::backend::BackendClient;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::key::{IdentityHasher, KeyBuilder, KeyHasher};
use crate::observability::{self, CacheMetrics, NoOpMetrics};
use crate::promise::{Outcome, PendingResult};
use crate::serialization;
use crate::table::PromiseTable;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Bounds required of cached values.
///
/// Blanket-implemented; any `Clone + Serialize + DeserializeOwned` type that
/// can cross task boundaries qualifies.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Predicate deciding whether a computed value may be written to the backend.
pub type CanCache<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Configuration for per-operation overrides.
///
/// Overrides apply only when the calling operation ends up *owning* the
/// generation; a caller that coalesces onto an in-flight computation
/// inherits the owner's settings.
///
/// # Example
///
/// ```ignore
/// use herd_cache::OperationConfig;
/// use std::time::Duration;
///
/// let config = OperationConfig::default()
///     .with_ttl(Duration::from_secs(300))
///     .with_can_cache(|v: &String| !v.is_empty());
///
/// cache.apply_with("key", compute, config).await?;
/// ```
pub struct OperationConfig<V> {
    /// Override the configured `time_to_live` for this operation only.
    pub ttl_override: Option<Duration>,

    /// Override the engine-level cacheability predicate for this operation.
    pub can_cache: Option<CanCache<V>>,
}

impl<V> Default for OperationConfig<V> {
    fn default() -> Self {
        OperationConfig {
            ttl_override: None,
            can_cache: None,
        }
    }
}

impl<V> Clone for OperationConfig<V> {
    fn clone(&self) -> Self {
        OperationConfig {
            ttl_override: self.ttl_override,
            can_cache: self.can_cache.clone(),
        }
    }
}

impl<V> OperationConfig<V> {
    /// Override TTL for this operation.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }

    /// Override the cacheability predicate for this operation.
    pub fn with_can_cache<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.can_cache = Some(Arc::new(predicate));
        self
    }
}

/// Core cache engine - owns the promise tables and drives generations.
///
/// Cheap to clone once wrapped in [`crate::CacheService`]; for direct use,
/// build one per backend and share it behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// use herd_cache::{CacheExpander, backend::InMemoryBackend};
///
/// let cache: CacheExpander<String, _> = CacheExpander::new(InMemoryBackend::new());
/// let value = cache.apply("user_1", async { Ok(Some("bob".to_string())) }).await?;
/// ```
pub struct CacheExpander<V, B: BackendClient> {
    pub(crate) backend: B,
    pub(crate) fresh_table: Arc<PromiseTable<V>>,
    pub(crate) stale_table: Arc<PromiseTable<V>>,
    pub(crate) config: CacheConfig,
    pub(crate) keys: KeyBuilder,
    pub(crate) metrics: Arc<dyn CacheMetrics>,
    pub(crate) can_cache: CanCache<V>,
    shut_down: Arc<AtomicBool>,
}

impl<V, B> CacheExpander<V, B>
where
    V: CacheValue,
    B: BackendClient + 'static,
{
    /// Create a new engine with default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CacheConfig::default())
    }

    /// Create a new engine with the given configuration.
    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        let keys = KeyBuilder::new(
            Arc::new(IdentityHasher),
            config.key_prefix.clone(),
            config.hash_key_prefix,
            config.stale_prefix.clone(),
        );
        CacheExpander {
            backend,
            fresh_table: Arc::new(PromiseTable::new(config.max_capacity)),
            stale_table: Arc::new(PromiseTable::new(config.effective_stale_capacity())),
            keys,
            config,
            metrics: Arc::new(NoOpMetrics),
            can_cache: Arc::new(|_| true),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set a custom metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set a custom key hasher.
    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher>) -> Self {
        self.keys = KeyBuilder::new(
            hasher,
            self.config.key_prefix.clone(),
            self.config.hash_key_prefix,
            self.config.stale_prefix.clone(),
        );
        self
    }

    /// Set the engine-level cacheability predicate.
    ///
    /// Values for which this returns false are published to waiters but
    /// never written to the backend.
    pub fn with_can_cache<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.can_cache = Arc::new(predicate);
        self
    }

    /// Compute-or-coalesce: the primary operation.
    ///
    /// Exactly one concurrent caller per key owns the generation; the rest
    /// receive the same outcome (or, with the stale tier enabled, race a
    /// stale-namespace lookup against it). Dropping the returned future
    /// does not cancel the underlying computation.
    ///
    /// # Errors
    ///
    /// - `Error::Shutdown`: the cache was already shut down
    /// - whatever error the computation itself produced (fanned out to all
    ///   coalesced callers); backend faults are logged, never returned
    pub async fn apply<Fut>(&self, key: &str, compute: Fut) -> Result<Option<V>>
    where
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        self.apply_with(key, compute, OperationConfig::default())
            .await
    }

    /// [`apply`](Self::apply) with per-operation overrides.
    pub async fn apply_with<Fut>(
        &self,
        key: &str,
        compute: Fut,
        op: OperationConfig<V>,
    ) -> Result<Option<V>>
    where
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }

        let canonical = self.keys.canonical(key);
        let distributed = self.backend.is_available().await;
        let coalesce_type = if distributed {
            observability::VALUE_CALCULATION_CACHE
        } else {
            observability::DISABLED_CACHE
        };

        let started = Instant::now();
        let promise = PendingResult::new();
        match self.fresh_table.put_if_absent(&canonical, promise.clone()) {
            Some(prior) => {
                // Another caller owns the computation for this key.
                self.metrics.cache_hit(coalesce_type);
                observability::log_cache_hit(&canonical, coalesce_type);

                let outcome = if distributed && self.config.use_stale_cache {
                    let stale_key = self.keys.stale(&canonical);
                    self.stale_lookup(stale_key, prior).await
                } else {
                    prior.wait().await
                };
                self.metrics.set_duration(coalesce_type, started.elapsed());
                outcome
            }
            None => {
                // Claimed: this caller drives the generation.
                self.metrics.cache_miss(coalesce_type);
                observability::log_cache_miss(&canonical, coalesce_type);

                let stale_key = (distributed && self.config.use_stale_cache)
                    .then(|| self.keys.stale(&canonical));
                let generation = FreshGeneration {
                    backend: self.backend.clone(),
                    table: Arc::clone(&self.fresh_table),
                    config: self.config.clone(),
                    metrics: Arc::clone(&self.metrics),
                    promise: promise.clone(),
                    canonical,
                    stale_key,
                    ttl: op.ttl_override.unwrap_or(self.config.time_to_live),
                    can_cache: op
                        .can_cache
                        .unwrap_or_else(|| Arc::clone(&self.can_cache)),
                    distributed,
                };
                // No await between the claim above and this spawn: once the
                // slot is ours, the generation always runs to completion,
                // even if the caller drops the apply future.
                tokio::spawn(generation.run(compute));
                promise.wait().await
            }
        }
    }

    /// Read-only lookup: never schedules a computation.
    ///
    /// Joins the in-flight generation if one exists (through the stale tier
    /// when enabled), otherwise falls through to a backend get. Returns
    /// `Ok(None)` on miss.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }

        let canonical = self.keys.canonical(key);
        if let Some(pending) = self.fresh_table.get(&canonical) {
            self.metrics
                .cache_hit(observability::VALUE_CALCULATION_CACHE);
            observability::log_cache_hit(&canonical, observability::VALUE_CALCULATION_CACHE);

            if self.config.use_stale_cache && self.backend.is_available().await {
                let stale_key = self.keys.stale(&canonical);
                return self.stale_lookup(stale_key, pending).await;
            }
            return pending.wait().await;
        }

        if !self.backend.is_available().await {
            self.metrics.cache_miss(observability::DISABLED_CACHE);
            observability::log_cache_miss(&canonical, observability::DISABLED_CACHE);
            return Ok(None);
        }

        match fetch_value::<V, B>(&self.backend, &canonical, self.config.backend_get_timeout).await
        {
            Some(value) => {
                self.metrics.cache_hit(observability::DISTRIBUTED_CACHE);
                observability::log_cache_hit(&canonical, observability::DISTRIBUTED_CACHE);
                Ok(Some(value))
            }
            None => {
                self.metrics.cache_miss(observability::DISTRIBUTED_CACHE);
                observability::log_cache_miss(&canonical, observability::DISTRIBUTED_CACHE);
                Ok(None)
            }
        }
    }

    /// Remove a key from the backend (stale-tier entry first, then fresh).
    ///
    /// Deletes wait up to `wait_for_remove` each when configured; timeouts
    /// and backend errors are logged, never raised.
    pub async fn clear(&self, key: &str) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }

        let canonical = self.keys.canonical(key);
        if self.config.use_stale_cache {
            self.issue_delete(self.keys.stale(&canonical)).await;
        }
        self.issue_delete(canonical).await;
        Ok(())
    }

    /// Drop both in-flight tables and flush the backend.
    ///
    /// Blocks on the flush when `wait_for_clear` is set or `wait_for_remove`
    /// is non-zero.
    pub async fn clear_all(&self, wait_for_clear: bool) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }

        self.fresh_table.clear();
        self.stale_table.clear();

        if wait_for_clear || !self.config.wait_for_remove.is_zero() {
            if let Err(e) = self.backend.flush().await {
                warn!("Backend FLUSH failed: {}", e);
            }
        } else {
            let backend = self.backend.clone();
            tokio::spawn(async move {
                if let Err(e) = backend.flush().await {
                    warn!("Backend FLUSH failed: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Shut the cache down: clear both tables, release the backend client.
    ///
    /// Idempotent. In-flight generations complete normally but their
    /// results are no longer reachable through the cache; subsequent
    /// operations return [`Error::Shutdown`].
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.fresh_table.clear();
        self.stale_table.clear();
        self.backend.shutdown();
        info!("✓ Cache shut down");
    }

    /// Number of fresh-tier computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.fresh_table.len()
    }

    /// Number of stale-tier lookups currently in flight.
    pub fn stale_in_flight(&self) -> usize {
        self.stale_table.len()
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    async fn issue_delete(&self, key: String) {
        let wait = self.config.wait_for_remove;
        if wait.is_zero() {
            let backend = self.backend.clone();
            tokio::spawn(async move {
                if let Err(e) = backend.delete(&key).await {
                    warn!("Backend DELETE failed for {}: {}", key, e);
                }
            });
            return;
        }

        match timeout(wait, self.backend.delete(&key)).await {
            Ok(Ok(())) => debug!("✓ Backend DELETE {}", key),
            Ok(Err(e)) => warn!("Backend DELETE failed for {}: {}", key, e),
            Err(_) => warn!("Backend DELETE timed out for {} after {:?}", key, wait),
        }
    }
}

impl<V, B> Clone for CacheExpander<V, B>
where
    B: BackendClient,
{
    fn clone(&self) -> Self {
        CacheExpander {
            backend: self.backend.clone(),
            fresh_table: Arc::clone(&self.fresh_table),
            stale_table: Arc::clone(&self.stale_table),
            config: self.config.clone(),
            keys: self.keys.clone(),
            metrics: Arc::clone(&self.metrics),
            can_cache: Arc::clone(&self.can_cache),
            shut_down: Arc::clone(&self.shut_down),
        }
    }
}

// ============================================================================
// Generation driver
// ============================================================================

/// Everything one fresh-tier generation needs, detached from the engine so
/// it can outlive the caller inside its own task.
struct FreshGeneration<V, B> {
    backend: B,
    table: Arc<PromiseTable<V>>,
    config: CacheConfig,
    metrics: Arc<dyn CacheMetrics>,
    promise: PendingResult<V>,
    canonical: String,
    stale_key: Option<String>,
    ttl: Duration,
    can_cache: CanCache<V>,
    distributed: bool,
}

impl<V, B> FreshGeneration<V, B>
where
    V: CacheValue,
    B: BackendClient + 'static,
{
    async fn run<Fut>(self, compute: Fut)
    where
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        let generation_started = Instant::now();

        if self.distributed {
            if let Some(value) =
                fetch_value::<V, B>(&self.backend, &self.canonical, self.config.backend_get_timeout)
                    .await
            {
                // Backend hit short-circuits the computation entirely.
                self.metrics.cache_hit(observability::DISTRIBUTED_CACHE);
                observability::log_cache_hit(&self.canonical, observability::DISTRIBUTED_CACHE);
                self.metrics.set_duration(
                    observability::DISTRIBUTED_CACHE,
                    generation_started.elapsed(),
                );
                settle(
                    &self.table,
                    &self.canonical,
                    &self.promise,
                    Ok(Some(value)),
                    self.config.remove_before_publish,
                );
                return;
            }
            self.metrics.cache_miss(observability::DISTRIBUTED_CACHE);
            observability::log_cache_miss(&self.canonical, observability::DISTRIBUTED_CACHE);
        }

        let calculation_started = Instant::now();
        let outcome = compute.await;

        match &outcome {
            Ok(value) => {
                self.metrics
                    .increment_counter(observability::VALUE_CALCULATION_SUCCESS);
                self.metrics.set_duration(
                    observability::VALUE_CALCULATION_TIME,
                    calculation_started.elapsed(),
                );
                if self.distributed {
                    match value {
                        Some(v) if (self.can_cache)(v) => self.write_back(v).await,
                        Some(_) => debug!(
                            "Value for {} marked uncacheable, skipping backend write",
                            self.canonical
                        ),
                        None => debug!(
                            "Computation for {} produced no value, skipping backend write",
                            self.canonical
                        ),
                    }
                }
            }
            Err(e) => {
                self.metrics
                    .increment_counter(observability::VALUE_CALCULATION_FAILURE);
                warn!("Computation failed for {}: {}", self.canonical, e);
            }
        }

        settle(
            &self.table,
            &self.canonical,
            &self.promise,
            outcome,
            self.config.remove_before_publish,
        );
        self.metrics.set_duration(
            observability::VALUE_CALCULATION,
            generation_started.elapsed(),
        );
    }

    /// Write the computed value back to the backend.
    ///
    /// The stale-tier write is always issued before the authoritative one.
    /// With `wait_for_set` off the writes run in their own task so the
    /// in-memory publish is never delayed; either way set failures and
    /// timeouts are logged and swallowed.
    async fn write_back(&self, value: &V) {
        let bytes = match serialization::serialize_for_cache(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping backend write for {}: {}", self.canonical, e);
                return;
            }
        };
        let stale_ttl = self.config.effective_stale_ttl();

        if self.config.wait_for_set {
            let wait = Some(self.config.set_wait_duration);
            if let Some(stale_key) = &self.stale_key {
                issue_set(&self.backend, &self.metrics, stale_key, bytes.clone(), stale_ttl, wait)
                    .await;
            }
            issue_set(&self.backend, &self.metrics, &self.canonical, bytes, self.ttl, wait).await;
        } else {
            let backend = self.backend.clone();
            let metrics = Arc::clone(&self.metrics);
            let canonical = self.canonical.clone();
            let stale_key = self.stale_key.clone();
            let ttl = self.ttl;
            tokio::spawn(async move {
                if let Some(stale_key) = &stale_key {
                    issue_set(&backend, &metrics, stale_key, bytes.clone(), stale_ttl, None).await;
                }
                issue_set(&backend, &metrics, &canonical, bytes, ttl, None).await;
            });
        }
    }
}

// ============================================================================
// Shared helpers (fresh and stale paths)
// ============================================================================

/// Publish the outcome and unclaim the table slot in the configured order.
///
/// `remove_before_publish = true`: a caller arriving between the remove and
/// the publish misses the promise and starts a new generation. `false`: a
/// late caller may still coalesce onto the already-resolved promise.
pub(crate) fn settle<V: CacheValue>(
    table: &PromiseTable<V>,
    key: &str,
    promise: &PendingResult<V>,
    outcome: Outcome<V>,
    remove_before_publish: bool,
) {
    if remove_before_publish {
        table.remove(key);
        promise.complete(outcome);
    } else {
        promise.complete(outcome);
        table.remove(key);
    }
}

/// Backend get folded to `Option<V>`: timeouts, transport errors and
/// undecodable entries are all misses (logged at WARN).
pub(crate) async fn fetch_value<V, B>(backend: &B, key: &str, wait: Duration) -> Option<V>
where
    V: CacheValue,
    B: BackendClient,
{
    match timeout(wait, backend.get(key)).await {
        Ok(Ok(Some(bytes))) => match serialization::deserialize_from_cache::<V>(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable entry at {}: {}", key, e);
                None
            }
        },
        Ok(Ok(None)) => None,
        Ok(Err(e)) => {
            warn!("Backend GET failed for {}: {}", key, e);
            None
        }
        Err(_) => {
            warn!("Backend GET timed out for {} after {:?}", key, wait);
            None
        }
    }
}

/// Issue one backend set, optionally bounded by a wait duration.
async fn issue_set<B: BackendClient>(
    backend: &B,
    metrics: &Arc<dyn CacheMetrics>,
    key: &str,
    bytes: Vec<u8>,
    ttl: Duration,
    wait: Option<Duration>,
) {
    metrics.increment_counter(observability::DISTRIBUTED_CACHE_WRITES);
    let result = match wait {
        Some(wait) => match timeout(wait, backend.set(key, bytes, Some(ttl))).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Backend SET timed out for {} after {:?}", key, wait);
                return;
            }
        },
        None => backend.set(key, bytes, Some(ttl)).await,
    };
    match result {
        Ok(()) => debug!("✓ Backend SET {} (TTL: {:?})", key, ttl),
        Err(e) => warn!("Backend SET failed for {}: {}", key, e),
    }
}
