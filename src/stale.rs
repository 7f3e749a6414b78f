//! Stale-tier lookups.
//!
//! When a caller coalesces onto an in-flight computation and the stale tier
//! is enabled, it does not simply wait: it races a backend lookup of the
//! stale-namespaced key against the computation. The stale entry is written
//! before the authoritative one and outlives it, so a reader racing a
//! writer typically finds a stale hit and returns immediately with a
//! slightly-older value. When the stale key is absent the lookup degrades
//! to the fresh outcome rather than a miss.
//!
//! Stale lookups are themselves coalesced through their own bounded
//! promise table: one backend get per stale key at a time, fanned out to
//! every concurrent stale reader.

use crate::backend::BackendClient;
use crate::expander::{fetch_value, settle, CacheExpander, CacheValue};
use crate::observability::{self, CacheMetrics};
use crate::promise::PendingResult;
use crate::table::PromiseTable;
use std::sync::Arc;
use std::time::{Duration, Instant};

impl<V, B> CacheExpander<V, B>
where
    V: CacheValue,
    B: BackendClient + 'static,
{
    /// Resolve a coalesced caller through the stale tier.
    ///
    /// Claims `stale_key` in the stale table. A prior claim means another
    /// caller is already driving the stale lookup; join it. Otherwise spawn
    /// the driver: backend get on the stale key, falling back to mirroring
    /// `fresh` when the stale entry is absent or unreadable.
    pub(crate) async fn stale_lookup(
        &self,
        stale_key: String,
        fresh: PendingResult<V>,
    ) -> crate::error::Result<Option<V>> {
        let started = Instant::now();
        let promise = PendingResult::new();
        match self.stale_table.put_if_absent(&stale_key, promise.clone()) {
            Some(prior) => {
                self.metrics
                    .cache_hit(observability::STALE_VALUE_CALCULATION_CACHE);
                observability::log_cache_hit(
                    &stale_key,
                    observability::STALE_VALUE_CALCULATION_CACHE,
                );
                let outcome = prior.wait().await;
                self.metrics.set_duration(
                    observability::STALE_VALUE_CALCULATION_CACHE,
                    started.elapsed(),
                );
                outcome
            }
            None => {
                self.metrics
                    .cache_miss(observability::STALE_VALUE_CALCULATION_CACHE);
                observability::log_cache_miss(
                    &stale_key,
                    observability::STALE_VALUE_CALCULATION_CACHE,
                );

                let driver = StaleLookup {
                    backend: self.backend.clone(),
                    table: Arc::clone(&self.stale_table),
                    metrics: Arc::clone(&self.metrics),
                    promise: promise.clone(),
                    stale_key,
                    stale_get_timeout: self.config.effective_stale_get_timeout(),
                    remove_before_publish: self.config.remove_before_publish,
                };
                // Claim and spawn with no await in between, same discipline
                // as the fresh path.
                tokio::spawn(driver.run(fresh));
                promise.wait().await
            }
        }
    }
}

/// One stale-tier lookup, detached from the engine.
struct StaleLookup<V, B> {
    backend: B,
    table: Arc<PromiseTable<V>>,
    metrics: Arc<dyn CacheMetrics>,
    promise: PendingResult<V>,
    stale_key: String,
    stale_get_timeout: Duration,
    remove_before_publish: bool,
}

impl<V, B> StaleLookup<V, B>
where
    V: CacheValue,
    B: BackendClient + 'static,
{
    async fn run(self, fresh: PendingResult<V>) {
        let started = Instant::now();
        match fetch_value::<V, B>(&self.backend, &self.stale_key, self.stale_get_timeout).await {
            Some(value) => {
                self.metrics
                    .cache_hit(observability::STALE_DISTRIBUTED_CACHE);
                observability::log_cache_hit(
                    &self.stale_key,
                    observability::STALE_DISTRIBUTED_CACHE,
                );
                self.metrics.set_duration(
                    observability::STALE_DISTRIBUTED_CACHE,
                    started.elapsed(),
                );
                settle(
                    &self.table,
                    &self.stale_key,
                    &self.promise,
                    Ok(Some(value)),
                    self.remove_before_publish,
                );
            }
            None => {
                self.metrics
                    .cache_miss(observability::STALE_DISTRIBUTED_CACHE);
                observability::log_cache_miss(
                    &self.stale_key,
                    observability::STALE_DISTRIBUTED_CACHE,
                );

                // No stale entry: degrade to whatever the in-flight fresh
                // computation produces, success or failure alike.
                let outcome = fresh.wait().await;
                settle(
                    &self.table,
                    &self.stale_key,
                    &self.promise,
                    outcome,
                    self.remove_before_publish,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::config::CacheConfig;
    use crate::error::Error;
    use crate::serialization;
    use std::time::Duration;

    fn stale_cache() -> (CacheExpander<String, InMemoryBackend>, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let config = CacheConfig::default().with_stale_cache(Duration::from_secs(30));
        (
            CacheExpander::with_config(backend.clone(), config),
            backend,
        )
    }

    #[tokio::test]
    async fn test_stale_hit_served_from_backend() {
        let (cache, backend) = stale_cache();

        let bytes =
            serialization::serialize_for_cache(&"S".to_string()).expect("Failed to serialize");
        backend
            .set("stalea", bytes, None)
            .await
            .expect("Failed to seed stale key");

        // A fresh promise that never resolves: the stale hit must not need it.
        let fresh: PendingResult<String> = PendingResult::new();
        let value = cache
            .stale_lookup("stalea".to_string(), fresh)
            .await
            .expect("Stale lookup should succeed");
        assert_eq!(value, Some("S".to_string()));
        assert_eq!(cache.stale_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_stale_miss_chains_fresh_outcome() {
        let (cache, _backend) = stale_cache();

        let fresh: PendingResult<String> = PendingResult::new();
        let chained = fresh.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            chained.resolve(Some("F".to_string()));
        });

        let value = cache
            .stale_lookup("stalea".to_string(), fresh)
            .await
            .expect("Stale lookup should succeed");
        assert_eq!(value, Some("F".to_string()));
        handle.await.expect("Resolver task failed");
        assert_eq!(cache.stale_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_stale_miss_chains_fresh_failure() {
        let (cache, _backend) = stale_cache();

        let fresh: PendingResult<String> = PendingResult::new();
        fresh.fail(Error::Computation("upstream".to_string()));

        let result = cache.stale_lookup("stalea".to_string(), fresh).await;
        match result {
            Err(Error::Computation(msg)) => assert_eq!(msg, "upstream"),
            other => panic!("Expected chained failure, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_concurrent_stale_readers_coalesce() {
        let (cache, backend) = stale_cache();

        let bytes =
            serialization::serialize_for_cache(&"S".to_string()).expect("Failed to serialize");
        backend
            .set("stalea", bytes, None)
            .await
            .expect("Failed to seed stale key");

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = cache.clone();
            let fresh: PendingResult<String> = PendingResult::new();
            handles.push(tokio::spawn(async move {
                cache.stale_lookup("stalea".to_string(), fresh).await
            }));
        }
        for handle in handles {
            let value = handle
                .await
                .expect("Task failed")
                .expect("Stale lookup should succeed");
            assert_eq!(value, Some("S".to_string()));
        }
    }
}
