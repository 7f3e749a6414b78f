//! Observability for cache operations: metric sinks and structured hit/miss logging.
//!
//! The engine emits three kinds of signal:
//!
//! - **Hit/miss counts** per cache tier (`cache_hit` / `cache_miss`), keyed by
//!   the stable cache-type names below.
//! - **Counters and durations** for computations and backend writes.
//! - **Structured log lines** at debug level, one JSON object per hit or miss:
//!   `{"cachehit":"<key>","cachetype":"<type>"}` /
//!   `{"cachemiss":"<key>","cachetype":"<type>"}`.
//!
//! Implement [`CacheMetrics`] to feed your monitoring system:
//!
//! ```ignore
//! use herd_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn cache_hit(&self, cache_type: &str) {
//!         // counter!("cache_hits", "type" => cache_type).increment(1);
//!     }
//!     // ... implement other methods
//! }
//!
//! // let cache = CacheService::builder(backend)
//! //     .with_metrics(Arc::new(PrometheusMetrics))
//! //     .build();
//! ```
//!
//! Default behavior (if not overridden) uses [`NoOpMetrics`]. Sinks must
//! never block; the engine calls them inline on hot paths.

use std::time::Duration;

// ============================================================================
// Stable metric names
// ============================================================================

/// Local coalescing tier: another caller already owns the computation.
pub const VALUE_CALCULATION_CACHE: &str = "value_calculation_cache";
/// Local coalescing tier of the stale path.
pub const STALE_VALUE_CALCULATION_CACHE: &str = "stale_value_calculation_cache";
/// Local-only mode while the backend reports unavailable.
pub const DISABLED_CACHE: &str = "disabled_cache";
/// Remote lookups against the stale-namespaced key.
pub const STALE_DISTRIBUTED_CACHE: &str = "stale_distributed_cache";
/// Remote lookups against the authoritative key.
pub const DISTRIBUTED_CACHE: &str = "distributed_cache";

/// Counter: backend writes issued (fresh and stale tiers).
pub const DISTRIBUTED_CACHE_WRITES: &str = "distributed_cache_writes";
/// Counter: user computations that completed successfully.
pub const VALUE_CALCULATION_SUCCESS: &str = "value_calculation_success";
/// Counter: user computations that failed.
pub const VALUE_CALCULATION_FAILURE: &str = "value_calculation_failure";

/// Duration: wall time of the user computation alone.
pub const VALUE_CALCULATION_TIME: &str = "value_calculation_time";
/// Duration: full generation, slot claim to settle.
pub const VALUE_CALCULATION: &str = "value_calculation";

/// Trait for cache metrics collection.
///
/// All methods have no-op-with-debug-log defaults, so implementors only
/// override what their sink cares about.
pub trait CacheMetrics: Send + Sync {
    /// Record a hit on one of the cache tiers.
    fn cache_hit(&self, cache_type: &str) {
        debug!("Cache HIT [{}]", cache_type);
    }

    /// Record a miss on one of the cache tiers.
    fn cache_miss(&self, cache_type: &str) {
        debug!("Cache MISS [{}]", cache_type);
    }

    /// Increment a named counter.
    fn increment_counter(&self, name: &str) {
        debug!("Counter {} += 1", name);
    }

    /// Record the duration of a named operation.
    fn set_duration(&self, name: &str, elapsed: Duration) {
        debug!("Duration {} = {:?}", name, elapsed);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn cache_hit(&self, _cache_type: &str) {}
    fn cache_miss(&self, _cache_type: &str) {}
    fn increment_counter(&self, _name: &str) {}
    fn set_duration(&self, _name: &str, _elapsed: Duration) {}
}

// ============================================================================
// Structured hit/miss log lines
// ============================================================================

/// Emit the structured JSON hit line for a key.
pub(crate) fn log_cache_hit(key: &str, cache_type: &str) {
    debug!(
        "{}",
        serde_json::json!({ "cachehit": key, "cachetype": cache_type })
    );
}

/// Emit the structured JSON miss line for a key.
pub(crate) fn log_cache_miss(key: &str, cache_type: &str) {
    debug!(
        "{}",
        serde_json::json!({ "cachemiss": key, "cachetype": cache_type })
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.cache_hit(VALUE_CALCULATION_CACHE);
        metrics.cache_miss(DISTRIBUTED_CACHE);
        metrics.increment_counter(DISTRIBUTED_CACHE_WRITES);
        metrics.set_duration(VALUE_CALCULATION_TIME, Duration::from_millis(5));
    }

    #[test]
    fn test_metric_names_are_stable() {
        // Dashboards key off these strings; lock them down.
        assert_eq!(VALUE_CALCULATION_CACHE, "value_calculation_cache");
        assert_eq!(STALE_VALUE_CALCULATION_CACHE, "stale_value_calculation_cache");
        assert_eq!(DISABLED_CACHE, "disabled_cache");
        assert_eq!(STALE_DISTRIBUTED_CACHE, "stale_distributed_cache");
        assert_eq!(DISTRIBUTED_CACHE, "distributed_cache");
        assert_eq!(DISTRIBUTED_CACHE_WRITES, "distributed_cache_writes");
        assert_eq!(VALUE_CALCULATION_SUCCESS, "value_calculation_success");
        assert_eq!(VALUE_CALCULATION_FAILURE, "value_calculation_failure");
        assert_eq!(VALUE_CALCULATION_TIME, "value_calculation_time");
        assert_eq!(VALUE_CALCULATION, "value_calculation");
    }

    #[test]
    fn test_structured_log_helpers_do_not_panic() {
        log_cache_hit("k", DISTRIBUTED_CACHE);
        log_cache_miss("k", STALE_DISTRIBUTED_CACHE);
    }
}
