//! Client configuration.
//!
//! [`CacheConfig`] is plain data: every knob of the engine in one place,
//! with defaults that match the behavior of a bare `CacheConfig::default()`
//! deployment. Builder-style `with_*` methods cover the common overrides.
//!
//! # Example
//!
//! ```
//! use herd_cache::config::CacheConfig;
//! use std::time::Duration;
//!
//! let config = CacheConfig::default()
//!     .with_time_to_live(Duration::from_secs(300))
//!     .with_stale_cache(Duration::from_secs(60))
//!     .with_key_prefix("app1:");
//! assert!(config.use_stale_cache);
//! ```

use std::time::Duration;

/// Default TTL written to the backend for fresh entries.
const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(60);

/// Default per-op timeout for backend gets.
const DEFAULT_BACKEND_GET_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default upper bound on waiting for a backend set to be acknowledged.
const DEFAULT_SET_WAIT_DURATION: Duration = Duration::from_secs(2);

/// Default bound on in-flight entries per promise table.
const DEFAULT_MAX_CAPACITY: usize = 1000;

/// Default namespace prefix for stale-tier keys.
const DEFAULT_STALE_PREFIX: &str = "stale";

/// Configuration for the cache engine.
///
/// All durations are wall-clock. TTLs are rounded down to whole seconds
/// when written to the backend; sub-second TTLs become 0 ("no expiry" in
/// the memcached convention).
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Expiry written to the backend for fresh entries.
    pub time_to_live: Duration,

    /// Extra lifetime for stale-tier entries on top of `time_to_live`.
    ///
    /// Zero means stale entries use `time_to_live` unchanged. The stale
    /// entry is meant to outlive the authoritative one, so a non-zero value
    /// is the useful setting whenever `use_stale_cache` is on.
    pub stale_ttl_additional: Duration,

    /// Per-op timeout for fresh-tier backend gets.
    pub backend_get_timeout: Duration,

    /// Per-op timeout for stale-tier backend gets. `None` = same as fresh.
    pub stale_backend_get_timeout: Option<Duration>,

    /// How long to wait for a backend set when `wait_for_set` is on.
    pub set_wait_duration: Duration,

    /// Whether `apply` waits for the backend set before publishing locally.
    ///
    /// Either way the computed value is published to waiters; this only
    /// decides whether publication is delayed until the write is
    /// acknowledged (or `set_wait_duration` elapses).
    pub wait_for_set: bool,

    /// How long `clear` waits for backend deletes/flushes. Zero = fire and
    /// forget. Milliseconds resolution on the wire.
    pub wait_for_remove: Duration,

    /// Enable the stale fallback tier.
    pub use_stale_cache: bool,

    /// Publish-vs-unclaim order on settle.
    ///
    /// `true`: the key is removed from the promise table, then the result
    /// is published — a caller arriving between the two starts a new
    /// generation. `false` (default): publish first, then remove — a
    /// late-arriving caller may still coalesce onto the finished promise.
    pub remove_before_publish: bool,

    /// Bound on concurrent in-flight entries in the fresh table.
    pub max_capacity: usize,

    /// Bound for the stale table. Zero = same as `max_capacity`.
    pub stale_max_capacity: usize,

    /// Optional application prefix folded into every canonical key.
    pub key_prefix: Option<String>,

    /// Whether `key_prefix` is hashed together with the user key
    /// (`hash(prefix ‖ key)`) or prepended to the hash (`prefix ‖ hash(key)`).
    pub hash_key_prefix: bool,

    /// Namespace prefix for stale-tier keys.
    pub stale_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            time_to_live: DEFAULT_TIME_TO_LIVE,
            stale_ttl_additional: Duration::ZERO,
            backend_get_timeout: DEFAULT_BACKEND_GET_TIMEOUT,
            stale_backend_get_timeout: None,
            set_wait_duration: DEFAULT_SET_WAIT_DURATION,
            wait_for_set: false,
            wait_for_remove: Duration::ZERO,
            use_stale_cache: false,
            remove_before_publish: false,
            max_capacity: DEFAULT_MAX_CAPACITY,
            stale_max_capacity: 0,
            key_prefix: None,
            hash_key_prefix: false,
            stale_prefix: DEFAULT_STALE_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Set the fresh-entry TTL.
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }

    /// Enable the stale tier with the given additional lifetime.
    pub fn with_stale_cache(mut self, additional_ttl: Duration) -> Self {
        self.use_stale_cache = true;
        self.stale_ttl_additional = additional_ttl;
        self
    }

    /// Set the fresh-tier backend get timeout.
    pub fn with_backend_get_timeout(mut self, timeout: Duration) -> Self {
        self.backend_get_timeout = timeout;
        self
    }

    /// Set a stale-tier backend get timeout distinct from the fresh one.
    pub fn with_stale_backend_get_timeout(mut self, timeout: Duration) -> Self {
        self.stale_backend_get_timeout = Some(timeout);
        self
    }

    /// Wait for backend sets (bounded by `set_wait_duration`) before
    /// publishing the computed value.
    pub fn with_wait_for_set(mut self, wait: Duration) -> Self {
        self.wait_for_set = true;
        self.set_wait_duration = wait;
        self
    }

    /// Wait up to `wait` for backend deletes/flushes issued by `clear`.
    pub fn with_wait_for_remove(mut self, wait: Duration) -> Self {
        self.wait_for_remove = wait;
        self
    }

    /// Unclaim the promise-table slot before publishing on settle.
    pub fn with_remove_before_publish(mut self) -> Self {
        self.remove_before_publish = true;
        self
    }

    /// Bound the fresh promise table.
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Bound the stale promise table independently of the fresh one.
    pub fn with_stale_max_capacity(mut self, capacity: usize) -> Self {
        self.stale_max_capacity = capacity;
        self
    }

    /// Fold an application prefix into every canonical key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Hash the key prefix together with the user key instead of
    /// prepending it to the hash.
    pub fn with_hashed_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self.hash_key_prefix = true;
        self
    }

    /// Override the stale-tier namespace prefix.
    pub fn with_stale_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.stale_prefix = prefix.into();
        self
    }

    /// Effective timeout for stale-tier backend gets.
    pub fn effective_stale_get_timeout(&self) -> Duration {
        self.stale_backend_get_timeout
            .unwrap_or(self.backend_get_timeout)
    }

    /// Effective TTL for stale-tier entries.
    pub fn effective_stale_ttl(&self) -> Duration {
        if self.stale_ttl_additional.is_zero() {
            self.time_to_live
        } else {
            self.time_to_live + self.stale_ttl_additional
        }
    }

    /// Effective bound for the stale promise table.
    pub fn effective_stale_capacity(&self) -> usize {
        if self.stale_max_capacity == 0 {
            self.max_capacity
        } else {
            self.stale_max_capacity
        }
    }
}
