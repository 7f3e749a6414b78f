//! # herd-cache
//!
//! A herd-protected, request-coalescing cache client for memcached-compatible backends.
//!
//! ## Features
//!
//! - **Single-flight:** At most one value-computation in flight per key, no
//!   matter how many concurrent callers demand it
//! - **Stale fallback:** Optional second tier serving a slightly-older copy
//!   while the fresh value is being computed
//! - **Backend Agnostic:** In-memory, Memcached, or any custom [`BackendClient`]
//! - **Fault Tolerant:** Backend outages degrade to local coalescing; backend
//!   errors never reach caller futures
//! - **Production Ready:** Built-in logging, metrics hooks, bounded in-flight tables
//!
//! ## Quick Start
//!
//! ```ignore
//! use herd_cache::{CacheService, backend::InMemoryBackend};
//!
//! #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! struct Profile {
//!     id: String,
//!     name: String,
//! }
//!
//! // 1. Create the cache (Clone is cheap - share it freely)
//! let cache: CacheService<Profile, _> = CacheService::new(InMemoryBackend::new());
//!
//! // 2. Wrap expensive lookups in apply(): concurrent callers for the same
//! //    key share one computation and one backend write.
//! let profile = cache
//!     .apply("profile_42", async move {
//!         let profile = load_profile_from_db("42").await?;
//!         Ok(profile)
//!     })
//!     .await?;
//! ```
//!
//! ## Stale tier
//!
//! With the stale tier enabled, a caller that arrives while a computation is
//! already running does not wait for it blindly: it first checks the
//! stale-namespaced backend entry, which is written before the fresh entry
//! and configured to outlive it. Callers get "a reasonably recent value,
//! fast" and the upstream computation sees one request instead of a herd.
//!
//! ```ignore
//! use herd_cache::config::CacheConfig;
//! use std::time::Duration;
//!
//! let config = CacheConfig::default()
//!     .with_time_to_live(Duration::from_secs(60))
//!     .with_stale_cache(Duration::from_secs(30)); // stale entries live 90s
//! let cache: CacheService<Profile, _> = CacheService::with_config(backend, config);
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod error;
pub mod expander;
pub mod key;
pub mod observability;
pub mod promise;
pub mod serialization;
pub mod service;
pub mod stale;
pub mod table;

// Re-exports for convenience
pub use backend::BackendClient;
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use expander::{CacheExpander, CacheValue, CanCache, OperationConfig};
pub use key::{IdentityHasher, KeyHasher};
pub use observability::CacheMetrics;
pub use promise::PendingResult;
pub use service::CacheService;
pub use table::PromiseTable;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
