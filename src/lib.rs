//! Resource caching and pooling for expensive embedded widgets
//!
//! Four cooperating components, built bottom-up:
//!
//! - [`ResourceCache`]: keyed cache with TTL expiry, a capacity bound and
//!   priority-aware LRU eviction
//! - [`RequestDeduplicator`]: collapses concurrent fetches for one key into a
//!   single in-flight operation, caches results and retries with backoff
//! - [`EmbedPool`]: bounded pool of reusable embedded-widget handles keyed by
//!   channel, with viewport gating and speculative preloading
//! - [`ConnectionManager`]: keyed persistent connections with timeouts,
//!   linear-backoff reconnects and keep-alive probes
//!
//! Every component is an explicitly constructed value. None of them start
//! periodic timers; cleanup is exposed through [`Sweep`] and scheduled by the
//! application with [`spawn_sweeper`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use embedcache::{RequestDeduplicator, RequestOptions};
//!
//! # async fn example() {
//! let dedup: RequestDeduplicator<String, String> = RequestDeduplicator::new();
//!
//! let body = dedup
//!     .get(
//!         "news:latest",
//!         || async { Ok::<_, String>("headline".to_string()) },
//!         RequestOptions::new().ttl(Duration::from_secs(60)),
//!     )
//!     .await;
//! # }
//! ```

pub mod backoff;
pub mod cache;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod pool;
pub mod stats;
pub mod sweep;

pub use backoff::Backoff;
pub use cache::{CacheConfig, ResourceCache};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, Connector, Link, LinkEvent};
pub use dedup::{DedupConfig, KeyPattern, RequestDeduplicator, RequestOptions, RetryPolicy};
pub use error::{ConnectionError, Error, PoolError, Result};
pub use pool::{EmbedHandle, EmbedOptions, EmbedPool, HandleId, PoolConfig, Surface, Widget, WidgetFactory};
pub use stats::{CacheStats, DedupStats, PoolStats};
pub use sweep::{spawn_sweeper, Sweep};
