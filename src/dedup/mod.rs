//! In-flight request de-duplication with result caching and retry
//!
//! [`RequestDeduplicator`] wraps an arbitrary asynchronous fetch. Concurrent
//! callers for the same key share one underlying fetch; successful results
//! are cached for a TTL; failures are retried with exponential backoff and
//! the last error is handed back to every waiter.
//!
//! # Lookup order
//!
//! ```text
//!   get(key) ──► in-flight? ──yes──► await shared future
//!                   │ no
//!                   ▼
//!              cached & !force_refresh? ──yes──► return value
//!                   │ no
//!                   ▼
//!              spawn fetch (retry + backoff), register in-flight
//!                   │ settles
//!                   ▼
//!              remove in-flight, cache on success
//! ```

pub mod config;
pub mod pattern;
pub mod retry;
pub mod store;

pub use config::{DedupConfig, RequestOptions, RetryPolicy};
pub use pattern::KeyPattern;
pub use retry::retry_with_backoff;
pub use store::RequestDeduplicator;
