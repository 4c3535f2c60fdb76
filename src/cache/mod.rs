//! Keyed cache with TTL expiry and priority-aware LRU eviction
//!
//! [`ResourceCache`] is the leaf component that both the request
//! de-duplicator and the embed pool build on. It is a plain data structure:
//! no locking, no background tasks and no teardown of evicted values. Owners
//! wrap it in whatever synchronisation they need and release resources for
//! the values it hands back.
//!
//! # Eviction order
//!
//! ```text
//!   lowest priority first ──► oldest last_used within that priority
//!
//!   priority 0: [c (t=5)] [a (t=1)] ◄── victim
//!   priority 1: [b (t=0)]
//! ```
//!
//! Recency is tracked with a monotonic access sequence alongside the
//! timestamp, so two accesses in the same clock tick still order strictly.

pub mod config;
mod entry;
pub mod store;

pub use config::CacheConfig;
pub use store::ResourceCache;
