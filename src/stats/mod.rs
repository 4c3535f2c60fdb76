//! Diagnostic statistics
//!
//! Snapshots returned by the `stats()` query of each component. They are
//! intended for diagnostic surfaces and should not drive control flow.

pub mod metrics;

pub use metrics::{CacheStats, DedupStats, PoolStats};
