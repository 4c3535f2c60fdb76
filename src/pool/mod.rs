//! Bounded pool of embedded-widget handles
//!
//! Creating an embedded third-party player is expensive, so handles are kept
//! around and reused. Each handle is bound to at most one channel and each
//! channel to at most one handle.
//!
//! # Handle lifecycle
//!
//! ```text
//!              acquire                      release + grace
//!   (none) ──────────────► ACTIVE ─────────────────────────► PARKED
//!                            ▲  │ takeover (pool full,            │
//!                            │  │ no parked handle)               │
//!                            │  ▼                                 │
//!                          REBOUND ◄───── acquire other channel ──┘
//!                                                                 │
//!                          RETIRED ◄───── sweep (idle too long) ──┘
//! ```
//!
//! A takeover leaves the previous consumer holding a stale [`EmbedHandle`].
//! The pool compares the snapshot's generation with the slot's and refuses
//! to act on a stale one.
//!
//! Widgets are created lazily: the first time a handle's surface becomes
//! visible, on [`EmbedPool::force_load`], when preloading, or on acquisition
//! with `eager_load` set.

pub mod config;
pub mod handle;
pub mod preload;
pub mod store;
pub mod widget;

pub use config::{EmbedOptions, PoolConfig};
pub use handle::{EmbedHandle, HandleId};
pub use preload::preload_candidates;
pub use store::EmbedPool;
pub use widget::{ReadySignal, Readiness, Surface, Widget, WidgetFactory};
