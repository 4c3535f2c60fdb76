//! Request de-duplicator implementation

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::config::{DedupConfig, RequestOptions};
use super::pattern::KeyPattern;
use super::retry::retry_with_backoff;
use crate::cache::ResourceCache;
use crate::stats::DedupStats;
use crate::sweep::Sweep;

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// An outstanding fetch for one key
struct InFlight<V, E> {
    /// Registration id; a settling fetch only writes the cache if it is
    /// still the registered one
    id: u64,
    future: SharedFetch<V, E>,
    started_at: Instant,
}

struct DedupState<V, E> {
    cache: ResourceCache<String, V>,
    in_flight: HashMap<String, InFlight<V, E>>,
    next_id: u64,
}

/// Collapses concurrent fetches for the same key into one and caches results
///
/// Each instance is explicitly constructed and owned by its scope (typically
/// one per application session, shared behind an `Arc`).
pub struct RequestDeduplicator<V, E> {
    state: Arc<Mutex<DedupState<V, E>>>,
    config: DedupConfig,
}

impl<V, E> RequestDeduplicator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + std::fmt::Display + Send + Sync + 'static,
{
    /// Create a de-duplicator with default configuration
    pub fn new() -> Self {
        Self::with_config(DedupConfig::default())
    }

    /// Create a de-duplicator with custom configuration
    pub fn with_config(config: DedupConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(DedupState {
                cache: ResourceCache::with_config(config.cache.clone()),
                in_flight: HashMap::new(),
                next_id: 0,
            })),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Get the value for `key`, fetching it if needed
    ///
    /// An outstanding fetch for `key` is always shared, even with
    /// `force_refresh`. Otherwise a live cached value is returned unless
    /// `force_refresh` is set, and only then is `fetcher` invoked (with
    /// retry). Every concurrent caller observes the same outcome.
    pub async fn get<F, Fut>(
        &self,
        key: impl Into<String>,
        fetcher: F,
        options: RequestOptions,
    ) -> Result<V, E>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let key = key.into();

        let future = {
            let mut state = self.state.lock();

            if let Some(in_flight) = state.in_flight.get(&key) {
                tracing::debug!(
                    key = %key,
                    pending_ms = in_flight.started_at.elapsed().as_millis() as u64,
                    "Joining in-flight fetch"
                );
                in_flight.future.clone()
            } else {
                if !options.force_refresh {
                    if let Some(value) = state.cache.get(&key) {
                        tracing::trace!(key = %key, "Cache hit");
                        return Ok(value.clone());
                    }
                }
                self.start_fetch(&mut state, key, fetcher, &options)
            }
        };

        future.await
    }

    /// Like [`get`](Self::get) but failures are logged and swallowed
    ///
    /// Does nothing if `key` is already cached or being fetched.
    pub async fn prefetch<F, Fut>(&self, key: impl Into<String>, fetcher: F, options: RequestOptions)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let key = key.into();

        {
            let state = self.state.lock();
            if state.cache.contains_key(&key) || state.in_flight.contains_key(&key) {
                return;
            }
        }

        if let Err(e) = self.get(key.clone(), fetcher, options).await {
            tracing::warn!(key = %key, error = %e, "Prefetch failed");
        }
    }

    /// Register and spawn a new fetch for `key`
    ///
    /// Called with the state lock held so that registration is atomic with
    /// the in-flight and cache checks that preceded it.
    fn start_fetch<F, Fut>(
        &self,
        state: &mut DedupState<V, E>,
        key: String,
        fetcher: F,
        options: &RequestOptions,
    ) -> SharedFetch<V, E>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let id = state.next_id;
        state.next_id += 1;

        let ttl = options.ttl.unwrap_or(self.config.cache.ttl);
        let policy = self.config.retry;
        let max_retries = options.max_retries.unwrap_or(policy.max_retries);
        let weak = Arc::downgrade(&self.state);
        let fetch_key = key.clone();

        let future = async move {
            let result = retry_with_backoff(&fetch_key, &policy, max_retries, fetcher).await;
            settle(&weak, &fetch_key, id, ttl, &result);
            result
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                future: future.clone(),
                started_at: Instant::now(),
            },
        );

        // Drive the fetch to completion even if every caller goes away
        tokio::spawn(future.clone());

        tracing::debug!(key = %key, fetch_id = id, max_retries = max_retries, "Fetch started");

        future
    }

    /// Remove cached entries and in-flight registrations matching `pattern`
    ///
    /// Callers already awaiting an in-flight fetch still receive its result,
    /// and a success still fills the cache unless a newer fetch for the key
    /// started in the meantime. Returns the number of cache entries removed.
    pub fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        let pattern = pattern.into();
        let mut state = self.state.lock();

        let removed = state.cache.remove_where(|key| pattern.matches(key)).len();
        let before = state.in_flight.len();
        state.in_flight.retain(|key, _| !pattern.matches(key));
        let detached = before - state.in_flight.len();

        tracing::debug!(
            pattern = %pattern,
            cached = removed,
            in_flight = detached,
            "Invalidated"
        );

        removed
    }

    /// Live cached value for `key`, without touching recency or statistics
    pub fn cached(&self, key: &str) -> Option<V> {
        self.state.lock().cache.peek(&key.to_string()).cloned()
    }

    /// Whether a fetch for `key` is outstanding
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    /// Remove expired cache entries
    pub fn sweep(&self) -> usize {
        let removed = self.state.lock().cache.sweep().len();
        if removed > 0 {
            tracing::debug!(removed = removed, "Request cache swept");
        }
        removed
    }

    /// Drop every cached value (in-flight fetches are untouched)
    pub fn clear(&self) {
        self.state.lock().cache.clear();
    }

    /// Get statistics
    pub fn stats(&self) -> DedupStats {
        let state = self.state.lock();
        DedupStats {
            cache: state.cache.stats(),
            in_flight: state.in_flight.len(),
        }
    }
}

/// Settle a finished fetch: deregister it and cache a success
///
/// A fetch deregistered by `invalidate` still caches its success for the
/// next reader. Once a newer fetch for the key is registered, the older
/// result only reaches its own waiters.
fn settle<V, E>(
    state: &Weak<Mutex<DedupState<V, E>>>,
    key: &str,
    id: u64,
    ttl: Duration,
    result: &Result<V, E>,
) where
    V: Clone,
{
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock();

    match state.in_flight.get(key).map(|f| f.id) {
        Some(current) if current == id => {
            state.in_flight.remove(key);
        }
        Some(newer) => {
            tracing::debug!(key = key, fetch_id = id, newer_id = newer, "Discarding superseded fetch result");
            return;
        }
        None => {}
    }

    if let Ok(value) = result {
        state.cache.set(key.to_string(), value.clone(), ttl, 0);
    }
}

impl<V, E> Default for RequestDeduplicator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + std::fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Sweep for RequestDeduplicator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + std::fmt::Display + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "request-cache"
    }

    fn sweep(&self) -> usize {
        RequestDeduplicator::sweep(self)
    }
}
