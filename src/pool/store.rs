//! Embed pool implementation

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::PoolConfig;
use super::handle::{EmbedHandle, HandleId, Slot};
use super::widget::{Surface, Widget, WidgetFactory};
use crate::cache::{CacheConfig, ResourceCache};
use crate::error::{PoolError, Result};
use crate::stats::PoolStats;
use crate::sweep::Sweep;

/// Index priority of handles displayed by a consumer
const ACTIVE_PRIORITY: i32 = 1;
/// Index priority of parked handles
const IDLE_PRIORITY: i32 = 0;

#[derive(Debug, Default)]
struct Counters {
    created: u64,
    reused: u64,
    rebinds: u64,
    takeovers: u64,
    retired: u64,
}

struct PoolState<W> {
    slots: HashMap<HandleId, Slot<W>>,
    /// Channel to handle index. Its eviction rule (lowest priority, then
    /// LRU) is the pool's victim selection: parked handles before active
    /// ones, least recently used first.
    index: ResourceCache<String, HandleId>,
    next_id: u64,
    counters: Counters,
}

impl<W: Widget> PoolState<W> {
    /// Slot behind `handle`, provided it has not been rebound since the
    /// snapshot was taken
    fn current_slot(&mut self, handle: &EmbedHandle) -> Result<&mut Slot<W>> {
        let slot = self
            .slots
            .get_mut(&handle.id)
            .ok_or(PoolError::UnknownHandle(handle.id))?;

        if !slot.matches(handle) {
            return Err(PoolError::Stale(handle.id).into());
        }
        Ok(slot)
    }

    fn preloaded(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.preloaded && !slot.active)
            .count()
    }

    /// Move the handle bound to `from` over to `to`, inactive and unloaded
    fn rebind(&mut self, from: &str, to: &str, now: Instant) -> Option<HandleId> {
        let id = self.index.remove(&from.to_string())?;
        let slot = self.slots.get_mut(&id)?;

        slot.rebind(to, now);
        slot.active = false;
        slot.releasing = None;

        self.index.set(to.to_string(), id, Duration::MAX, IDLE_PRIORITY);
        self.counters.rebinds += 1;
        Some(id)
    }
}

/// Bounded pool of reusable embedded-widget handles keyed by channel
///
/// Operations on an existing handle take the [`EmbedHandle`] snapshot the
/// consumer was given. Once the handle has been rebound to another channel
/// those snapshots are stale: `release` ignores them and the other
/// operations fail with [`PoolError::Stale`].
///
/// Methods that start timers (`release`, `schedule_preload`) take
/// `self: &Arc<Self>`; everything else is synchronous.
pub struct EmbedPool<F: WidgetFactory> {
    state: Mutex<PoolState<F::Widget>>,
    factory: F,
    config: PoolConfig,
    pub(super) preload_task: Mutex<Option<JoinHandle<()>>>,
}

enum Placement {
    Reused,
    Created,
    Rebound { displaced: Option<String> },
}

impl<F: WidgetFactory> EmbedPool<F> {
    /// Create a pool with default configuration
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, PoolConfig::default())
    }

    /// Create a pool with custom configuration
    pub fn with_config(factory: F, config: PoolConfig) -> Self {
        let config = PoolConfig {
            pool_size: config.pool_size.max(1),
            ..config
        };
        let index = ResourceCache::with_config(CacheConfig::new(config.pool_size, Duration::MAX));

        Self {
            state: Mutex::new(PoolState {
                slots: HashMap::new(),
                index,
                next_id: 0,
                counters: Counters::default(),
            }),
            factory,
            config,
            preload_task: Mutex::new(None),
        }
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Obtain a handle displaying `channel`
    ///
    /// In order of preference:
    /// 1. the handle already bound to `channel` (no recreation)
    /// 2. a new handle, while the pool has room
    /// 3. the least recently used parked handle, rebound to `channel`
    /// 4. the least recently used active handle, taken over; its previous
    ///    consumer is not notified
    pub fn acquire(&self, channel: &str) -> Result<EmbedHandle> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let (id, placement) = self.place(state, channel, now, true)?;

        let slot = state
            .slots
            .get_mut(&id)
            .ok_or(PoolError::UnknownHandle(id))?;

        let was_active = slot.active;
        slot.activate(now);
        state.index.set_priority(&slot.channel, ACTIVE_PRIORITY);

        if !was_active && slot.widget.is_some() {
            let muted = self.config.display.muted;
            if let Some(widget) = slot.widget.as_mut() {
                widget.set_muted(muted);
            }
        }

        if slot.widget.is_none() && (self.config.eager_load || slot.visible) {
            slot.load(&self.factory, &self.config.display);
        }

        match placement {
            Placement::Reused => {
                state.counters.reused += 1;
                tracing::debug!(handle = %id, channel = channel, "Handle reused");
            }
            Placement::Created => {
                tracing::info!(handle = %id, channel = channel, "Handle created");
            }
            Placement::Rebound { displaced: None } => {
                tracing::info!(handle = %id, channel = channel, "Parked handle rebound");
            }
            Placement::Rebound {
                displaced: Some(previous),
            } => {
                tracing::warn!(
                    handle = %id,
                    channel = channel,
                    displaced = %previous,
                    "Active handle taken over"
                );
            }
        }

        Ok(slot.snapshot())
    }

    /// Find or make a slot for `channel`
    ///
    /// Creation and rebinding happen here; activation is left to the caller.
    /// With `allow_takeover` false an active handle is never displaced and
    /// `ResourceExhausted` is returned instead.
    fn place(
        &self,
        state: &mut PoolState<F::Widget>,
        channel: &str,
        now: Instant,
        allow_takeover: bool,
    ) -> Result<(HandleId, Placement)> {
        let key = channel.to_string();

        if let Some(&id) = state.index.get(&key) {
            return Ok((id, Placement::Reused));
        }

        if state.slots.len() < self.config.pool_size {
            let id = HandleId(state.next_id);
            state.next_id += 1;

            state.slots.insert(id, Slot::new(id, channel, now));
            state.index.set(key, id, Duration::MAX, IDLE_PRIORITY);
            state.counters.created += 1;

            return Ok((id, Placement::Created));
        }

        let exhausted = PoolError::ResourceExhausted {
            pool_size: self.config.pool_size,
        };

        let victim = state.index.victim().cloned().ok_or(exhausted.clone())?;
        let id = *state.index.peek(&victim).ok_or(exhausted.clone())?;
        let active = state.slots.get(&id).map(|slot| slot.active).ok_or(exhausted.clone())?;

        if active && !allow_takeover {
            return Err(exhausted.into());
        }

        let id = state.rebind(&victim, channel, now).ok_or(exhausted)?;
        let displaced = active.then_some(victim);
        if displaced.is_some() {
            state.counters.takeovers += 1;
        }

        Ok((id, Placement::Rebound { displaced }))
    }

    /// Release a handle after the configured grace delay
    ///
    /// Re-acquiring the same channel before the delay elapses cancels the
    /// release and returns the same handle untouched. Releasing a snapshot
    /// whose handle was taken over does nothing.
    pub fn release(self: &Arc<Self>, handle: &EmbedHandle) {
        let id = handle.id;
        let lease = {
            let mut state = self.state.lock();
            let slot = match state.current_slot(handle) {
                Ok(slot) => slot,
                Err(e) => {
                    tracing::debug!(handle = %id, channel = %handle.channel, error = %e, "Release ignored");
                    return;
                }
            };
            if !slot.active {
                return;
            }
            slot.begin_release()
        };

        let grace = self.config.release_grace;
        if grace.is_zero() {
            self.finish_release(id, lease);
            return;
        }

        let pool: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(pool) = pool.upgrade() {
                pool.finish_release(id, lease);
            }
        });
    }

    fn finish_release(&self, id: HandleId, lease: u64) {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(slot) = state.slots.get_mut(&id) else {
            return;
        };

        if slot.finish_release(lease, now) {
            state.index.set_priority(&slot.channel, IDLE_PRIORITY);
            state.index.touch(&slot.channel);
            tracing::debug!(handle = %id, channel = %slot.channel, "Handle parked");
        }
    }

    /// Warm a handle for `channel` off-screen without activating it
    ///
    /// Uses a free slot or rebinds a parked handle; never displaces an
    /// active one. Returns `None` when every handle is in use. Once
    /// `max_preloaded` parked handles are warm, the least recently warmed
    /// one is rebound instead of taking another slot. A channel that is
    /// already bound keeps its handle; a parked one that never loaded is
    /// loaded off-screen.
    pub fn preload(&self, channel: &str) -> Option<EmbedHandle> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let bound = state.index.peek(&channel.to_string()).is_some();
        let placed = if !bound && state.preloaded() >= self.config.max_preloaded {
            let oldest = state
                .slots
                .values()
                .filter(|slot| slot.preloaded && !slot.active)
                .min_by_key(|slot| (slot.last_used, slot.id))
                .map(|slot| slot.channel.clone());

            let Some(oldest) = oldest else {
                tracing::debug!(channel = channel, "Preloading disabled");
                return None;
            };
            let id = state.rebind(&oldest, channel, now)?;
            tracing::debug!(handle = %id, channel = channel, replaced = %oldest, "Oldest preload rebound");
            Ok((id, Placement::Rebound { displaced: None }))
        } else {
            self.place(state, channel, now, false)
        };

        let (id, placement) = match placed {
            Ok(placed) => placed,
            Err(e) => {
                tracing::debug!(channel = channel, error = %e, "Preload skipped");
                return None;
            }
        };

        let slot = state.slots.get_mut(&id)?;

        if matches!(placement, Placement::Reused) && (slot.active || slot.widget.is_some()) {
            return Some(slot.snapshot());
        }

        slot.surface = Surface::Offscreen;
        slot.preloaded = true;
        slot.load(&self.factory, &self.config.preload);

        tracing::debug!(handle = %id, channel = channel, "Handle preloaded");

        Some(slot.snapshot())
    }

    /// Place an active handle's widget on a surface
    pub fn attach(&self, handle: &EmbedHandle, surface: Surface) -> Result<EmbedHandle> {
        let mut state = self.state.lock();
        let slot = state.current_slot(handle)?;

        slot.place(surface, self.config.display.muted);
        Ok(slot.snapshot())
    }

    /// Report whether the handle's surface intersects the viewport
    ///
    /// The widget is created the first time the handle becomes visible.
    pub fn set_visible(&self, handle: &EmbedHandle, visible: bool) -> Result<EmbedHandle> {
        let mut state = self.state.lock();
        let slot = state.current_slot(handle)?;

        slot.visible = visible;
        if visible && slot.widget.is_none() {
            tracing::debug!(handle = %slot.id, channel = %slot.channel, "Viewport gate passed");
            slot.load(&self.factory, &self.config.display);
        }

        Ok(slot.snapshot())
    }

    /// Create the handle's widget regardless of visibility
    pub fn force_load(&self, handle: &EmbedHandle) -> Result<EmbedHandle> {
        let mut state = self.state.lock();
        let slot = state.current_slot(handle)?;

        let options = if slot.active {
            &self.config.display
        } else {
            &self.config.preload
        };
        slot.load(&self.factory, options);

        Ok(slot.snapshot())
    }

    /// Wait until the widget behind `handle` reports readiness
    ///
    /// Readiness of a widget replaced by a rebind is ignored. A rebind during
    /// the wait ends it with [`PoolError::Stale`].
    pub async fn wait_ready(&self, handle: &EmbedHandle, timeout: Duration) -> Result<()> {
        let id = handle.id;
        let generation = handle.generation;
        let mut rx = {
            let mut state = self.state.lock();
            state.current_slot(handle)?.readiness.subscribe()
        };

        let outcome = tokio::time::timeout(timeout, async {
            rx.wait_for(|state| state.retired || state.generation != generation || state.ready)
                .await
                .map(|state| *state)
        })
        .await;

        match outcome {
            Ok(Ok(state)) if state.retired => Err(PoolError::Retired(id).into()),
            Ok(Ok(state)) if state.generation != generation => Err(PoolError::Stale(id).into()),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(PoolError::Retired(id).into()),
            Err(_) => Err(PoolError::ReadyTimeout { handle: id, timeout }.into()),
        }
    }

    /// Whether `handle` still shows what it showed when the snapshot was
    /// taken (same channel and generation)
    pub fn is_current(&self, handle: &EmbedHandle) -> bool {
        let state = self.state.lock();
        state
            .slots
            .get(&handle.id)
            .map(|slot| slot.matches(handle))
            .unwrap_or(false)
    }

    /// Snapshot of a handle
    pub fn handle(&self, id: HandleId) -> Option<EmbedHandle> {
        self.state.lock().slots.get(&id).map(Slot::snapshot)
    }

    /// Snapshot of the handle bound to `channel`
    pub fn handle_for(&self, channel: &str) -> Option<EmbedHandle> {
        let state = self.state.lock();
        let id = state.index.peek(&channel.to_string())?;
        state.slots.get(id).map(Slot::snapshot)
    }

    /// Snapshots of every handle, ordered by id
    pub fn handles(&self) -> Vec<EmbedHandle> {
        let state = self.state.lock();
        let mut handles: Vec<EmbedHandle> = state.slots.values().map(Slot::snapshot).collect();
        handles.sort_by_key(|h| h.id);
        handles
    }

    /// Snapshots of handles whose current widget reported readiness,
    /// ordered by id
    pub fn ready_handles(&self) -> Vec<EmbedHandle> {
        let state = self.state.lock();
        let mut ready: Vec<EmbedHandle> = state
            .slots
            .values()
            .filter(|slot| slot.is_ready())
            .map(Slot::snapshot)
            .collect();
        ready.sort_by_key(|h| h.id);
        ready
    }

    /// Whether a parked, ready handle exists for `channel`
    pub fn is_preloaded(&self, channel: &str) -> bool {
        let state = self.state.lock();
        state
            .index
            .peek(&channel.to_string())
            .and_then(|id| state.slots.get(id))
            .map(|slot| !slot.active && slot.is_ready())
            .unwrap_or(false)
    }

    /// Retire parked handles idle longer than the configured threshold
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let stale: Vec<HandleId> = state
            .slots
            .values()
            .filter(|slot| !slot.active && now.saturating_duration_since(slot.last_used) > idle_timeout)
            .map(|slot| slot.id)
            .collect();

        for id in &stale {
            if let Some(mut slot) = state.slots.remove(id) {
                slot.retire();
                state.index.remove(&slot.channel);
                state.counters.retired += 1;
                tracing::info!(handle = %id, channel = %slot.channel, "Idle handle retired");
            }
        }

        stale.len()
    }

    /// Retire every handle and cancel scheduled preloads
    pub fn clear(&self) {
        if let Some(task) = self.preload_task.lock().take() {
            task.abort();
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let count = state.slots.len();

        for (_, mut slot) in state.slots.drain() {
            slot.retire();
        }
        state.index.clear();
        state.counters.retired += count as u64;

        tracing::info!(retired = count, "Pool cleared");
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let active = state.slots.values().filter(|slot| slot.active).count();

        PoolStats {
            total: state.slots.len(),
            active,
            idle: state.slots.len() - active,
            capacity: self.config.pool_size,
            created: state.counters.created,
            reused: state.counters.reused,
            rebinds: state.counters.rebinds,
            takeovers: state.counters.takeovers,
            retired: state.counters.retired,
        }
    }
}

impl<F: WidgetFactory> Drop for EmbedPool<F> {
    fn drop(&mut self) {
        if let Some(task) = self.preload_task.get_mut().take() {
            task.abort();
        }
    }
}

impl<F: WidgetFactory> Sweep for EmbedPool<F> {
    fn name(&self) -> &'static str {
        "embed-pool"
    }

    fn sweep(&self) -> usize {
        EmbedPool::sweep(self)
    }
}
