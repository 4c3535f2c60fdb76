//! Pooled handle types
//!
//! A [`Slot`] is the pool's private record of one widget. Consumers only see
//! [`EmbedHandle`] snapshots and hand them back to the pool, which checks
//! them against the slot's current binding.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use super::config::EmbedOptions;
use super::widget::{ReadySignal, Readiness, Surface, Widget, WidgetFactory};

/// Identifier of a pooled handle, stable across rebinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub(crate) u64);

impl HandleId {
    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "embed-{}", self.0)
    }
}

/// Snapshot of a pooled handle
///
/// The pool owns the underlying widget; a consumer holds this snapshot only
/// while the handle is active for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedHandle {
    /// Handle identifier
    pub id: HandleId,
    /// Channel the handle is bound to
    pub channel: String,
    /// Whether a consumer is displaying the handle
    pub is_active: bool,
    /// Whether the widget has been created (viewport gate passed)
    pub is_loaded: bool,
    /// Whether the current widget reported readiness
    pub is_ready: bool,
    /// Last acquisition or release
    pub last_used: Instant,
    /// Surface the widget is placed on
    pub surface: Surface,
    /// Binding generation; changes on every rebind
    pub generation: u64,
}

/// The pool's record of one widget
pub(super) struct Slot<W> {
    pub id: HandleId,
    pub channel: String,
    pub active: bool,
    /// Lease token of a pending release, if any
    pub releasing: Option<u64>,
    /// Bumped on every acquisition and release; a grace timer only
    /// deactivates if its token is still current
    pub lease: u64,
    pub last_used: Instant,
    pub surface: Surface,
    /// Hosting surface intersects the viewport
    pub visible: bool,
    pub widget: Option<W>,
    /// Warmed speculatively and not acquired since
    pub preloaded: bool,
    pub generation: u64,
    pub readiness: Arc<watch::Sender<Readiness>>,
}

impl<W: Widget> Slot<W> {
    pub fn new(id: HandleId, channel: &str, now: Instant) -> Self {
        let (tx, _) = watch::channel(Readiness::default());

        Self {
            id,
            channel: channel.to_string(),
            active: false,
            releasing: None,
            lease: 0,
            last_used: now,
            surface: Surface::Offscreen,
            visible: false,
            widget: None,
            preloaded: false,
            generation: 0,
            readiness: Arc::new(tx),
        }
    }

    pub fn snapshot(&self) -> EmbedHandle {
        let readiness = *self.readiness.borrow();

        EmbedHandle {
            id: self.id,
            channel: self.channel.clone(),
            is_active: self.active,
            is_loaded: self.widget.is_some(),
            is_ready: readiness.ready && readiness.generation == self.generation,
            last_used: self.last_used,
            surface: self.surface.clone(),
            generation: self.generation,
        }
    }

    pub fn is_ready(&self) -> bool {
        let readiness = self.readiness.borrow();
        readiness.ready && readiness.generation == self.generation
    }

    /// Whether `handle` was taken from this slot's current binding
    pub fn matches(&self, handle: &EmbedHandle) -> bool {
        self.id == handle.id && self.generation == handle.generation && self.channel == handle.channel
    }

    /// Mark active for a new consumer, cancelling any pending release
    pub fn activate(&mut self, now: Instant) {
        self.active = true;
        self.preloaded = false;
        self.releasing = None;
        self.lease += 1;
        self.last_used = now;
    }

    /// Start a release; returns the lease token the grace timer must present
    pub fn begin_release(&mut self) -> u64 {
        self.lease += 1;
        self.releasing = Some(self.lease);
        self.lease
    }

    /// Finish a release if `lease` is still current
    pub fn finish_release(&mut self, lease: u64, now: Instant) -> bool {
        if self.releasing != Some(lease) || self.lease != lease {
            return false;
        }

        self.active = false;
        self.releasing = None;
        self.last_used = now;
        self.visible = false;
        self.surface = Surface::Offscreen;
        if let Some(widget) = self.widget.as_mut() {
            widget.set_muted(true);
            widget.attach(&Surface::Offscreen);
        }
        true
    }

    /// Create the widget and place it on the current surface
    pub fn load<F>(&mut self, factory: &F, options: &EmbedOptions)
    where
        F: WidgetFactory<Widget = W>,
    {
        if self.widget.is_some() {
            return;
        }

        let signal = ReadySignal::new(self.generation, Arc::clone(&self.readiness));
        let mut widget = factory.create(&self.channel, options, signal);
        widget.attach(&self.surface);
        self.widget = Some(widget);
    }

    /// Move the widget to a surface
    pub fn place(&mut self, surface: Surface, muted: bool) {
        self.surface = surface;
        if let Some(widget) = self.widget.as_mut() {
            widget.attach(&self.surface);
            widget.set_muted(muted);
        }
    }

    /// Discard the current widget and bind to another channel
    ///
    /// Readiness is reset for the new generation, so a late signal from the
    /// discarded widget is ignored.
    pub fn rebind(&mut self, channel: &str, now: Instant) {
        self.teardown();
        self.channel = channel.to_string();
        self.generation += 1;
        self.preloaded = false;
        self.surface = Surface::Offscreen;
        self.visible = false;
        self.last_used = now;
        self.readiness.send_replace(Readiness {
            generation: self.generation,
            ready: false,
            retired: false,
        });
    }

    /// Detach and drop the widget
    pub fn teardown(&mut self) {
        if let Some(mut widget) = self.widget.take() {
            widget.detach();
        }
    }

    /// Tear down for good and wake anyone waiting on readiness
    pub fn retire(&mut self) {
        self.teardown();
        self.active = false;
        self.releasing = None;
        self.readiness.send_modify(|state| state.retired = true);
    }
}
