//! Embedded widget contract
//!
//! The pool treats widgets as opaque: it creates them through a
//! [`WidgetFactory`], places them on a [`Surface`] and detaches them. It never
//! interprets the widget's own protocol. Readiness is reported through a
//! one-shot [`ReadySignal`] tagged with the handle generation it was issued
//! for, so a signal from a widget that has since been replaced is ignored.

use std::sync::Arc;

use tokio::sync::watch;

use super::config::EmbedOptions;

/// Where a widget is placed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Hidden warm-up area outside the viewport
    Offscreen,
    /// A visible container owned by a consuming view
    Container(String),
}

impl Surface {
    /// A named container surface
    pub fn container(id: impl Into<String>) -> Self {
        Surface::Container(id.into())
    }

    /// Whether this is the off-screen area
    pub fn is_offscreen(&self) -> bool {
        matches!(self, Surface::Offscreen)
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Offscreen => write!(f, "offscreen"),
            Surface::Container(id) => write!(f, "container:{}", id),
        }
    }
}

/// An externally hosted embedded widget
pub trait Widget: Send + 'static {
    /// Place the widget on a surface, moving it if already placed elsewhere
    fn attach(&mut self, surface: &Surface);

    /// Remove the widget from its surface and release what it holds
    fn detach(&mut self);

    /// Mute or unmute playback
    fn set_muted(&mut self, _muted: bool) {}
}

/// Creates widgets for a channel
///
/// Creation is fire-and-forget: it cannot fail synchronously. The widget
/// reports that it has finished loading through `ready`.
pub trait WidgetFactory: Send + Sync + 'static {
    /// Widget type produced
    type Widget: Widget;

    /// Create a widget for `channel`
    fn create(&self, channel: &str, options: &EmbedOptions, ready: ReadySignal) -> Self::Widget;
}

/// Readiness of the widget bound to a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    /// Generation of the current binding
    pub generation: u64,
    /// Current binding finished loading
    pub ready: bool,
    /// Handle left the pool
    pub retired: bool,
}

/// One-shot readiness notifier handed to a widget on creation
#[derive(Debug)]
pub struct ReadySignal {
    generation: u64,
    tx: Arc<watch::Sender<Readiness>>,
}

impl ReadySignal {
    pub(super) fn new(generation: u64, tx: Arc<watch::Sender<Readiness>>) -> Self {
        Self { generation, tx }
    }

    /// Generation this signal was issued for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report that the widget finished loading
    ///
    /// Returns false if the handle has been rebound or retired since the
    /// signal was issued; the notification is then discarded.
    pub fn notify(self) -> bool {
        let generation = self.generation;
        self.tx.send_if_modified(|state| {
            if state.generation == generation && !state.ready && !state.retired {
                state.ready = true;
                true
            } else {
                false
            }
        })
    }
}
