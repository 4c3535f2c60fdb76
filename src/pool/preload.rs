//! Speculative preloading of neighbouring channels
//!
//! When a consumer focuses a channel in an ordered list, the channels next to
//! it are likely to be shown soon. After a debounce they are warmed off-screen
//! one at a time, never displacing a handle that is in use. Recently watched
//! channels are a second source of candidates.

use std::sync::{Arc, Weak};

use super::store::EmbedPool;
use super::widget::WidgetFactory;

/// Channels adjacent to `selected` in `channels`, next first, wrapping around
///
/// `selected` itself is never a candidate and duplicates are dropped. Returns
/// an empty list if `selected` is not in `channels`.
pub fn preload_candidates<S: AsRef<str>>(channels: &[S], selected: &str) -> Vec<String> {
    let Some(pos) = channels.iter().position(|c| c.as_ref() == selected) else {
        return Vec::new();
    };

    let len = channels.len();
    let next = channels[(pos + 1) % len].as_ref();
    let prev = channels[(pos + len - 1) % len].as_ref();

    let mut candidates: Vec<String> = Vec::with_capacity(2);
    for channel in [next, prev] {
        if channel != selected && !candidates.iter().any(|c| c == channel) {
            candidates.push(channel.to_string());
        }
    }
    candidates
}

impl<F: WidgetFactory> EmbedPool<F> {
    /// Preload `channels` after the configured debounce
    ///
    /// A new call cancels a schedule that has not finished yet. Channels are
    /// preloaded in order, spaced by the configured interval.
    pub fn schedule_preload(self: &Arc<Self>, channels: Vec<String>) {
        let delay = self.config().preload_delay;
        let spacing = self.config().preload_spacing;
        let pool: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            for (i, channel) in channels.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(spacing).await;
                }

                let Some(pool) = pool.upgrade() else {
                    return;
                };
                if pool.preload(channel).is_none() {
                    tracing::debug!(channel = %channel, "No free handle for preload");
                }
            }
        });

        if let Some(previous) = self.preload_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Up to `max` channels from `recent` (most recent first) that have no
    /// handle in the pool
    pub fn suggest_preload<S: AsRef<str>>(&self, recent: &[S], max: usize) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();

        for channel in recent.iter().map(AsRef::as_ref) {
            if suggestions.len() >= max {
                break;
            }
            if self.handle_for(channel).is_none() && !suggestions.iter().any(|s| s == channel) {
                suggestions.push(channel.to_string());
            }
        }
        suggestions
    }

    /// Preload the neighbours of `selected` in `channels`
    pub fn schedule_neighbors<S: AsRef<str>>(self: &Arc<Self>, channels: &[S], selected: &str) {
        let candidates = preload_candidates(channels, selected);
        if candidates.is_empty() {
            return;
        }

        tracing::debug!(selected = selected, candidates = ?candidates, "Scheduling preload");
        self.schedule_preload(candidates);
    }
}
