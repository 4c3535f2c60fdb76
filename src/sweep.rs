//! Periodic sweeping
//!
//! Components expose their cleanup as an explicit [`Sweep::sweep`] and never
//! start timers of their own. The surrounding application decides whether to
//! run them on an interval with [`spawn_sweeper`] and owns the returned
//! handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A component with periodic cleanup
pub trait Sweep: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Remove expired or idle resources, returning how many were removed
    fn sweep(&self) -> usize;
}

/// Spawn a background task sweeping `target` every `interval`
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_sweeper<T: Sweep>(target: Arc<T>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = target.sweep();
            if removed > 0 {
                tracing::debug!(component = target.name(), removed = removed, "Sweep completed");
            }
        }
    })
}
