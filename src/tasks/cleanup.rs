//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from
//! process-local maps (cache entries and rate-limit windows).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A process-local map whose expired entries can be swept.
pub trait Sweep: Send + Sync + 'static {
    /// Short name used in logs.
    fn label(&self) -> &'static str;

    /// Removes expired entries. Returns the number removed.
    fn sweep_expired(&self) -> usize;
}

/// Spawns a background task that sweeps `target` every `interval`.
///
/// The task runs until the returned handle is aborted; owners abort it on
/// shutdown.
///
/// # Example
/// ```ignore
/// let local = Arc::new(LocalStore::new(system_clock()));
/// let handle = spawn_cleanup_task(local.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<S: Sweep>(target: Arc<S>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            target_map = target.label(),
            interval_ms = interval.as_millis() as u64,
            "Starting expiry sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = target.sweep_expired();

            if removed > 0 {
                info!(target_map = target.label(), removed, "Expiry sweep removed entries");
            } else {
                debug!(target_map = target.label(), "Expiry sweep found nothing to remove");
            }
        }
    })
}
