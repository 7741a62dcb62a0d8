//! Keeper Sweep Task
//!
//! Background task that periodically sweeps every cache in a keeper registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::keeper::Registry;

/// Spawns a background task that sweeps `registry` every `interval`.
///
/// The timer wait is raced against `shutdown`, so the task exits within one
/// tick of cancellation. Each pass runs on the blocking pool because it takes
/// every cache's write lock; a pass in flight finishes before the task exits.
///
/// # Example
/// ```ignore
/// let registry = Arc::new(Registry::new());
/// let shutdown = CancellationToken::new();
/// let handle = spawn_sweep_task(registry, Duration::from_secs(60), shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// handle.await?;
/// ```
pub fn spawn_sweep_task(
    registry: Arc<Registry>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting keeper sweep task with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let registry = Arc::clone(&registry);
                    if let Err(err) = tokio::task::spawn_blocking(move || registry.sweep()).await {
                        warn!("Keeper sweep pass failed: {}", err);
                    }
                }
            }
        }

        info!("Keeper sweep task stopped");
    })
}
