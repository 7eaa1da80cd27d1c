//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoCache;

/// Spawns a background task that periodically purges expired cache entries.
///
/// Expired entries are otherwise only dropped when touched or when stats
/// are read.
///
/// # Arguments
/// * `cache` - Cache handle to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task. Aborting it is the way to shut the
/// sweep down; the task holds a cache handle until then.
///
/// # Example
/// ```ignore
/// let cache: MemoCache<String> = MemoCache::default();
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<V>(cache: MemoCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiry sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
