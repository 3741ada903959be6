//! Expiration Sweeper
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Shared;

/// Spawns a background task that periodically purges expired entries.
///
/// The task sleeps for the interval currently published on `interval`,
/// then locks the cache and removes everything past its deadline. A new
/// interval takes effect immediately; a zero interval pauses sweeping until a
/// non-zero one arrives.
///
/// The task ends when the interval sender is dropped, when the cache itself
/// is gone, or when the cache reports it has been destroyed.
///
/// # Arguments
/// * `shared` - Weak reference to the cache state
/// * `interval` - Receiver for the sweep period
/// * `runtime` - Runtime to spawn on
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort it.
pub(crate) fn spawn_sweeper<V>(
    shared: Weak<Shared<V>>,
    mut interval: watch::Receiver<Duration>,
    runtime: &Handle,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    runtime.spawn(async move {
        info!(
            interval_ms = interval.borrow().as_millis() as u64,
            "Starting expiration sweeper"
        );

        loop {
            let period = *interval.borrow_and_update();

            if period.is_zero() {
                debug!("Expiration sweeper paused");
                if interval.changed().await.is_err() {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                changed = interval.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    debug!(
                        interval_ms = interval.borrow().as_millis() as u64,
                        "Sweep interval changed"
                    );
                    continue;
                }
            }

            let Some(cache) = shared.upgrade() else {
                break;
            };
            match cache.sweep() {
                Some(0) => debug!("Expiration sweep: no expired entries found"),
                Some(removed) => info!(removed, "Expiration sweep: removed expired entries"),
                None => break,
            }
        }

        info!("Expiration sweeper stopped");
    })
}
