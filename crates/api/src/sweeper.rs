//! Background cache sweeper
//!
//! Expired cache rows are invisible to readers but still occupy space.
//! A periodic sweep deletes them in bulk; a missed or failed pass is
//! harmless since the next one covers the same ground.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use classdata_common::cache::CacheStore;
use classdata_common::metrics;

/// Spawn the periodic expiry sweep. The task runs until the shutdown
/// signal flips, then exits after the in-flight pass completes.
pub fn spawn_sweeper(
    cache: CacheStore,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Cache sweeper started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so startup is quiet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match cache.sweep_expired().await {
                        Ok(removed) => {
                            metrics::record_sweep(removed);
                            if removed > 0 {
                                debug!(removed, "Swept expired cache entries");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Cache sweep failed, will retry on next tick");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Cache sweeper shutting down");
                        break;
                    }
                }
            }
        }
    })
}
