//! Cache telemetry background task.
//!
//! On every tick logs, per cache region, the entry count with hit and miss
//! rates, and exports the entry count as a gauge. Regions are only read.

use crate::cache::RegionStats;
use crate::observability::metrics::set_cache_entries;
use crate::routes::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Run until `cancel_token` is cancelled.
#[instrument(skip_all, name = "qs.task.cache_stats")]
pub async fn start_cache_stats_logger(
    state: Arc<AppState>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "qs.task.cache_stats",
        interval_seconds = interval.as_secs(),
        "Starting cache stats logger task"
    );

    let mut ticker = tokio::time::interval(interval);
    // The immediate first tick would only report empty regions.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                report(&state.cache_stats());
            }
            () = cancel_token.cancelled() => {
                info!(target: "qs.task.cache_stats", "Cache stats logger received shutdown signal, exiting");
                break;
            }
        }
    }

    info!(target: "qs.task.cache_stats", "Cache stats logger task stopped");
}

fn report(stats: &[RegionStats]) {
    for region in stats {
        set_cache_entries(region.name, region.entries);
        info!(
            target: "qs.task.cache_stats",
            region = region.name,
            entries = region.entries,
            max_entries = region.max_entries,
            hit_rate = %format!("{:.2}%", region.hit_rate()),
            miss_rate = %format!("{:.2}%", region.miss_rate()),
            "Cache statistics"
        );
    }
}
