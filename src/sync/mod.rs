//! Upstream course synchronization.
//!
//! - [`source`]: paginated upstream fetcher
//! - [`reconcile`]: two-way diff applied through the repository

pub mod reconcile;
pub mod source;

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::storage::CourseRepository;
use reconcile::run_reconciliation;
use source::{CourseSource, FetchOptions};

/// Shortest accepted interval between passes.
const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Run a reconciliation pass now and then every `interval` until shutdown.
///
/// A failed pass is logged and the next tick starts from scratch. A pass
/// in progress when shutdown fires is abandoned between repository calls.
pub async fn run_periodic<R, S>(
    repo: R,
    source: S,
    options: FetchOptions,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    R: CourseRepository,
    S: CourseSource,
{
    let mut ticker = tokio::time::interval(interval.max(MIN_SYNC_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut passes: u64 = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        tokio::select! {
            result = run_reconciliation(&repo, &source, options) => {
                passes += 1;
                match result {
                    Ok(report) => tracing::info!(
                        pass = passes,
                        fetched = report.fetched,
                        inserted = report.inserted,
                        deleted = report.deleted,
                        mode = ?report.mode,
                        "Course sync pass finished"
                    ),
                    Err(e) => tracing::error!(
                        pass = passes,
                        error = %e,
                        "Course sync pass failed, retrying on next tick"
                    ),
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("Shutdown during course sync pass, abandoning it");
                break;
            }
        }
    }

    tracing::info!(passes, "Course sync stopped");
}
