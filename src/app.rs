//! Process composition root.
//!
//! Opens the store exactly once, runs the background course sync, and on
//! shutdown stops the sync before draining the store worker.

use tokio::sync::watch;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::Store;
use crate::sync::run_periodic;
use crate::sync::source::HttpCourseSource;

/// Run Courseload until `shutdown_rx` flips to `true`.
///
/// The store worker is drained before returning, whether or not startup
/// after opening the store succeeded.
pub async fn run(config: Config, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
    if config.password_salt.is_empty() {
        tracing::warn!("No password salt configured, password hashes are unsalted");
    }

    // Opening retries with blocking sleeps
    let store_config = config.store_config();
    let (store, worker) = tokio::task::spawn_blocking(move || Store::open(&store_config))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    let served = serve(&config, store, shutdown_rx).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "Courseload failed, stopping store worker");
    }

    tracing::info!("Shutting down store worker");
    let stopped = worker.shutdown().await;
    served?;
    stopped?;

    tracing::info!("Courseload stopped");
    Ok(())
}

async fn serve(config: &Config, store: Store, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
    tracing::info!(courses = store.course_count().await?, "Store ready");

    let sync_task = if config.update_courses {
        let source = HttpCourseSource::new(&config.upstream_url, &config.term)?;
        tracing::info!(
            endpoint = source.endpoint(),
            interval_secs = config.sync_interval_secs,
            "Starting course sync"
        );
        Some(tokio::spawn(run_periodic(
            store.clone(),
            source,
            config.fetch_options(),
            config.sync_interval(),
            shutdown_rx.clone(),
        )))
    } else {
        tracing::info!("Course sync disabled");
        None
    };

    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
    tracing::info!("Shutdown signal received");

    if let Some(task) = sync_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Course sync task failed");
        }
    }

    Ok(())
}
