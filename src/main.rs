//! Courseload: course section store with upstream reconciliation.
//!
//! # Usage
//!
//! ```bash
//! courseload --database ./data/courseload.db --queue-size 256 --log-level info
//! ```
//!
//! Environment variables can also be used:
//! - `COURSELOAD_DATABASE`: SQLite database file
//! - `COURSELOAD_QUEUE_SIZE`: Operation queue capacity
//! - `COURSELOAD_PASSWORD_SALT`: Salt for password hashes
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use courseload::app;
use courseload::config::Config;
use courseload::observability::metrics::init_metrics_with_endpoint;
use courseload::observability::tracing::init_tracing;
use std::fs;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Courseload v{}

  Configuration:
    Database:     {}
    Queue Size:   {}
    Course Sync:  {} (term {}, every {}s)
    Log Level:    {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.database.display(),
        config.queue_size,
        if config.update_courses { "on" } else { "off" },
        config.term,
        config.sync_interval_secs,
        config.log_level
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level, config.log_format);

    // Initialize metrics (with optional OTLP export)
    init_metrics_with_endpoint(config.otel_endpoint.as_deref());

    // Ensure the database directory exists
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    print_banner(&config);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("failed to listen for ctrl+c");
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = shutdown_tx.send(true);
    });

    app::run(config, shutdown_rx)
        .await
        .context("courseload exited with an error")?;

    tracing::info!("Courseload shutdown complete");
    Ok(())
}
