//! Composition root lifecycle.
//!
//! Tests:
//! - Clean run: store opened, worker drained on shutdown
//! - Failed startup after the store is open still drains the worker

mod common;

use courseload::app;
use courseload::config::Config;
use courseload::{Error, Store, StoreConfig};
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio_test::assert_ok;

/// The WAL file is removed once the last connection closes.
fn connection_closed(db_path: &Path) -> bool {
    let mut wal = db_path.as_os_str().to_owned();
    wal.push("-wal");
    !Path::new(&wal).exists()
}

#[tokio::test]
async fn test_run_drains_worker_on_shutdown() {
    common::init();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("app.db");

    let (_shutdown_tx, shutdown_rx) = watch::channel(true);
    assert_ok!(app::run(Config::test_config(db_path.clone()), shutdown_rx).await);

    assert!(db_path.exists());
    assert!(connection_closed(&db_path), "store connection still open after run");
}

#[tokio::test]
async fn test_startup_failure_still_drains_worker() {
    common::init();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("app.db");

    let mut config = Config::test_config(db_path.clone());
    config.update_courses = true;
    config.upstream_url = "not a url".into();

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let result = app::run(config, shutdown_rx).await;
    assert!(matches!(result, Err(Error::UpstreamFetch(_))));
    assert!(connection_closed(&db_path), "store connection still open after failed startup");

    // The database is immediately usable by a new store
    let (store, worker) = Store::open(&StoreConfig::new(&db_path)).unwrap();
    assert_eq!(store.course_count().await.unwrap(), 0);
    worker.shutdown().await.unwrap();
}
