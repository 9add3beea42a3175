//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - File-backed store fixtures in a temporary directory
//! - Course builders
//! - Polling helper for asynchronous conditions

#![allow(dead_code)]

use courseload::{Course, Instructor, Meeting, OperationQueue, QueueConfig, Store, StoreConfig};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_SALT: &str = "test-salt";

/// Install the error-only test subscriber.
pub fn init() {
    courseload::observability::tracing::init_test_tracing();
}

/// Test fixture that owns a temporary database and its running store.
///
/// The directory is removed when the fixture is dropped.
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
    pub store: Store,
    worker: Option<OperationQueue>,
}

impl TestFixture {
    /// Open a fresh store with the default queue settings.
    pub fn new() -> Self {
        Self::with_queue(QueueConfig {
            capacity: 64,
            enqueue_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_queue(queue: QueueConfig) -> Self {
        init();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let config = StoreConfig {
            path: db_path.clone(),
            queue,
            open_attempts: 1,
            password_salt: TEST_SALT.into(),
        };
        let (store, worker) = Store::open(&config).expect("failed to open store");
        Self {
            temp_dir,
            db_path,
            store,
            worker: Some(worker),
        }
    }

    /// Stop the store worker and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.stop().await;
    }

    /// Stop the worker but keep the database directory for reopening.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown().await.expect("store shutdown failed");
        }
    }
}

/// A course with the given number of instructors and meetings.
pub fn course(crn: &str, instructors: usize, meetings: usize) -> Course {
    Course {
        term_crn: crn.to_string(),
        title: format!("Course {crn}"),
        subject_code: "CS".into(),
        course_number: "415".into(),
        section_number: "01".into(),
        description: format!("Description of {crn}"),
        instructors: (0..instructors)
            .map(|i| Instructor {
                last_name: format!("Last{i}"),
                first_name: format!("First{i}"),
                email: format!("instructor{i}@unh.edu"),
            })
            .collect(),
        meetings: (0..meetings)
            .map(|i| Meeting {
                days: "TR".into(),
                building: "Kingsbury".into(),
                room: format!("N{}", 100 + i),
                time: "1110-1230".into(),
            })
            .collect(),
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
