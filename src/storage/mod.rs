//! SQLite storage layer.
//!
//! Provides:
//! - Schema initialization and connection bootstrap
//! - Dedicated worker thread behind a bounded operation queue
//! - Course and user repository operations on [`Store`]

pub mod courses;
pub mod queue;
pub mod schema;
pub mod users;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::model::Course;
use queue::{OperationQueue, QueueConfig, QueueHandle};

/// Default number of attempts when opening the database file.
pub const DEFAULT_OPEN_ATTEMPTS: u32 = 5;

/// Configuration for opening the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
    /// Operation queue bounds
    pub queue: QueueConfig,
    /// Attempts made to open the database before giving up
    pub open_attempts: u32,
    /// Salt mixed into every password hash
    pub password_salt: String,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            queue: QueueConfig::default(),
            open_attempts: DEFAULT_OPEN_ATTEMPTS,
            password_salt: String::new(),
        }
    }
}

/// Repository over the course tables.
///
/// Every method submits its work through the operation queue; nothing here
/// touches the connection directly. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    queue: QueueHandle,
    password_salt: Arc<str>,
}

impl Store {
    /// Open the database and spawn its worker.
    ///
    /// The returned [`OperationQueue`] owns the worker and must be shut down
    /// by whoever constructed the store.
    pub fn open(config: &StoreConfig) -> Result<(Self, OperationQueue)> {
        let conn = schema::open_with_retry(&config.path, config.open_attempts)?;
        tracing::info!(path = %config.path.display(), "Store opened");
        Self::spawn(conn, config.queue, &config.password_salt)
    }

    /// Open a private in-memory database, mostly for tests.
    pub fn open_in_memory(queue: QueueConfig, password_salt: &str) -> Result<(Self, OperationQueue)> {
        Self::spawn(schema::open_in_memory()?, queue, password_salt)
    }

    fn spawn(
        conn: rusqlite::Connection,
        queue: QueueConfig,
        password_salt: &str,
    ) -> Result<(Self, OperationQueue)> {
        let worker = OperationQueue::spawn(conn, queue)?;
        let store = Self {
            queue: worker.handle(),
            password_salt: Arc::from(password_salt),
        };
        Ok((store, worker))
    }

    /// The queue this store submits through.
    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }
}

/// The course operations reconciliation depends on.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// All persisted CRNs.
    async fn course_crns(&self) -> Result<Vec<String>>;

    /// Insert or wholesale-replace a course and its children.
    async fn insert_course(&self, course: &Course) -> Result<()>;

    /// Delete a course and its children.
    async fn delete_course(&self, term_crn: &str) -> Result<()>;
}

#[async_trait]
impl CourseRepository for Store {
    async fn course_crns(&self) -> Result<Vec<String>> {
        Store::course_crns(self).await
    }

    async fn insert_course(&self, course: &Course) -> Result<()> {
        Store::insert_course(self, course).await
    }

    async fn delete_course(&self, term_crn: &str) -> Result<()> {
        Store::delete_course(self, term_crn).await
    }
}
