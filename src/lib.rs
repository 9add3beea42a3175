//! Courseload: course section storage and upstream reconciliation.
//!
//! All access to the embedded SQLite store is serialized through a single
//! worker thread fed by a bounded operation queue. A reconciliation pass
//! periodically converges the stored courses to the upstream course API.
//!
//! # Architecture
//!
//! - **Single Writer**: one thread owns the connection, operations run FIFO
//! - **Backpressure**: a full queue fails submissions after a bounded wait
//! - **Transactional Repository**: multi-row writes commit as one operation
//! - **Two-Way Diff**: reconciliation inserts what's new, deletes what's gone
//!
//! # Modules
//!
//! - [`app`]: Composition root for the binary
//! - [`auth`]: Password hashing
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Error kinds surfaced to callers
//! - [`model`]: Course and user entities
//! - [`observability`]: Metrics and tracing setup
//! - [`storage`]: SQLite schema, operation queue and repository
//! - [`sync`]: Upstream fetcher and reconciliation engine

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // storage::queue::QueueHandle is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::similar_names,              // crn/crns are fine
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
pub use model::{Course, CourseQuery, Instructor, Meeting, NewUser, User};
pub use storage::queue::{OperationQueue, QueueConfig, QueueHandle};
pub use storage::{CourseRepository, Store, StoreConfig};
pub use sync::reconcile::{reconcile_courses, run_reconciliation, ReconcileMode, ReconcileReport};
pub use sync::source::{fetch_all, CourseSource, FetchOptions, HttpCourseSource};
