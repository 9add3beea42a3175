//! Configuration parsing for Courseload.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::queue::QueueConfig;
use crate::storage::StoreConfig;
use crate::sync::source::FetchOptions;

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Courseload: course section store with upstream reconciliation.
#[derive(Parser, Debug, Clone)]
#[command(name = "courseload")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path to the SQLite database file
    #[arg(long, env = "COURSELOAD_DATABASE", default_value = "./data/courseload.db")]
    pub database: PathBuf,

    /// Capacity of the store operation queue (backpressure control)
    #[arg(long, env = "COURSELOAD_QUEUE_SIZE", default_value_t = 256,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_size: u64,

    /// How long a submission waits for a free queue slot, in milliseconds
    #[arg(long, env = "COURSELOAD_ENQUEUE_TIMEOUT_MS", default_value_t = 5000)]
    pub enqueue_timeout_ms: u64,

    /// Attempts made to open the database before giving up
    #[arg(long, env = "COURSELOAD_OPEN_ATTEMPTS", default_value_t = 5)]
    pub open_attempts: u32,

    /// Salt mixed into password hashes
    #[arg(long, env = "COURSELOAD_PASSWORD_SALT", default_value = "", hide_env_values = true)]
    pub password_salt: String,

    /// Periodically reconcile courses against the upstream API
    #[arg(long, env = "COURSELOAD_UPDATE_COURSES", default_value_t = true, action = clap::ArgAction::Set)]
    pub update_courses: bool,

    /// Seconds between reconciliation passes
    #[arg(long, env = "COURSELOAD_SYNC_INTERVAL_SECS", default_value_t = 21600)]
    pub sync_interval_secs: u64,

    /// Base URL of the upstream course API
    #[arg(long, env = "COURSELOAD_UPSTREAM_URL", default_value = "https://wapi.unh.edu/dhub/api/courses/all")]
    pub upstream_url: String,

    /// Academic term to load, e.g. 202410
    #[arg(long, env = "COURSELOAD_TERM", default_value = "202410")]
    pub term: String,

    /// Courses requested per upstream page
    #[arg(long, env = "COURSELOAD_PAGE_SIZE", default_value_t = 64)]
    pub page_size: usize,

    /// Upstream pages fetched concurrently
    #[arg(long, env = "COURSELOAD_FETCH_CONCURRENCY", default_value_t = 8)]
    pub fetch_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "COURSELOAD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.database.clone(),
            queue: QueueConfig::from_config(self.queue_size as usize, self.enqueue_timeout_ms),
            open_attempts: self.open_attempts,
            password_salt: self.password_salt.clone(),
        }
    }

    /// Upstream paging settings derived from this configuration.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_size: self.page_size,
            concurrency: self.fetch_concurrency,
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Create a configuration for testing.
    pub fn test_config(database: PathBuf) -> Self {
        Self {
            database,
            queue_size: 16,
            enqueue_timeout_ms: 500,
            open_attempts: 1,
            password_salt: "test-salt".into(),
            update_courses: false,
            sync_interval_secs: 1,
            upstream_url: "http://127.0.0.1:9/api/courses/all".into(),
            term: "202410".into(),
            page_size: 8,
            fetch_concurrency: 2,
            log_level: "debug".into(),
            log_format: LogFormat::Text,
            otel_endpoint: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("./data/courseload.db"),
            queue_size: 256,
            enqueue_timeout_ms: 5000,
            open_attempts: 5,
            password_salt: String::new(),
            update_courses: true,
            sync_interval_secs: 21600,
            upstream_url: "https://wapi.unh.edu/dhub/api/courses/all".into(),
            term: "202410".into(),
            page_size: 64,
            fetch_concurrency: 8,
            log_level: "info".into(),
            log_format: LogFormat::Text,
            otel_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.queue_size, 256);
        assert_eq!(config.enqueue_timeout_ms, 5000);
        assert!(config.update_courses);
    }

    #[test]
    fn test_parse_overrides() {
        let config = Config::try_parse_from([
            "courseload",
            "--queue-size",
            "8",
            "--update-courses",
            "false",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.queue_size, 8);
        assert!(!config.update_courses);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_zero_queue_size_rejected() {
        assert!(Config::try_parse_from(["courseload", "--queue-size", "0"]).is_err());
    }

    #[test]
    fn test_store_config_from_config() {
        let config = Config::test_config(PathBuf::from("/tmp/x.db"));
        let store = config.store_config();
        assert_eq!(store.queue.capacity, 16);
        assert_eq!(store.queue.enqueue_timeout, Duration::from_millis(500));
        assert_eq!(store.password_salt, "test-salt");
    }
}
