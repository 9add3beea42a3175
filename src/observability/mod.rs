//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via `tracing`
//! - OpenTelemetry metrics for queue and reconciliation activity

pub mod metrics;
pub mod tracing;
