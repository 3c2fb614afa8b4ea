//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the process-level concerns
//! (configuration, logging, metrics) the binary wires together.

/// Tokio channel bridge for async stream consumers.
pub mod broadcast;

/// Configuration loaded from the environment.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Backoff and retry for loading stock handles.
pub mod retry;

/// Tracing subscriber and OpenTelemetry export.
pub mod telemetry;

/// In-memory feed transport and synthetic data generator.
pub mod transport;
