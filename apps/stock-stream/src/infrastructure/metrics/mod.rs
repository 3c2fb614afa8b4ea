//! Prometheus Metrics Module
//!
//! Application metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Dispatch**: notifications delivered per stream kind, unrecognized tags
//! - **Lifecycle**: loads by outcome, clears, attached handles
//! - **Latency**: time spent delivering one notification to its subscribers
//!
//! # Integration
//!
//! The binary installs the recorder with [`init_metrics`], hands
//! [`PrometheusMetrics`] to the feed context, and renders the scrape text on
//! shutdown. Without an installed recorder the recording calls are no-ops.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::MetricsPort;
use crate::domain::error::FeedError;
use crate::domain::streaming::StreamKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the same handle.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Dispatch
    describe_counter!(
        "stock_stream_notifications_total",
        "Notifications delivered to a stream, by kind"
    );
    describe_counter!(
        "stock_stream_unrecognized_notifications_total",
        "Notifications dropped because their tag matched no stream"
    );

    // Lifecycle
    describe_counter!(
        "stock_stream_loads_total",
        "Stock handle load attempts by outcome"
    );
    describe_counter!("stock_stream_clears_total", "Stock handles cleared");
    describe_gauge!(
        "stock_stream_loaded_handles",
        "Stock handles currently attached to a feed"
    );

    // Latency
    describe_histogram!(
        "stock_stream_dispatch_seconds",
        "Time to deliver one notification to every subscriber of its stream"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Label for a load attempt outcome.
const fn load_outcome(error: Option<&FeedError>) -> &'static str {
    match error {
        None => "ok",
        Some(e) => e.kind(),
    }
}

/// Record one delivered notification and its delivery time.
pub fn record_dispatch(kind: StreamKind, duration: Duration) {
    counter!("stock_stream_notifications_total", "kind" => kind.as_str()).increment(1);
    histogram!("stock_stream_dispatch_seconds", "kind" => kind.as_str())
        .record(duration.as_secs_f64());
}

/// Record a notification dropped for an unrecognized tag.
pub fn record_unrecognized() {
    counter!("stock_stream_unrecognized_notifications_total").increment(1);
}

/// Record a load attempt; `None` means it succeeded.
pub fn record_load(error: Option<&FeedError>) {
    counter!("stock_stream_loads_total", "outcome" => load_outcome(error)).increment(1);
}

/// Record a handle detaching from its feed.
pub fn record_clear() {
    counter!("stock_stream_clears_total").increment(1);
}

/// Update the attached handle count.
#[allow(clippy::cast_precision_loss)]
pub fn set_loaded_handles(count: usize) {
    gauge!("stock_stream_loaded_handles").set(count as f64);
}

// =============================================================================
// Port Adapter
// =============================================================================

/// [`MetricsPort`] adapter writing to the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsPort for PrometheusMetrics {
    fn dispatched(&self, kind: StreamKind, elapsed: Duration) {
        record_dispatch(kind, elapsed);
    }

    fn unrecognized(&self) {
        record_unrecognized();
    }

    fn load_attempted(&self, error: Option<&FeedError>) {
        record_load(error);
    }

    fn cleared(&self) {
        record_clear();
    }

    fn attached_handles(&self, count: usize) {
        set_loaded_handles(count);
    }
}

// =============================================================================
// Tests
// =============================================================================
