//! Observability utilities for event processing services.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Event metrics (processed count by status, handler duration)
//! - Health, readiness and metrics HTTP endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, EventMetrics, HealthServer};
//!
//! let handle = init_metrics()?;
//!
//! EventMetrics::record_processed("AddArticle", "ok");
//!
//! let server = HealthServer::new("0.0.0.0:8000").with_metrics(handle.clone());
//! let health = server.state();
//! tokio::spawn(server.run(shutdown));
//! ```

pub mod events;
pub mod health;

pub use events::EventMetrics;
pub use health::{HealthServer, HealthState, HealthStatus};

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

/// Histogram buckets (seconds) for event handler durations.
pub const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// Safe to call more than once: later calls return the handle installed by
/// the first one.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(events::EVENTS_DURATION.to_string()),
                DURATION_BUCKETS,
            )?
            .install_recorder()?;

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        Ok(handle)
    })
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        events::EVENTS_PROCESSED,
        "Processed events by event name and final status"
    );
    describe_histogram!(
        events::EVENTS_DURATION,
        metrics::Unit::Seconds,
        "Event handler duration in seconds"
    );
}
