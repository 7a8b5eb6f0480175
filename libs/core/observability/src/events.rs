//! Event processing metrics.

use metrics::{counter, histogram};
use std::time::Duration;

pub const EVENTS_PROCESSED: &str = "events_processed";
pub const EVENTS_DURATION: &str = "events_duration";

/// Event metrics recorder
pub struct EventMetrics;

impl EventMetrics {
    /// Count one handled message with its final status (`ok`, `failed`, `retry`, `unset`).
    pub fn record_processed(event: &str, status: &str) {
        counter!(
            EVENTS_PROCESSED,
            "event_name" => event.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    /// Record how long the handler chain below the metrics layer took.
    pub fn observe_duration(event: &str, elapsed: Duration) {
        histogram!(EVENTS_DURATION, "event_name" => event.to_string()).record(elapsed.as_secs_f64());

        tracing::trace!(
            event = event,
            duration_ms = elapsed.as_millis() as u64,
            "Event duration recorded"
        );
    }
}
