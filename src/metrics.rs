//! Metrics for fetch and batch monitoring.
//!
//! Everything goes through the `metrics` facade; nothing is recorded unless the
//! embedding application installs a recorder/exporter.
//!
//! - **Gauges**: `volley_fetches_in_flight`
//! - **Counters**: `volley_fetch_total{outcome}`, `volley_batches_total`
//! - **Histograms**: `volley_fetch_duration_seconds{outcome}`

use std::time::Duration;

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};

use crate::fetch::OutcomeKind;

pub const FETCHES_IN_FLIGHT: &str = "volley_fetches_in_flight";
pub const FETCH_TOTAL: &str = "volley_fetch_total";
pub const FETCH_DURATION_SECONDS: &str = "volley_fetch_duration_seconds";
pub const BATCHES_TOTAL: &str = "volley_batches_total";

/// Register descriptions for all metrics with the installed recorder.
pub fn describe() {
    describe_gauge!(
        FETCHES_IN_FLIGHT,
        "Number of fetches currently racing their deadline"
    );
    describe_counter!(FETCH_TOTAL, "Total number of fetches by outcome");
    describe_histogram!(
        FETCH_DURATION_SECONDS,
        Unit::Seconds,
        "Time from launch to outcome for each fetch"
    );
    describe_counter!(BATCHES_TOTAL, "Total number of batches run to completion");
}

pub(crate) fn record_fetch(kind: OutcomeKind, elapsed: Duration) {
    counter!(FETCH_TOTAL, "outcome" => kind.as_str()).increment(1);
    histogram!(FETCH_DURATION_SECONDS, "outcome" => kind.as_str())
        .record(elapsed.as_secs_f64());
}

pub(crate) fn record_batch() {
    counter!(BATCHES_TOTAL).increment(1);
}

/// Holds one unit of the in-flight gauge for as long as it lives.
pub(crate) struct InFlightGuard(());

impl InFlightGuard {
    pub(crate) fn new() -> Self {
        gauge!(FETCHES_IN_FLIGHT).increment(1.0);
        InFlightGuard(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(FETCHES_IN_FLIGHT).decrement(1.0);
    }
}
