// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.

use metrics::{describe_counter, describe_gauge};

/// Register all Courier metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!("courier_live_sessions", "Sessions currently registered");
    describe_counter!(
        "courier_envelopes_total",
        "Inbound envelopes dispatched, by kind"
    );
    describe_counter!(
        "courier_forwarded_total",
        "Requests and responses persisted for delivery, by initial status"
    );
    describe_counter!(
        "courier_enqueue_timeouts_total",
        "Enqueues that failed because a session's outbound queue was full"
    );
    describe_counter!(
        "courier_deliveries_total",
        "Forwarded envelopes written to a transport, by outcome"
    );
    describe_counter!(
        "courier_retries_total",
        "Records picked up by the retry engine, by outcome"
    );
    describe_counter!(
        "courier_purged_records_total",
        "Records deleted by the cleanup engine"
    );
}

pub fn set_live_sessions(count: usize) {
    metrics::gauge!("courier_live_sessions").set(count as f64);
}

pub fn record_envelope(kind: &'static str) {
    metrics::counter!("courier_envelopes_total", "kind" => kind).increment(1);
}

pub fn record_forwarded(status: &'static str) {
    metrics::counter!("courier_forwarded_total", "status" => status).increment(1);
}

pub fn record_enqueue_timeout() {
    metrics::counter!("courier_enqueue_timeouts_total").increment(1);
}

pub fn record_delivery(ok: bool) {
    let outcome = if ok { "succeeded" } else { "failed" };
    metrics::counter!("courier_deliveries_total", "outcome" => outcome).increment(1);
}

pub fn record_retry(outcome: &'static str) {
    metrics::counter!("courier_retries_total", "outcome" => outcome).increment(1);
}

pub fn record_purged(count: u64) {
    metrics::counter!("courier_purged_records_total").increment(count);
}
