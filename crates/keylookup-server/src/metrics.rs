//! Prometheus metrics for the lookup server
//!
//! Labels are the operation and outcome only, never the search text.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

pub const OP_INDEX: &str = "index";
pub const OP_GET: &str = "get";
pub const OP_GET_EXACT: &str = "get_exact";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_NO_MATCH: &str = "no_match";
pub const OUTCOME_CLIENT_ERROR: &str = "client_error";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";

pub fn record_lookup(op: &str, outcome: &str, duration: Duration) {
    counter!("lookup_requests_total", "op" => op.to_string(), "outcome" => outcome.to_string()).increment(1);
    histogram!("lookup_request_duration_seconds", "op" => op.to_string(), "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_lookup_start(op: &str) {
    gauge!("lookup_requests_in_flight", "op" => op.to_string()).increment(1.0);
}

pub fn record_lookup_end(op: &str) {
    gauge!("lookup_requests_in_flight", "op" => op.to_string()).decrement(1.0);
}

pub fn set_records_loaded(records: usize, objects: usize) {
    gauge!("lookup_records_loaded").set(records as f64);
    gauge!("lookup_objects_loaded").set(objects as f64);
}

pub fn init_prometheus_recorder() -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    Ok(builder.install_recorder()?)
}
