// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the order calendar service.
//
// NOTES:
// - Prometheus scrapes GET /metrics (pull model)
// - Counters only go up; histograms bucket latencies
// - Label values stay low-cardinality: routes are recorded by their matched
//   pattern (/api/v1/orders/:id), never the concrete path
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// METRIC NAMES
// =============================================================================

/// HTTP request counter
/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// HTTP request duration histogram
/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Decoration stock change counter, summed over all owners
/// Labels: operation (add/adjust/delete/reconcile)
pub const STOCK_CHANGES_TOTAL: &str = "decoration_stock_changes_total";

/// Order write counter
/// Labels: operation (create/update/delete), outcome (success/failed)
pub const ORDER_WRITES_TOTAL: &str = "order_writes_total";

/// Database query duration histogram
/// Labels: operation (select/insert/update/delete/reconcile)
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Installs the global Prometheus recorder and returns the handle used by
/// the /metrics handler to render the text exposition format.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    // 1ms .. 10s
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_counter!(
        STOCK_CHANGES_TOTAL,
        "Decoration stock rows added, adjusted, deleted or reconciled"
    );
    describe_counter!(ORDER_WRITES_TOTAL, "Order create/update/delete attempts");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Database query latency in seconds");

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Record an HTTP request
///
/// # Arguments
/// * `method` - HTTP method (GET, POST, etc.)
/// * `endpoint` - Matched route pattern (/api/v1/orders/:id)
/// * `status` - Response status code
/// * `duration_secs` - Request duration in seconds
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

/// Count stock row changes. Owners share character names, so no per-character series.
pub fn record_stock_change(operation: &'static str, rows: u64) {
    counter!(STOCK_CHANGES_TOTAL, "operation" => operation).increment(rows);
}

/// Record an order write attempt
pub fn record_order_write(operation: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(
        ORDER_WRITES_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record database query duration
pub fn record_db_query(operation: &str, duration_secs: f64) {
    histogram!(
        DB_QUERY_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_changes_carry_only_the_operation_label() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_stock_change("adjust", 1);
            record_stock_change("reconcile", 3);
            record_stock_change("reconcile", 2);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"decoration_stock_changes_total{operation="reconcile"} 5"#));
        assert!(rendered.contains(r#"decoration_stock_changes_total{operation="adjust"} 1"#));
        assert!(!rendered.contains("character="));
    }
}
