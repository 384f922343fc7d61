use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
        }
    }
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Outcome of one organizational-unit partition during assignment.
pub fn record_partition(outcome: &'static str) {
    counter!("role_assignment_partitions_total", "outcome" => outcome).increment(1);
}

pub fn record_role_error(kind: &'static str) {
    counter!("role_assignment_errors_total", "kind" => kind).increment(1);
}

pub fn record_provider_request(operation: &'static str, outcome: &'static str) {
    counter!(
        "provider_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}
