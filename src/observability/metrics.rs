//! Metrics collection for `breathwork`.
//!
//! Prometheus-compatible metrics with label cardinality protection and typed
//! convenience functions. Without an installed recorder every function here
//! is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::BreathworkError;
use crate::protocol::PhaseName;
use crate::protocol::catalog;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Label used for protocols loaded from user files.
const CUSTOM_PROTOCOL_LABEL: &str = "__custom__";

/// Sanitizes a protocol name for use as a metrics label.
///
/// Built-in names pass through; anything from a user file is bucketed so a
/// directory of protocol files cannot blow up label cardinality.
#[must_use]
pub fn sanitize_protocol_label(name: &str) -> &str {
    if catalog::find_protocol(name).is_some() {
        name
    } else {
        CUSTOM_PROTOCOL_LABEL
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `BreathworkError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), BreathworkError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| BreathworkError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "breathwork_runs_started_total",
        "Total number of exercise runs started"
    );
    describe_counter!(
        "breathwork_runs_finished_total",
        "Total number of exercise runs finished, by outcome"
    );
    describe_counter!("breathwork_ticks_total", "Total number of ticks delivered");
    describe_counter!(
        "breathwork_phase_entries_total",
        "Total number of phase boundaries crossed"
    );
    describe_gauge!("breathwork_run_active", "Whether an exercise is running");
}

/// Records a started run.
pub fn record_run_started(protocol: &str) {
    counter!(
        "breathwork_runs_started_total",
        "protocol" => sanitize_protocol_label(protocol).to_owned()
    )
    .increment(1);
    gauge!("breathwork_run_active").set(1.0);
}

/// Records a delivered tick.
pub fn record_tick() {
    counter!("breathwork_ticks_total").increment(1);
}

/// Records entry into a phase.
pub fn record_phase_entered(phase: PhaseName) {
    counter!("breathwork_phase_entries_total", "phase" => phase.as_str()).increment(1);
}

/// Records a finished run; `outcome` is `"completed"` or `"cancelled"`.
pub fn record_run_finished(outcome: &'static str) {
    counter!("breathwork_runs_finished_total", "outcome" => outcome).increment(1);
    gauge!("breathwork_run_active").set(0.0);
}
