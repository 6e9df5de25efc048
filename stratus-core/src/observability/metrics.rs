//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(
        "stratus_operations_total",
        "Total lifecycle operations (by operation, outcome)"
    );
    describe_histogram!(
        "stratus_operation_duration_seconds",
        "Lifecycle operation duration (by operation)"
    );
    describe_counter!(
        "stratus_stack_waits_total",
        "Total blocking waits on stack transitions (by transition, outcome)"
    );
}

/// Record a finished lifecycle operation.
pub fn record_operation(operation: &str, outcome: &str, elapsed: Duration) {
    counter!(
        "stratus_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("stratus_operation_duration_seconds", "operation" => operation.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record the end of a stack wait.
pub fn record_stack_wait(transition: &str, success: bool) {
    let outcome = if success { "complete" } else { "failed" };
    counter!(
        "stratus_stack_waits_total",
        "transition" => transition.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
