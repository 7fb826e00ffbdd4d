//! Remediation metrics.
//!
//! Counters for per-reference outcomes, tier changes, and republish results.
//! These complement the per-pass summary log line.

use metrics::{counter, describe_counter};

/// Per-reference outcomes, labelled by `outcome`.
pub const REFERENCES_TOTAL: &str = "tierlift_references_total";

/// Successful archive-to-cool tier changes.
pub const TIER_CHANGES_TOTAL: &str = "tierlift_tier_changes_total";

/// Republish attempts, labelled by `result`.
pub const PUBLISH_TOTAL: &str = "tierlift_publish_total";

/// Registers all remediation metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(REFERENCES_TOTAL, "Total blob references processed, by outcome");
    describe_counter!(TIER_CHANGES_TOTAL, "Total blobs moved from Archive to Cool");
    describe_counter!(PUBLISH_TOTAL, "Total annotated spreadsheet uploads, by result");
}

/// Records one reference outcome (`changed`, `skipped`, `error`).
pub fn record_reference_outcome(outcome: &'static str) {
    counter!(REFERENCES_TOTAL, "outcome" => outcome).increment(1);
}

/// Records a completed tier change.
pub fn record_tier_change() {
    counter!(TIER_CHANGES_TOTAL).increment(1);
}

/// Records a publish attempt (`success` or `error`).
pub fn record_publish(result: &'static str) {
    counter!(PUBLISH_TOTAL, "result" => result).increment(1);
}
