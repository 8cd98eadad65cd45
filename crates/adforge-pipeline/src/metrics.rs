//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding binary.

use metrics::{counter, histogram};

use adforge_models::FailureCategory;

/// Metric names as constants for consistency.
pub mod names {
    pub const ASSETS_ANALYZED_TOTAL: &str = "adforge_assets_analyzed_total";
    pub const ASSETS_FAILED_TOTAL: &str = "adforge_assets_failed_total";
    pub const BATCH_COMPLETION_SECONDS: &str = "adforge_batch_completion_seconds";
    pub const BLUEPRINTS_GENERATED_TOTAL: &str = "adforge_blueprints_generated_total";
}

pub fn record_asset_analyzed() {
    counter!(names::ASSETS_ANALYZED_TOTAL).increment(1);
}

pub fn record_asset_failed(category: FailureCategory) {
    counter!(
        names::ASSETS_FAILED_TOTAL,
        "category" => category.as_str()
    )
    .increment(1);
}

/// Record the latency of one batch completion call.
pub fn record_batch_completion(duration_secs: f64, outcome: &'static str) {
    histogram!(
        names::BATCH_COMPLETION_SECONDS,
        "outcome" => outcome
    )
    .record(duration_secs);
}

pub fn record_blueprints(valid: usize, invalid: usize) {
    counter!(names::BLUEPRINTS_GENERATED_TOTAL, "validity" => "valid").increment(valid as u64);
    counter!(names::BLUEPRINTS_GENERATED_TOTAL, "validity" => "invalid").increment(invalid as u64);
}
