// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_histogram, histogram};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_histogram!(
        "multicall_batch_size_bucket",
        Unit::Count,
        "Number of sub-calls per aggregate3 eth_call."
    );
    describe_counter!(
        "cache_hits_total",
        Unit::Count,
        "Cache hits, labeled by cache."
    );
    describe_counter!(
        "cache_miss_total",
        Unit::Count,
        "Cache misses, labeled by cache."
    );
    describe_counter!(
        "classification_probes_total",
        Unit::Count,
        "Classification probes issued, labeled by probe kind and outcome."
    );
    describe_histogram!(
        "population_duration_seconds",
        Unit::Seconds,
        "Duration of a full population pass, labeled by staking contract."
    );
    describe_counter!(
        "population_failures_total",
        Unit::Count,
        "Failed population passes, labeled by staking contract."
    );
}

// --- Helper functions to update metrics ---

pub fn record_multicall_batch_size(size: f64) {
    histogram!("multicall_batch_size_bucket", size);
}

pub fn increment_cache_hit(cache_name: &str) {
    counter!("cache_hits_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("cache_miss_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_classification_probe(probe: &'static str, answered: bool) {
    counter!(
        "classification_probes_total",
        1,
        "probe" => probe,
        "outcome" => if answered { "answered" } else { "failed" }
    );
}

pub fn record_population_duration(contract: &str, duration: std::time::Duration) {
    histogram!(
        "population_duration_seconds",
        duration.as_secs_f64(),
        "contract" => contract.to_string()
    );
}

pub fn increment_population_failures(contract: &str) {
    counter!("population_failures_total", 1, "contract" => contract.to_string());
}
