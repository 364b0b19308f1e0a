// Metrics and observability module
// This file holds the process-wide Prometheus collectors for optimization,
// routing, persistence, admin access and dashboard aggregation
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

pub static OPTIMIZE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "planner_optimize_latency_seconds",
        "time spent ordering stops",
        &["metric"]
    )
    .unwrap()
});

pub static ROUTING_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "planner_routing_errors_total",
        "directions provider failures by kind",
        &["kind"]
    )
    .unwrap()
});

pub static STALE_RESULTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "planner_stale_results_total",
        "plan results discarded because a newer request was issued",
        &["outcome"]
    )
    .unwrap()
});

pub static STORE_MUTATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "planner_store_mutations_total",
        "saved route mutations by operation",
        &["operation"]
    )
    .unwrap()
});

pub static ADMIN_ATTEMPTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "planner_admin_attempts_total",
        "identity checks by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static AGGREGATION_FALLBACKS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "planner_aggregation_fallbacks_total",
        "dashboard metric groups that fell back to defaults",
        &["group"]
    )
    .unwrap()
});
