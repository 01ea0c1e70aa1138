//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Counter, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::error::AppError;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Query Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_cache_hits_total", "Total number of query cache hits"),
        &["query"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_cache_misses_total", "Total number of query cache misses"),
        &["query"]
    ).expect("metric can be created");
    pub static ref CACHE_ENTRIES: IntGauge = IntGauge::new(
        "snapgram_cache_entries",
        "Current number of cached query results"
    ).expect("metric can be created");
    pub static ref QUERY_FETCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_query_fetches_total", "Total number of query fetches"),
        &["query", "outcome"]
    ).expect("metric can be created");
    pub static ref INVALIDATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_invalidations_total", "Total number of cache entries marked stale"),
        &["mutation"]
    ).expect("metric can be created");

    // Mutation Metrics
    pub static ref MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_mutations_total", "Total number of mutations"),
        &["mutation", "outcome"]
    ).expect("metric can be created");

    // Remote Data Service Metrics
    pub static ref REMOTE_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_remote_calls_total", "Total number of backend calls"),
        &["operation", "outcome"]
    ).expect("metric can be created");
    pub static ref REMOTE_CALL_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "snapgram_remote_call_duration_seconds",
            "Backend call duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"]
    ).expect("metric can be created");

    // Storage Metrics
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounter = IntCounter::new(
        "snapgram_media_uploads_total",
        "Total number of media uploads"
    ).expect("metric can be created");
    pub static ref MEDIA_BYTES_UPLOADED: Counter = Counter::new(
        "snapgram_media_bytes_uploaded_total",
        "Total bytes of media uploaded"
    ).expect("metric can be created");
    pub static ref BLOB_COMPENSATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_blob_compensations_total", "Uploaded blobs deleted after a failed operation"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref ORPHANED_BLOBS_TOTAL: IntCounter = IntCounter::new(
        "snapgram_orphaned_blobs_total",
        "Blobs that could not be deleted and are left unreferenced"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapgram_errors_total", "Total number of errors"),
        &["error_type", "operation"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_ENTRIES.clone()))
            .expect("CACHE_ENTRIES can be registered");
        REGISTRY
            .register(Box::new(QUERY_FETCHES_TOTAL.clone()))
            .expect("QUERY_FETCHES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(INVALIDATIONS_TOTAL.clone()))
            .expect("INVALIDATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MUTATIONS_TOTAL.clone()))
            .expect("MUTATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REMOTE_CALLS_TOTAL.clone()))
            .expect("REMOTE_CALLS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REMOTE_CALL_DURATION_SECONDS.clone()))
            .expect("REMOTE_CALL_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(MEDIA_UPLOADS_TOTAL.clone()))
            .expect("MEDIA_UPLOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_BYTES_UPLOADED.clone()))
            .expect("MEDIA_BYTES_UPLOADED can be registered");
        REGISTRY
            .register(Box::new(BLOB_COMPENSATIONS_TOTAL.clone()))
            .expect("BLOB_COMPENSATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ORPHANED_BLOBS_TOTAL.clone()))
            .expect("ORPHANED_BLOBS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Encode all registered metrics in Prometheus text format
pub fn encode_metrics() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    encoder
        .encode_to_string(&metric_families)
        .map_err(|e| AppError::Internal(e.into()))
}
