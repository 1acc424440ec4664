//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Oracle metrics
    pub oracle_requests: CounterVec,
    pub oracle_request_duration: HistogramVec,
    pub oracle_circuit_open: CounterVec,

    // Summarizer metrics
    pub summarize_requests: CounterVec,
    pub summarize_duration: Histogram,
    pub summarize_input_tokens: Histogram,
    pub reduce_passes: Histogram,
    pub chunks_summarized: Counter,

    // Digest metrics
    pub categorizations: CounterVec,
    pub digest_cache_hits: Counter,
    pub digest_cache_misses: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let oracle_requests = register_counter_vec_with_registry!(
            Opts::new("oracle_requests_total", "Total model server requests"),
            &["operation", "status"],
            registry
        )?;

        let oracle_request_duration = register_histogram_vec_with_registry!(
            "oracle_request_duration_seconds",
            "Model server request duration in seconds",
            &["operation"],
            registry
        )?;

        let oracle_circuit_open = register_counter_vec_with_registry!(
            Opts::new("oracle_circuit_open_total", "Requests rejected by an open circuit"),
            &["operation"],
            registry
        )?;

        let summarize_requests = register_counter_vec_with_registry!(
            Opts::new("summarize_requests_total", "Total summarization calls"),
            &["status"],
            registry
        )?;

        let summarize_duration = register_histogram_with_registry!(
            "summarize_duration_seconds",
            "End-to-end summarization duration in seconds",
            registry
        )?;

        let summarize_input_tokens = register_histogram_with_registry!(
            "summarize_input_tokens",
            "Prefixed input length in tokens",
            vec![64.0, 128.0, 256.0, 450.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0],
            registry
        )?;

        let reduce_passes = register_histogram_with_registry!(
            "summarize_reduce_passes",
            "Map-reduce passes needed before the final summary",
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 8.0],
            registry
        )?;

        let chunks_summarized = register_counter_with_registry!(
            Opts::new("summarize_chunks_total", "Total chunk-level summaries generated"),
            registry
        )?;

        let categorizations = register_counter_vec_with_registry!(
            Opts::new("categorizations_total", "Summaries categorized, by category"),
            &["category"],
            registry
        )?;

        let digest_cache_hits = register_counter_with_registry!(
            Opts::new("digest_cache_hits_total", "Digest cache hits"),
            registry
        )?;

        let digest_cache_misses = register_counter_with_registry!(
            Opts::new("digest_cache_misses_total", "Digest cache misses"),
            registry
        )?;

        Ok(Self {
            registry,
            oracle_requests,
            oracle_request_duration,
            oracle_circuit_open,
            summarize_requests,
            summarize_duration,
            summarize_input_tokens,
            reduce_passes,
            chunks_summarized,
            categorizations,
            digest_cache_hits,
            digest_cache_misses,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one model server request
    pub fn record_oracle_call(&self, operation: &str, success: bool, elapsed: Duration) {
        let status = if success { "success" } else { "error" };
        self.oracle_requests
            .with_label_values(&[operation, status])
            .inc();
        self.oracle_request_duration
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    /// Record a request rejected by the circuit breaker
    pub fn record_circuit_open(&self, operation: &str) {
        self.oracle_circuit_open.with_label_values(&[operation]).inc();
    }

    /// Record the outcome of one `summarize` call
    pub fn record_summarization(&self, status: &str, elapsed: Duration) {
        self.summarize_requests.with_label_values(&[status]).inc();
        self.summarize_duration.observe(elapsed.as_secs_f64());
    }

    /// Record a completed reduction
    pub fn record_reduction(&self, input_tokens: usize, passes: usize) {
        self.summarize_input_tokens.observe(input_tokens as f64);
        self.reduce_passes.observe(passes as f64);
    }

    pub fn record_category(&self, category: &str) {
        self.categorizations.with_label_values(&[category]).inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.digest_cache_hits.inc();
        } else {
            self.digest_cache_misses.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}
