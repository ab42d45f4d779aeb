//! Cache metrics for observability

use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    hits: CounterVec,
    misses: CounterVec,
    negative_hits: CounterVec,
    writes: CounterVec,
    invalidations: CounterVec,
    errors: CounterVec,
}

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    CounterVec::new(Opts::new(name, help), labels).expect("valid metric definition")
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            hits: counter("wallet_cache_hits_total", "Total cache hits", &["cache"]),
            misses: counter("wallet_cache_misses_total", "Total cache misses", &["cache"]),
            negative_hits: counter(
                "wallet_cache_negative_hits_total",
                "Lookups answered by the negative cache",
                &["cache"],
            ),
            writes: counter("wallet_cache_writes_total", "Total cache writes", &["cache"]),
            invalidations: counter(
                "wallet_cache_invalidations_total",
                "Cache entries patched or inserted from the bus",
                &["cache"],
            ),
            errors: counter(
                "wallet_cache_errors_total",
                "Errors while populating caches",
                &["cache", "error_type"],
            ),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.negative_hits.clone()))?;
        registry.register(Box::new(self.writes.clone()))?;
        registry.register(Box::new(self.invalidations.clone()))?;
        registry.register(Box::new(self.errors.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static CacheMetricsInner {
    METRICS.get_or_init(CacheMetricsInner::new)
}

/// Per-cache metrics handle
///
/// Cheap to clone; all handles share the same process-wide counters and
/// differ only in their `cache` label.
#[derive(Clone, Debug)]
pub struct CacheMetrics {
    cache: &'static str,
}

impl CacheMetrics {
    pub fn new(cache: &'static str) -> Self {
        Self { cache }
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_hit(&self) {
        get_metrics().hits.with_label_values(&[self.cache]).inc();
    }

    pub fn record_miss(&self) {
        get_metrics().misses.with_label_values(&[self.cache]).inc();
    }

    pub fn record_negative_hit(&self) {
        get_metrics()
            .negative_hits
            .with_label_values(&[self.cache])
            .inc();
    }

    pub fn record_write(&self) {
        get_metrics().writes.with_label_values(&[self.cache]).inc();
    }

    pub fn record_invalidation(&self) {
        get_metrics()
            .invalidations
            .with_label_values(&[self.cache])
            .inc();
    }

    pub fn record_error(&self, error_type: &str) {
        get_metrics()
            .errors
            .with_label_values(&[self.cache, error_type])
            .inc();
    }

    #[cfg(test)]
    fn hits(&self) -> f64 {
        get_metrics().hits.with_label_values(&[self.cache]).get()
    }
}
