use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics
// ============================================================================
//
// Process-wide counters for the cache, the HTTP edge, and the ingestion
// pipeline. The registry is owned here and injected as Arc<Metrics> wherever
// outcomes are recorded, so nothing depends on a global registry and every
// component stays unit-testable.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Cache
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,

    // HTTP edge
    pub http_requests_total: IntCounter,
    pub http_requests_success: IntCounter,
    pub http_requests_not_found: IntCounter,
    pub http_requests_bad_request: IntCounter,
    pub http_requests_server_error: IntCounter,

    // Ingestion pipeline
    pub messages_committed: IntCounter,
    pub messages_quarantined: IntCounterVec,
    pub retry_attempts_total: IntCounter,
    pub dlq_publish_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cache_hits = IntCounter::new("cache_hits_total", "total number of cache hits")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = IntCounter::new("cache_misses_total", "total number of cache misses")?;
        registry.register(Box::new(cache_misses.clone()))?;

        let http_requests_total =
            IntCounter::new("http_requests_total", "total number of http requests")?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_requests_success = IntCounter::new(
            "http_requests_success_total",
            "http requests answered with an order",
        )?;
        registry.register(Box::new(http_requests_success.clone()))?;

        let http_requests_not_found = IntCounter::new(
            "http_requests_not_found_total",
            "http requests for unknown identifiers",
        )?;
        registry.register(Box::new(http_requests_not_found.clone()))?;

        let http_requests_bad_request = IntCounter::new(
            "http_requests_bad_request_total",
            "http requests rejected as malformed",
        )?;
        registry.register(Box::new(http_requests_bad_request.clone()))?;

        let http_requests_server_error = IntCounter::new(
            "http_requests_server_error_total",
            "http requests failed with a server error",
        )?;
        registry.register(Box::new(http_requests_server_error.clone()))?;

        let messages_committed = IntCounter::new(
            "consumer_messages_committed_total",
            "messages durably applied and acknowledged",
        )?;
        registry.register(Box::new(messages_committed.clone()))?;

        let messages_quarantined = IntCounterVec::new(
            Opts::new(
                "consumer_messages_quarantined_total",
                "messages diverted to the dead-letter topic",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(messages_quarantined.clone()))?;

        let retry_attempts_total = IntCounter::new(
            "consumer_retry_attempts_total",
            "write-through attempts beyond the first",
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let dlq_publish_failures = IntCounter::new(
            "consumer_dlq_publish_failures_total",
            "dead-letter publishes that themselves failed",
        )?;
        registry.register(Box::new(dlq_publish_failures.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            http_requests_total,
            http_requests_success,
            http_requests_not_found,
            http_requests_bad_request,
            http_requests_server_error,
            messages_committed,
            messages_quarantined,
            retry_attempts_total,
            dlq_publish_failures,
        })
    }

    /// Registry handle for the /metrics endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }

    pub fn record_quarantine(&self, reason: &str) {
        self.messages_quarantined.with_label_values(&[reason]).inc();
    }
}
