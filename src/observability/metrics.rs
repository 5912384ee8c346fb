use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Issuer
    pub issuance_requests: IntCounter,
    pub issuance_failures: IntCounterVec,
    pub issuance_duration: Histogram,

    // Cache
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cached_subjects: IntGauge,
    pub token_clears: IntCounterVec,

    // Config/runtime
    pub parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokencache".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Issuer
            issuance_requests: IntCounter::new("issuance_requests_total", "Token requests sent to the issuer").unwrap(),
            issuance_failures: IntCounterVec::new(Opts::new("issuance_failures_total", "Issuance failures by reason"), &["reason"]).unwrap(),
            issuance_duration: Histogram::with_opts(HistogramOpts::new("issuance_duration_seconds", "Issuer round-trip seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])).unwrap(),

            // Cache
            cache_hits: IntCounter::new("cache_hits_total", "Lookups served from a fresh cached token").unwrap(),
            cache_misses: IntCounter::new("cache_misses_total", "Lookups that required issuance").unwrap(),
            cached_subjects: IntGauge::new("cached_subjects", "Subjects with a cached token").unwrap(),
            token_clears: IntCounterVec::new(Opts::new("token_clears_total", "Explicit invalidations"), &["scope"]).unwrap(),

            // Config/runtime
            parse_failures: IntCounter::new("config_parse_failures_total", "Config file parse failures").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        let reg = &metrics.registry;
        reg.register(Box::new(metrics.issuance_requests.clone())).unwrap();
        reg.register(Box::new(metrics.issuance_failures.clone())).unwrap();
        reg.register(Box::new(metrics.issuance_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.cache_misses.clone())).unwrap();
        reg.register(Box::new(metrics.cached_subjects.clone())).unwrap();
        reg.register(Box::new(metrics.token_clears.clone())).unwrap();
        reg.register(Box::new(metrics.parse_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
