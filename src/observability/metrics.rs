use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Process wide metrics registry, created on first use.
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

    // Cache
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub shared_waits: IntCounter,

    // Token refresh
    pub token_refreshes: IntCounterVec,
    pub token_refresh_failures: IntCounterVec,
    pub token_refresh_duration: HistogramVec,

    // Service surface
    pub token_requests: IntCounterVec,
    pub allowlist_rejections: IntCounter,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("cloudtokenagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            cache_hits: IntCounter::new("token_cache_hits_total", "Tokens served from cache").unwrap(),
            cache_misses: IntCounter::new("token_cache_misses_total", "Lookups that needed a refresh").unwrap(),
            shared_waits: IntCounter::new("token_cache_shared_waits_total", "Callers served by a refresh another caller ran").unwrap(),

            token_refreshes: IntCounterVec::new(Opts::new("token_refreshes_total", "Successful token refreshes"), &["mechanism"]).unwrap(),
            token_refresh_failures: IntCounterVec::new(Opts::new("token_refresh_failures_total", "Failed token refreshes by reason"), &["mechanism", "reason"]).unwrap(),
            token_refresh_duration: HistogramVec::new(HistogramOpts::new("token_refresh_duration_seconds", "Grant request duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["mechanism"]).unwrap(),

            token_requests: IntCounterVec::new(Opts::new("token_requests_total", "Token requests served by the agent"), &["credential", "status"]).unwrap(),
            allowlist_rejections: IntCounter::new("allowlist_rejections_total", "Destinations refused by the endpoint allowlist").unwrap(),

            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        let reg = &metrics.registry;
        reg.register(Box::new(metrics.cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.cache_misses.clone())).unwrap();
        reg.register(Box::new(metrics.shared_waits.clone())).unwrap();
        reg.register(Box::new(metrics.token_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_requests.clone())).unwrap();
        reg.register(Box::new(metrics.allowlist_rejections.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
