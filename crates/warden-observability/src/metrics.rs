//! Prometheus metrics for the provisioning core

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::error::Result;

const NAMESPACE: &str = "warden";

/// Metrics for provisioning requests, breakers, limiter, and audit
pub struct WardenMetrics {
    /// Requests by operation and caller-visible status
    pub requests_total: IntCounterVec,

    /// Request duration by operation
    pub request_duration_seconds: HistogramVec,

    /// Breaker state by dependency (0=closed, 1=half-open, 2=open)
    pub breaker_state: IntGaugeVec,

    /// Calls rejected by an open or saturated breaker
    pub breaker_rejections_total: IntCounterVec,

    /// Requests rejected by the rate limiter, by tier
    pub rate_limited_total: IntCounterVec,

    /// Audit events handed to the sinks
    pub audit_events_total: IntCounter,

    /// Audit events dropped because the queue was full
    pub audit_dropped_total: IntCounter,

    /// Failed audit sink writes
    pub audit_sink_failures_total: IntCounter,
}

impl WardenMetrics {
    /// Create and register metrics
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Provisioning requests by outcome").namespace(NAMESPACE),
            &["operation", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Provisioning request duration")
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let breaker_state = IntGaugeVec::new(
            Opts::new(
                "breaker_state",
                "Circuit breaker state (0=closed, 1=half-open, 2=open)",
            )
            .namespace(NAMESPACE),
            &["dependency"],
        )?;
        registry.register(Box::new(breaker_state.clone()))?;

        let breaker_rejections_total = IntCounterVec::new(
            Opts::new("breaker_rejections_total", "Calls rejected by a circuit breaker")
                .namespace(NAMESPACE),
            &["dependency"],
        )?;
        registry.register(Box::new(breaker_rejections_total.clone()))?;

        let rate_limited_total = IntCounterVec::new(
            Opts::new("rate_limited_total", "Requests rejected by the rate limiter")
                .namespace(NAMESPACE),
            &["tier"],
        )?;
        registry.register(Box::new(rate_limited_total.clone()))?;

        let audit_events_total = IntCounter::with_opts(
            Opts::new("audit_events_total", "Audit events written").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(audit_events_total.clone()))?;

        let audit_dropped_total = IntCounter::with_opts(
            Opts::new("audit_dropped_total", "Audit events dropped on a full queue")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(audit_dropped_total.clone()))?;

        let audit_sink_failures_total = IntCounter::with_opts(
            Opts::new("audit_sink_failures_total", "Failed audit sink writes")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(audit_sink_failures_total.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            breaker_state,
            breaker_rejections_total,
            rate_limited_total,
            audit_events_total,
            audit_dropped_total,
            audit_sink_failures_total,
        })
    }

    /// Record a finished request
    pub fn record_request(&self, operation: &str, status: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[operation, status])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn set_breaker_state(&self, dependency: &str, state: i64) {
        self.breaker_state.with_label_values(&[dependency]).set(state);
    }

    pub fn record_breaker_rejection(&self, dependency: &str) {
        self.breaker_rejections_total
            .with_label_values(&[dependency])
            .inc();
    }

    pub fn record_rate_limited(&self, tier: &str) {
        self.rate_limited_total.with_label_values(&[tier]).inc();
    }
}

impl std::fmt::Debug for WardenMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardenMetrics").finish_non_exhaustive()
    }
}

/// Render every metric in `registry` in the Prometheus text format
pub fn export_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
