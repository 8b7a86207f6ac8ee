//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub state_fetches_total: IntCounter,
    pub state_fetch_errors_total: IntCounter,
    pub mint_attempts_total: IntCounter,
    pub mint_busy_rejections_total: IntCounter,

    // Labelled counters
    pub mint_rejections_total: IntCounterVec,
    pub confirmations_total: IntCounterVec,

    // Histograms
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let state_fetches_total = IntCounter::with_opts(Opts::new(
            "state_fetches_total",
            "Number of sale-state fetches that reached the ledger",
        ))?;

        let state_fetch_errors_total = IntCounter::with_opts(Opts::new(
            "state_fetch_errors_total",
            "Number of sale-state fetches that failed",
        ))?;

        let mint_attempts_total = IntCounter::with_opts(Opts::new(
            "mint_attempts_total",
            "Number of mint attempts that passed the busy guard",
        ))?;

        let mint_busy_rejections_total = IntCounter::with_opts(Opts::new(
            "mint_busy_rejections_total",
            "Number of mint calls rejected because another attempt was in flight",
        ))?;

        let mint_rejections_total = IntCounterVec::new(
            Opts::new("mint_rejections_total", "Failed mint attempts by reason"),
            &["reason"],
        )?;

        let confirmations_total = IntCounterVec::new(
            Opts::new("confirmations_total", "Confirmation outcomes"),
            &["outcome"],
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to terminal confirmation status",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(state_fetches_total.clone()))?;
        registry.register(Box::new(state_fetch_errors_total.clone()))?;
        registry.register(Box::new(mint_attempts_total.clone()))?;
        registry.register(Box::new(mint_busy_rejections_total.clone()))?;
        registry.register(Box::new(mint_rejections_total.clone()))?;
        registry.register(Box::new(confirmations_total.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            state_fetches_total,
            state_fetch_errors_total,
            mint_attempts_total,
            mint_busy_rejections_total,
            mint_rejections_total,
            confirmations_total,
            confirmation_latency,
        })
    }

    pub fn record_rejection(&self, reason: &str) {
        self.mint_rejections_total.with_label_values(&[reason]).inc();
    }

    pub fn record_confirmation(&self, outcome: &str) {
        self.confirmations_total.with_label_values(&[outcome]).inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
