//! Metrics collection module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub transfers_total: IntCounter,
    pub transfers_confirmed: IntCounter,
    pub transfers_failed: IntCounter,
    pub transfers_timed_out: IntCounter,
    pub transfers_rejected_busy: IntCounter,
    pub signing_failures: IntCounter,
    pub poll_attempts: IntCounter,
    pub bindings_written: IntCounter,

    // Gauges
    pub transfers_in_flight: IntGauge,

    // Histograms
    pub rpc_latency: Histogram,
    pub build_latency: Histogram,
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transfers_total = IntCounter::with_opts(Opts::new(
            "transfers_total",
            "Total number of transfers attempted",
        ))?;

        let transfers_confirmed = IntCounter::with_opts(Opts::new(
            "transfers_confirmed",
            "Number of transfers finalized on the ledger",
        ))?;

        let transfers_failed = IntCounter::with_opts(Opts::new(
            "transfers_failed",
            "Number of transfers rejected or failed on the ledger",
        ))?;

        let transfers_timed_out = IntCounter::with_opts(Opts::new(
            "transfers_timed_out",
            "Number of transfers whose confirmation window elapsed",
        ))?;

        let transfers_rejected_busy = IntCounter::with_opts(Opts::new(
            "transfers_rejected_busy",
            "Number of transfers refused because another was in flight",
        ))?;

        let signing_failures = IntCounter::with_opts(Opts::new(
            "signing_failures",
            "Number of builds that failed signing or self-verification",
        ))?;

        let poll_attempts = IntCounter::with_opts(Opts::new(
            "confirmation_poll_attempts",
            "Number of signature status lookups",
        ))?;

        let bindings_written = IntCounter::with_opts(Opts::new(
            "bindings_written",
            "Number of contact address bindings written",
        ))?;

        let transfers_in_flight = IntGauge::with_opts(Opts::new(
            "transfers_in_flight",
            "Number of transfers currently in progress",
        ))?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Transaction sign and verify latency")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from broadcast to a terminal status",
            )
            .buckets(vec![1.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(transfers_total.clone()))?;
        registry.register(Box::new(transfers_confirmed.clone()))?;
        registry.register(Box::new(transfers_failed.clone()))?;
        registry.register(Box::new(transfers_timed_out.clone()))?;
        registry.register(Box::new(transfers_rejected_busy.clone()))?;
        registry.register(Box::new(signing_failures.clone()))?;
        registry.register(Box::new(poll_attempts.clone()))?;
        registry.register(Box::new(bindings_written.clone()))?;
        registry.register(Box::new(transfers_in_flight.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            transfers_total,
            transfers_confirmed,
            transfers_failed,
            transfers_timed_out,
            transfers_rejected_busy,
            signing_failures,
            poll_attempts,
            bindings_written,
            transfers_in_flight,
            rpc_latency,
            build_latency,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
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
    histogram_name: Option<&'static str>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            histogram_name: None,
        }
    }

    /// Create a timer with a histogram name for automatic recording
    pub fn with_name(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name: Some(histogram_name),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Finish the timer and record to the associated histogram
    pub fn finish(self) {
        if let Some(name) = self.histogram_name {
            let duration = self.start.elapsed().as_secs_f64();
            match name {
                "rpc_latency_seconds" => metrics().rpc_latency.observe(duration),
                "build_latency_seconds" => metrics().build_latency.observe(duration),
                "confirmation_latency_seconds" => {
                    metrics().confirmation_latency.observe(duration)
                }
                _ => tracing::debug!("Unknown histogram name: {}", name),
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
