//! Observability utilities: Prometheus metrics for proxy and benchmark traffic

use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, TextEncoder};

static PROXY_REQUESTS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("relay_proxy_requests_total", "Chat-completion requests relayed upstream").unwrap());
static PROXY_ERRORS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("relay_proxy_errors_total", "Relayed requests that failed upstream").unwrap());
static BENCH_RUNS: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("relay_benchmark_runs_total", "Completed benchmark runs").unwrap());
static BENCH_DISPATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(Opts::new("relay_benchmark_requests_total", "Benchmark requests by outcome"), &["outcome"]).unwrap()
});
static BENCH_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let opts = HistogramOpts::new("relay_benchmark_latency_seconds", "Latency of successful benchmark requests")
        .buckets(prometheus::exponential_buckets(0.01, 2.0, 14).unwrap());
    prometheus::register_histogram!(opts).unwrap()
});

pub fn init() {
    // Touch statics so every series shows up on /metrics before first use.
    let _ = &*PROXY_REQUESTS;
    let _ = &*PROXY_ERRORS;
    let _ = &*BENCH_RUNS;
    let _ = &*BENCH_DISPATCHES;
    let _ = &*BENCH_LATENCY;
}

pub fn record_proxy_request() { PROXY_REQUESTS.inc(); }
pub fn record_proxy_error() { PROXY_ERRORS.inc(); }
pub fn record_benchmark_run() { BENCH_RUNS.inc(); }

pub fn record_benchmark_request(succeeded: bool, latency_ms: f64) {
    let outcome = if succeeded { "succeeded" } else { "failed" };
    BENCH_DISPATCHES.with_label_values(&[outcome]).inc();
    if succeeded { BENCH_LATENCY.observe(latency_ms / 1000.0); }
}

/// Text exposition of the default registry, with its content type.
pub fn render() -> (String, Vec<u8>) {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() { buffer.clear(); }
    (encoder.format_type().to_string(), buffer)
}
