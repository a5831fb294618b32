//! Latency aggregation helpers.

/// Ceiling-rank percentile over an ascending slice: `ceil(p/100 * n) - 1`,
/// clamped into range. Returns `0.0` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() { return 0.0; }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[idx]
}

/// `None` when there is nothing to average.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() { return None; }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Successful requests per second of wall time; `0.0` when either side is zero.
pub fn requests_per_second(succeeded: usize, elapsed_secs: f64) -> f64 {
    if succeeded == 0 || elapsed_secs <= 0.0 { return 0.0; }
    succeeded as f64 / elapsed_secs
}

pub fn sort_latencies(latencies: &mut [f64]) {
    latencies.sort_by(|a, b| a.total_cmp(b));
}
