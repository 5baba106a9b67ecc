use std::time::Duration;

pub fn median_f64(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len().is_multiple_of(2) {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

pub fn variance_f64(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sum_sq_diff: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    sum_sq_diff / (values.len() - 1) as f64
}

/// Elapsed milliseconds and millions of items per second.
pub fn calculate_throughput(count: u64, elapsed: Duration) -> (f64, f64) {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let secs = elapsed.as_secs_f64();
    let mips = if secs > 0.0 {
        count as f64 / secs / 1_000_000.0
    } else {
        0.0
    };
    (elapsed_ms, mips)
}

/// Thread counts 1, 2, 4, ... up to and including `max`.
pub fn doubling_thread_counts(max: usize) -> Vec<usize> {
    let max = max.max(1);
    let mut counts = Vec::new();
    let mut n = 1;
    while n < max {
        counts.push(n);
        n *= 2;
    }
    counts.push(max);
    counts
}

/// Deterministic pseudo-random integers in `0..bound` (64-bit LCG).
pub fn synthetic_items(count: usize, bound: i64, seed: u64) -> Vec<i64> {
    let bound = bound.max(1) as u64;
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) % bound) as i64
        })
        .collect()
}
