pub mod utils;


pub use utils::{
    calculate_throughput, doubling_thread_counts, median_f64, synthetic_items, variance_f64,
};

use std::io::{self, Write};
use std::path::Path;

use crate::aggregate::{AggregateSnapshot, AggregateStrategy};
use crate::concurrent::Pipeline;
use crate::config::{Config, available_workers};
use crate::error::Result;
use crate::report::OutputFormat;
use crate::source::{MmapSource, VecSource};

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub iterations: usize,
    pub warmup_iterations: usize,
    pub thread_counts: Vec<usize>,
    pub strategies: Vec<AggregateStrategy>,
    pub queue_capacity: Option<usize>,
    pub output_format: OutputFormat,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            warmup_iterations: 0,
            thread_counts: doubling_thread_counts(available_workers()),
            strategies: AggregateStrategy::ALL.to_vec(),
            queue_capacity: None,
            output_format: OutputFormat::Human,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    pub strategy: AggregateStrategy,
    pub threads: usize,
    pub items: u64,
    pub median_ms: f64,
    pub median_mips: f64,
    pub variance: f64,
    pub consistent: bool,
    pub totals: AggregateSnapshot,
}

/// Reads every integer in `path`, dropping malformed tokens. Returns the
/// items and how many tokens were dropped.
pub fn load_items<P: AsRef<Path>>(path: P, max_size: u64) -> Result<(Vec<i64>, u64)> {
    let source = MmapSource::open(path, max_size)?;
    let mut items = Vec::with_capacity(source.len() / 4);
    let mut malformed = 0;
    for token in source.tokens() {
        match token {
            Ok(v) => items.push(v),
            Err(_) => malformed += 1,
        }
    }
    Ok((items, malformed))
}

pub fn run_case(
    items: &[i64],
    strategy: AggregateStrategy,
    threads: usize,
    config: &BenchConfig,
) -> Result<BenchResult> {
    let mut pipeline_config = Config::new()
        .with_workers(threads.max(1))
        .with_strategy(strategy);
    if let Some(capacity) = config.queue_capacity {
        pipeline_config = pipeline_config.with_queue_capacity(capacity);
    }
    let pipeline = Pipeline::new(pipeline_config);

    for _ in 0..config.warmup_iterations {
        pipeline.run(VecSource::new(items.to_vec()))?;
    }

    let iterations = config.iterations.max(1);
    let mut times = Vec::with_capacity(iterations);
    let mut mips_values = Vec::with_capacity(iterations);
    let mut consistent = true;
    let mut totals = AggregateSnapshot::default();

    for _ in 0..iterations {
        let report = pipeline.run(VecSource::new(items.to_vec()))?;
        let (elapsed_ms, mips) = calculate_throughput(report.consumed, report.elapsed);
        times.push(elapsed_ms);
        mips_values.push(mips);
        consistent &= report.is_consistent();
        totals = report.totals;
    }

    Ok(BenchResult {
        strategy,
        threads,
        items: items.len() as u64,
        median_ms: median_f64(&mut times),
        median_mips: median_f64(&mut mips_values),
        variance: variance_f64(&mips_values),
        consistent,
        totals,
    })
}

pub fn run_matrix(items: &[i64], config: &BenchConfig) -> Result<Vec<BenchResult>> {
    let total = config.strategies.len() * config.thread_counts.len();
    let mut results = Vec::with_capacity(total);

    for &strategy in &config.strategies {
        for &threads in &config.thread_counts {
            eprint!("[{}/{}] {} x{} ", results.len() + 1, total, strategy, threads);
            let _ = io::stderr().flush();
            results.push(run_case(items, strategy, threads, config)?);
            eprintln!("✓");
        }
    }

    Ok(results)
}

/// Cases whose totals differ from the first case. Every strategy and thread
/// count must agree on the same input.
pub fn mismatched_totals(results: &[BenchResult]) -> Vec<&BenchResult> {
    let Some(first) = results.first() else {
        return Vec::new();
    };
    results
        .iter()
        .filter(|r| r.totals != first.totals || !r.consistent)
        .collect()
}

pub fn print_results<W: Write>(
    out: &mut W,
    results: &[BenchResult],
    config: &BenchConfig,
) -> io::Result<()> {
    match config.output_format {
        OutputFormat::Human => {
            writeln!(out, "\n=== Summary ===")?;
            writeln!(
                out,
                "{:<10} {:>8} {:>12} {:>12} {:>12} {:>12}",
                "Strategy", "Threads", "Items", "Med Time(ms)", "Med M it/s", "Variance"
            )?;
            writeln!(out, "{}", "-".repeat(71))?;
            for r in results {
                writeln!(
                    out,
                    "{:<10} {:>8} {:>12} {:>12.2} {:>12.2} {:>12.4}",
                    r.strategy.name(),
                    r.threads,
                    r.items,
                    r.median_ms,
                    r.median_mips,
                    r.variance
                )?;
            }

            if let Some(best) = results
                .iter()
                .max_by(|a, b| a.median_mips.total_cmp(&b.median_mips))
            {
                writeln!(
                    out,
                    "\nBest throughput: {} x{} @ {:.2} M items/sec",
                    best.strategy, best.threads, best.median_mips
                )?;
            }

            let mismatches = mismatched_totals(results);
            if mismatches.is_empty() {
                if let Some(first) = results.first() {
                    writeln!(
                        out,
                        "\n✓ All runs agree: {} primes, {} non-primes, mean {:.6}",
                        first.totals.primes,
                        first.totals.non_primes,
                        first.totals.mean()
                    )?;
                }
            } else {
                writeln!(out, "\n Warning: result mismatches detected!")?;
                for r in mismatches {
                    writeln!(
                        out,
                        "  {} x{}: {} primes, {} consumed (consistent: {})",
                        r.strategy, r.threads, r.totals.primes, r.totals.consumed, r.consistent
                    )?;
                }
            }
            Ok(())
        }
        OutputFormat::Json => {
            writeln!(out, "[")?;
            for (i, r) in results.iter().enumerate() {
                let comma = if i + 1 < results.len() { "," } else { "" };
                writeln!(
                    out,
                    "  {{\"strategy\": \"{}\", \"threads\": {}, \"items\": {}, \
                     \"time_ms\": {:.3}, \"mips\": {:.3}, \"variance\": {:.4}, \
                     \"consistent\": {}}}{}",
                    r.strategy,
                    r.threads,
                    r.items,
                    r.median_ms,
                    r.median_mips,
                    r.variance,
                    r.consistent,
                    comma
                )?;
            }
            writeln!(out, "]")?;
            Ok(())
        }
        OutputFormat::Csv => {
            writeln!(
                out,
                "strategy,threads,items,median_ms,median_mips,variance,consistent"
            )?;
            for r in results {
                writeln!(
                    out,
                    "{},{},{},{:.3},{:.3},{:.4},{}",
                    r.strategy,
                    r.threads,
                    r.items,
                    r.median_ms,
                    r.median_mips,
                    r.variance,
                    r.consistent
                )?;
            }
            Ok(())
        }
    }
}
