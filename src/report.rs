use std::io::{self, Write};
use std::time::Duration;

use crate::aggregate::{AggregateSnapshot, AggregateStrategy, BUCKETS};
use crate::concurrent::WorkerStats;
use crate::error::{PipelineError, Result};
use crate::queue::QueueStatsSnapshot;

/// Everything a finished run hands to the reporting side.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub num_workers: usize,
    pub strategy: AggregateStrategy,
    pub produced: u64,
    pub consumed: u64,
    pub malformed: u64,
    pub source_error: Option<PipelineError>,
    pub totals: AggregateSnapshot,
    pub workers: Vec<WorkerStats>,
    pub queue: QueueStatsSnapshot,
    pub elapsed: Duration,
}

impl RunReport {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.produced == self.consumed
    }

    pub fn check_consistency(&self) -> Result<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(PipelineError::ConsistencyViolation {
                produced: self.produced,
                consumed: self.consumed,
            })
        }
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.totals.mean()
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.consumed as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub format: OutputFormat,
    pub show_times: bool,
    pub only_times: bool,
    pub show_workers: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Human,
            show_times: true,
            only_times: false,
            show_workers: false,
        }
    }
}

/// Writes the `[error]: produced_count ...` line when the run lost or
/// duplicated items. Returns whether anything was written.
pub fn write_consistency_error<W: Write>(out: &mut W, report: &RunReport) -> io::Result<bool> {
    if report.is_consistent() {
        return Ok(false);
    }
    writeln!(
        out,
        "[error]: produced_count ({}) != consumed_count ({}).",
        report.produced, report.consumed
    )?;
    Ok(true)
}

pub fn write_report<W: Write>(
    out: &mut W,
    report: &RunReport,
    opts: &ReportOptions,
) -> io::Result<()> {
    match opts.format {
        OutputFormat::Human => write_human(out, report, opts),
        OutputFormat::Json => write_json(out, report, opts),
        OutputFormat::Csv => write_csv(out, report, opts),
    }
}

fn write_human<W: Write>(out: &mut W, report: &RunReport, opts: &ReportOptions) -> io::Result<()> {
    if opts.only_times {
        writeln!(out, "{:.3}", report.elapsed_ms())?;
        return Ok(());
    }

    let totals = &report.totals;
    writeln!(out, "Threads:    {} ({})", report.num_workers, report.strategy)?;
    writeln!(out, "Primes:     {}", totals.primes)?;
    writeln!(out, "Non-primes: {}", totals.non_primes)?;
    writeln!(out, "Mean:       {:.6}", report.mean())?;
    if report.malformed > 0 {
        writeln!(out, "Malformed:  {}", report.malformed)?;
    }
    writeln!(out, "Last digit histogram:")?;
    for (digit, count) in totals.histogram.iter().enumerate() {
        writeln!(out, "  {digit}: {count}")?;
    }

    if opts.show_workers {
        writeln!(out, "{:<8} {:>12} {:>12} {:>14}", "Worker", "Items", "Primes", "Items/sec")?;
        writeln!(out, "{}", "-".repeat(49))?;
        for w in &report.workers {
            writeln!(
                out,
                "{:<8} {:>12} {:>12} {:>14.0}",
                w.worker_id,
                w.items,
                w.primes,
                w.throughput()
            )?;
        }
        writeln!(out, "Queue waits: {}", report.queue.waits)?;
    }

    if opts.show_times {
        writeln!(out, "Elapsed:    {:.3} ms", report.elapsed_ms())?;
    }
    Ok(())
}

fn write_json<W: Write>(out: &mut W, report: &RunReport, opts: &ReportOptions) -> io::Result<()> {
    let totals = &report.totals;
    let histogram = totals
        .histogram
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    writeln!(out, "{{")?;
    writeln!(out, "  \"threads\": {},", report.num_workers)?;
    writeln!(out, "  \"strategy\": \"{}\",", report.strategy)?;
    writeln!(out, "  \"produced\": {},", report.produced)?;
    writeln!(out, "  \"consumed\": {},", report.consumed)?;
    writeln!(out, "  \"consistent\": {},", report.is_consistent())?;
    writeln!(out, "  \"malformed\": {},", report.malformed)?;
    writeln!(out, "  \"primes\": {},", totals.primes)?;
    writeln!(out, "  \"non_primes\": {},", totals.non_primes)?;
    writeln!(out, "  \"mean\": {:.6},", report.mean())?;
    if opts.show_workers {
        writeln!(out, "  \"workers\": [")?;
        for (i, w) in report.workers.iter().enumerate() {
            let comma = if i + 1 < report.workers.len() { "," } else { "" };
            writeln!(
                out,
                "    {{\"id\": {}, \"items\": {}, \"primes\": {}}}{}",
                w.worker_id, w.items, w.primes, comma
            )?;
        }
        writeln!(out, "  ],")?;
    }
    if opts.show_times {
        writeln!(out, "  \"elapsed_ms\": {:.3},", report.elapsed_ms())?;
    }
    writeln!(out, "  \"histogram\": [{histogram}]")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_csv<W: Write>(out: &mut W, report: &RunReport, opts: &ReportOptions) -> io::Result<()> {
    let buckets: Vec<String> = (0..BUCKETS).map(|d| format!("h{d}")).collect();
    write!(out, "threads,strategy,primes,non_primes,mean,{}", buckets.join(","))?;
    if opts.show_times {
        write!(out, ",elapsed_ms")?;
    }
    writeln!(out)?;

    let totals = &report.totals;
    let counts: Vec<String> = totals.histogram.iter().map(|c| c.to_string()).collect();
    write!(
        out,
        "{},{},{},{},{:.6},{}",
        report.num_workers,
        report.strategy,
        totals.primes,
        totals.non_primes,
        report.mean(),
        counts.join(",")
    )?;
    if opts.show_times {
        write!(out, ",{:.3}", report.elapsed_ms())?;
    }
    writeln!(out)?;
    Ok(())
}
