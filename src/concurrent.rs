use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "pinning")]
use std::sync::OnceLock;
#[cfg(feature = "pinning")]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::aggregate::{AggregateStrategy, Aggregator, AtomicAggregate, LockedAggregate};
use crate::classify::{Classification, Classifier, TrialDivision};
use crate::config::{Config, MalformedPolicy};
use crate::error::{PipelineError, Result};
use crate::queue::{CloseGuard, Pop, WorkQueue};
use crate::report::RunReport;
use crate::source::ItemSource;

#[cfg(feature = "pinning")]
static CORE_POOL: OnceLock<Vec<core_affinity::CoreId>> = OnceLock::new();
#[cfg(feature = "pinning")]
static PINNING_ENABLED: AtomicBool = AtomicBool::new(true);
#[cfg(feature = "pinning")]
static PIN_ENV_DISABLE: OnceLock<bool> = OnceLock::new();
#[cfg(feature = "pinning")]
static NEXT_CORE: AtomicUsize = AtomicUsize::new(0);

/// Classification is pure CPU work with no I/O to hide behind, so with the
/// `pinning` feature each worker stays on its own core and keeps its cache
/// warm between items. Cores are handed out round-robin; set
/// `PRIMEFLOW_DISABLE_PINNING` to opt out at runtime.
#[cfg(feature = "pinning")]
#[inline]
fn pin_current_thread() {
    let disable_env =
        *PIN_ENV_DISABLE.get_or_init(|| std::env::var("PRIMEFLOW_DISABLE_PINNING").is_ok());
    if disable_env || !PINNING_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let cores = CORE_POOL.get_or_init(|| core_affinity::get_core_ids().unwrap_or_default());
    if cores.is_empty() {
        PINNING_ENABLED.store(false, Ordering::Relaxed);
        return;
    }

    let idx = NEXT_CORE.fetch_add(1, Ordering::Relaxed);
    let target = cores[idx % cores.len()];
    if !core_affinity::set_for_current(target) {
        PINNING_ENABLED.store(false, Ordering::Relaxed);
    }
}

#[cfg(not(feature = "pinning"))]
#[inline]
fn pin_current_thread() {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerStats {
    pub produced: u64,
    pub malformed: u64,
    /// Error that ended the source early, if any.
    pub source_error: Option<PipelineError>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub items: u64,
    pub primes: u64,
    pub elapsed: Duration,
}

impl WorkerStats {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    #[inline(always)]
    pub fn record(&mut self, class: Classification) {
        self.items += 1;
        if class.is_prime() {
            self.primes += 1;
        }
    }

    pub fn non_primes(&self) -> u64 {
        self.items - self.primes
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.items as f64 / secs
        } else {
            0.0
        }
    }
}

/// Drains `source` into `queue` and closes it. The queue is closed on every
/// exit path, including unwinding.
pub fn produce<S: ItemSource + ?Sized>(
    source: &mut S,
    queue: &WorkQueue<i64>,
    policy: MalformedPolicy,
) -> ProducerStats {
    let _close = CloseGuard::new(queue);
    let start = Instant::now();
    let mut stats = ProducerStats::default();

    while let Some(next) = source.next_item() {
        match next {
            Ok(value) => {
                if queue.push(value).is_err() {
                    warn!(
                        produced = stats.produced,
                        "queue closed before the source was exhausted"
                    );
                    break;
                }
                stats.produced += 1;
            }
            Err(e) if e.is_malformed() && policy == MalformedPolicy::Skip => {
                debug!(error = %e, "skipping malformed entry");
                stats.malformed += 1;
            }
            Err(e) => {
                if e.is_malformed() {
                    stats.malformed += 1;
                }
                warn!(error = %e, produced = stats.produced, "source ended early");
                stats.source_error = Some(e);
                break;
            }
        }
    }

    stats.elapsed = start.elapsed();
    if stats.malformed > 0 {
        warn!(malformed = stats.malformed, "malformed entries in source");
    }
    debug!(
        produced = stats.produced,
        elapsed_us = stats.elapsed.as_micros() as u64,
        "producer finished"
    );
    stats
}

/// Closes the queue if the owning worker unwinds. Without it a bounded
/// producer could wait forever on a queue nobody drains.
struct PanicCloser<'a> {
    queue: &'a WorkQueue<i64>,
}

impl Drop for PanicCloser<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.queue.close();
        }
    }
}

/// Worker loop: pop until closed-and-empty, classify, fold.
pub fn work<C, A>(
    worker_id: usize,
    queue: &WorkQueue<i64>,
    classifier: &C,
    aggregate: &A,
) -> WorkerStats
where
    C: Classifier + ?Sized,
    A: Aggregator + ?Sized,
{
    pin_current_thread();
    let _closer = PanicCloser { queue };
    let start = Instant::now();
    let mut stats = WorkerStats::new(worker_id);

    while let Pop::Item(value) = queue.blocking_pop() {
        let class = classifier.classify(value);
        aggregate.record(value, class);
        stats.record(class);
    }

    stats.elapsed = start.elapsed();
    debug!(worker_id, items = stats.items, "worker exiting");
    stats
}

pub struct Pipeline<C = TrialDivision> {
    config: Config,
    classifier: C,
}

impl Pipeline<TrialDivision> {
    pub fn new(config: Config) -> Self {
        Self::with_classifier(config, TrialDivision)
    }
}

impl Default for Pipeline<TrialDivision> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<C: Classifier> Pipeline<C> {
    pub fn with_classifier(config: Config, classifier: C) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Runs the source through the pool using the configured strategy.
    pub fn run<S: ItemSource>(&self, source: S) -> Result<RunReport> {
        match self.config.strategy {
            AggregateStrategy::Atomic => self.run_with(source, &AtomicAggregate::new()),
            AggregateStrategy::Locked => self.run_with(source, &LockedAggregate::new()),
        }
    }

    /// Runs the source through the pool, folding into `aggregate`. The
    /// aggregate is only read back after every worker has been joined.
    pub fn run_with<S, A>(&self, mut source: S, aggregate: &A) -> Result<RunReport>
    where
        S: ItemSource,
        A: Aggregator,
    {
        let num_workers = self.config.workers().max(1);
        let policy = self.config.malformed;
        let queue = WorkQueue::with_capacity(self.config.queue_capacity);

        info!(
            workers = num_workers,
            strategy = %aggregate.strategy(),
            capacity = ?self.config.queue_capacity,
            "pipeline starting"
        );
        let start = Instant::now();

        let (producer, workers) = thread::scope(|s| {
            let queue = &queue;
            let classifier = &self.classifier;

            let producer = s.spawn(move || produce(&mut source, queue, policy));
            let handles: Vec<_> = (0..num_workers)
                .map(|worker_id| s.spawn(move || work(worker_id, queue, classifier, aggregate)))
                .collect();

            let workers: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            (producer.join(), workers)
        });

        let producer = producer.map_err(|_| PipelineError::ThreadPanicked { role: "producer" })?;
        let workers = workers
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| PipelineError::ThreadPanicked { role: "worker" })?;

        let totals = aggregate.snapshot();
        let elapsed = start.elapsed();

        let report = RunReport {
            num_workers,
            strategy: aggregate.strategy(),
            produced: producer.produced,
            consumed: totals.consumed,
            malformed: producer.malformed,
            source_error: producer.source_error,
            totals,
            workers,
            queue: queue.stats(),
            elapsed,
        };

        if !report.is_consistent() {
            warn!(
                produced = report.produced,
                consumed = report.consumed,
                "produced and consumed counts differ"
            );
        }
        info!(
            produced = report.produced,
            consumed = report.consumed,
            primes = report.totals.primes,
            elapsed_ms = report.elapsed_ms(),
            "pipeline finished"
        );

        Ok(report)
    }
}
