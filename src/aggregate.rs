use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::classify::Classification;
use crate::error::PipelineError;

pub const BUCKETS: usize = 10;

/// Histogram bucket for `value`: its last decimal digit, normalized so that
/// negative values land in 0..=9 as well (-13 goes to bucket 7).
#[inline(always)]
pub fn bucket(value: i64) -> usize {
    value.rem_euclid(BUCKETS as i64) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateStrategy {
    /// Every field is its own atomic counter.
    #[default]
    Atomic,
    /// One mutex guards the whole record.
    Locked,
}

impl AggregateStrategy {
    pub const ALL: [AggregateStrategy; 2] = [AggregateStrategy::Atomic, AggregateStrategy::Locked];

    pub fn name(self) -> &'static str {
        match self {
            AggregateStrategy::Atomic => "atomic",
            AggregateStrategy::Locked => "locked",
        }
    }
}

impl fmt::Display for AggregateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "atomic" | "atomics" => Ok(AggregateStrategy::Atomic),
            "locked" | "mutex" | "lock" => Ok(AggregateStrategy::Locked),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown aggregation strategy '{other}' (expected atomic or locked)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateSnapshot {
    pub primes: u64,
    pub non_primes: u64,
    pub consumed: u64,
    pub sum: f64,
    pub histogram: [u64; BUCKETS],
}

impl AggregateSnapshot {
    #[inline]
    pub fn record(&mut self, value: i64, class: Classification) {
        match class {
            Classification::Prime => self.primes += 1,
            Classification::NonPrime => self.non_primes += 1,
        }
        self.sum += value as f64;
        self.histogram[bucket(value)] += 1;
        self.consumed += 1;
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        if self.consumed > 0 {
            self.sum / self.consumed as f64
        } else {
            0.0
        }
    }

    /// Every per-field total agrees with `consumed`.
    pub fn is_balanced(&self) -> bool {
        self.primes + self.non_primes == self.consumed
            && self.histogram.iter().sum::<u64>() == self.consumed
    }
}

/// Shared sink every worker folds its items into.
pub trait Aggregator: Send + Sync {
    fn strategy(&self) -> AggregateStrategy;
    fn record(&self, value: i64, class: Classification);
    fn snapshot(&self) -> AggregateSnapshot;
}

/// Independent relaxed counters. Totals are exact once all writers have been
/// joined; a snapshot taken while writers run may mix fields from different
/// items.
#[repr(align(64))]
pub struct AtomicAggregate {
    primes: AtomicU64,
    non_primes: AtomicU64,
    consumed: AtomicU64,
    sum_bits: AtomicU64,
    histogram: [AtomicU64; BUCKETS],
}

impl AtomicAggregate {
    pub fn new() -> Self {
        Self {
            primes: AtomicU64::new(0),
            non_primes: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
            histogram: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline(always)]
    fn add_sum(&self, delta: f64) {
        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(c) => current = c,
            }
        }
    }
}

impl Default for AtomicAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for AtomicAggregate {
    fn strategy(&self) -> AggregateStrategy {
        AggregateStrategy::Atomic
    }

    #[inline]
    fn record(&self, value: i64, class: Classification) {
        match class {
            Classification::Prime => self.primes.fetch_add(1, Ordering::Relaxed),
            Classification::NonPrime => self.non_primes.fetch_add(1, Ordering::Relaxed),
        };
        self.add_sum(value as f64);
        self.histogram[bucket(value)].fetch_add(1, Ordering::Relaxed);
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            primes: self.primes.load(Ordering::Relaxed),
            non_primes: self.non_primes.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            sum: f64::from_bits(self.sum_bits.load(Ordering::Relaxed)),
            histogram: std::array::from_fn(|i| self.histogram[i].load(Ordering::Relaxed)),
        }
    }
}

/// All fields behind one lock; any snapshot reflects a whole number of items.
#[derive(Default)]
pub struct LockedAggregate {
    totals: Mutex<AggregateSnapshot>,
}

impl LockedAggregate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for LockedAggregate {
    fn strategy(&self) -> AggregateStrategy {
        AggregateStrategy::Locked
    }

    #[inline]
    fn record(&self, value: i64, class: Classification) {
        self.totals.lock().record(value, class);
    }

    fn snapshot(&self) -> AggregateSnapshot {
        *self.totals.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classifier, TrialDivision};
    use std::thread;

    fn fold(agg: &dyn Aggregator, values: &[i64]) {
        for &v in values {
            agg.record(v, TrialDivision.classify(v));
        }
    }

    #[test]
    fn test_bucket_normalizes_negatives() {
        assert_eq!(bucket(0), 0);
        assert_eq!(bucket(19), 9);
        assert_eq!(bucket(-1), 9);
        assert_eq!(bucket(-13), 7);
        assert_eq!(bucket(-20), 0);
        assert_eq!(bucket(i64::MIN), 2);
    }

    #[test]
    fn test_strategies_agree_on_reference_input() {
        let input = [2, 3, 4, 5, 6, 7, 8, 9, 10];
        let atomic = AtomicAggregate::new();
        let locked = LockedAggregate::new();
        fold(&atomic, &input);
        fold(&locked, &input);

        let a = atomic.snapshot();
        assert_eq!(a, locked.snapshot());
        assert_eq!(a.primes, 4);
        assert_eq!(a.non_primes, 5);
        assert_eq!(a.consumed, 9);
        assert_eq!(a.sum, 54.0);
        assert_eq!(a.mean(), 6.0);
        assert_eq!(a.histogram, [1, 0, 1, 1, 1, 1, 1, 1, 1, 1]);
        assert!(a.is_balanced());
    }

    #[test]
    fn test_mean_of_empty_is_zero() {
        let snap = AtomicAggregate::new().snapshot();
        assert_eq!(snap.consumed, 0);
        assert_eq!(snap.mean(), 0.0);
        assert!(snap.is_balanced());
    }

    #[test]
    fn test_atomic_sum_under_contention() {
        let agg = AtomicAggregate::new();
        thread::scope(|s| {
            for t in 0..8i64 {
                let agg = &agg;
                s.spawn(move || {
                    for i in 0..1000 {
                        agg.record(t * 1000 + i, Classification::NonPrime);
                    }
                });
            }
        });
        let snap = agg.snapshot();
        assert_eq!(snap.consumed, 8000);
        assert_eq!(snap.sum, (0..8000).sum::<i64>() as f64);
        assert!(snap.is_balanced());
    }

    #[test]
    fn test_locked_snapshots_are_always_balanced() {
        let agg = LockedAggregate::new();
        thread::scope(|s| {
            for _ in 0..4 {
                let agg = &agg;
                s.spawn(move || fold(agg, &(0..2000).collect::<Vec<_>>()));
            }
            let agg = &agg;
            s.spawn(move || {
                for _ in 0..500 {
                    assert!(agg.snapshot().is_balanced());
                }
            });
        });
        assert_eq!(agg.snapshot().consumed, 8000);
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("atomic".parse::<AggregateStrategy>().unwrap(), AggregateStrategy::Atomic);
        assert_eq!("Mutex".parse::<AggregateStrategy>().unwrap(), AggregateStrategy::Locked);
        assert!("spin".parse::<AggregateStrategy>().is_err());
        assert_eq!(AggregateStrategy::Locked.to_string(), "locked");
    }
}
