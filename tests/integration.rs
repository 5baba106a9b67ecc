
use primeflow::{
    AggregateStrategy, Config, ItemSource, MalformedPolicy, MmapSource, Pipeline, PipelineError,
    ReaderSource, TrialDivision, VecSource, bucket, is_prime,
};
use std::io::Cursor;

fn run(values: &[i64], strategy: AggregateStrategy, threads: usize) -> primeflow::RunReport {
    let config = Config::new().with_workers(threads).with_strategy(strategy);
    Pipeline::new(config)
        .run(VecSource::new(values.to_vec()))
        .unwrap()
}

#[test]
fn test_strategy_equivalence_on_reference_input() {
    for strategy in AggregateStrategy::ALL {
        for threads in 1..=8 {
            let report = run(&fixtures::REFERENCE_INPUT, strategy, threads);
            assert_eq!(report.totals.primes, 4, "{strategy} x{threads}");
            assert_eq!(report.totals.non_primes, 5, "{strategy} x{threads}");
            assert_eq!(report.totals.sum, 54.0);
            assert_eq!(report.mean(), 6.0);
            assert_eq!(report.totals.histogram, [1, 0, 1, 1, 1, 1, 1, 1, 1, 1]);
            assert_eq!(report.produced, 9);
            assert_eq!(report.consumed, 9);
            assert!(report.check_consistency().is_ok());
        }
    }
}

#[test]
fn test_produced_equals_consumed_for_large_input() {
    let values: Vec<i64> = (0..50_000).collect();
    for strategy in AggregateStrategy::ALL {
        let report = run(&values, strategy, 6);
        assert_eq!(report.produced, values.len() as u64);
        assert_eq!(report.consumed, values.len() as u64);
        assert_eq!(
            report.workers.iter().map(|w| w.items).sum::<u64>(),
            values.len() as u64
        );
        assert_eq!(report.queue.pushed, report.queue.popped);
        assert!(report.totals.is_balanced());
    }
}

#[test]
fn test_totals_match_sequential_reference() {
    let values = fixtures::mixed_sign_fixture();
    let primes = values.iter().filter(|&&v| is_prime(v)).count() as u64;
    let sum: i64 = values.iter().sum();
    let mut histogram = [0u64; 10];
    for &v in &values {
        histogram[bucket(v)] += 1;
    }

    let atomic = run(&values, AggregateStrategy::Atomic, 4);
    let locked = run(&values, AggregateStrategy::Locked, 4);
    for report in [&atomic, &locked] {
        assert_eq!(report.totals.primes, primes);
        assert_eq!(report.totals.non_primes, values.len() as u64 - primes);
        assert_eq!(report.totals.sum, sum as f64);
        assert_eq!(report.totals.histogram, histogram);
    }
    assert_eq!(atomic.totals, locked.totals);
}

#[test]
fn test_single_thread_is_deterministic() {
    let values = fixtures::mixed_sign_fixture();
    let first = run(&values, AggregateStrategy::Atomic, 1);
    for _ in 0..5 {
        let again = run(&values, AggregateStrategy::Atomic, 1);
        assert_eq!(again.totals.sum.to_bits(), first.totals.sum.to_bits());
        assert_eq!(again.totals, first.totals);
    }
}

#[test]
fn test_negative_values_use_normalized_buckets() {
    let report = run(&[-1, -13, -20, 7], AggregateStrategy::Locked, 2);
    assert_eq!(report.totals.histogram, [1, 0, 0, 0, 0, 0, 0, 2, 0, 1]);
    assert_eq!(report.totals.primes, 1);
    assert_eq!(report.totals.sum, -27.0);
}

#[test]
fn test_bounded_queue_processes_everything() {
    let values: Vec<i64> = (0..10_000).collect();
    for capacity in [1, 4, 128] {
        let config = Config::new()
            .with_workers(4)
            .with_queue_capacity(capacity)
            .with_strategy(AggregateStrategy::Locked);
        let report = Pipeline::new(config)
            .run(VecSource::new(values.clone()))
            .unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.consumed, 10_000);
    }
}

#[test]
fn test_file_source_end_to_end() {
    let file = fixtures::write_numbers(&fixtures::REFERENCE_INPUT);
    let source = MmapSource::open(file.path(), u64::MAX).unwrap();
    let report = Pipeline::new(Config::new().with_workers(3))
        .run(source)
        .unwrap();
    assert_eq!(report.produced, 9);
    assert_eq!(report.totals.primes, 4);
    assert_eq!(report.mean(), 6.0);
}

#[test]
fn test_malformed_entries_are_skipped_by_default() {
    let file = fixtures::write_text("2 3 abc 5\n7 1.5 11\n");
    let source = MmapSource::open(file.path(), u64::MAX).unwrap();
    let report = Pipeline::new(Config::new().with_workers(2))
        .run(source)
        .unwrap();
    assert_eq!(report.produced, 5);
    assert_eq!(report.malformed, 2);
    assert_eq!(report.totals.primes, 5);
    assert!(report.source_error.is_none());
    assert!(report.is_consistent());
}

#[test]
fn test_stream_and_file_sources_agree_on_invalid_utf8() {
    let data: &[u8] = b"2 3\n5 \xff 7\n11 13\n";
    let file = fixtures::write_bytes(data);
    let pipeline = Pipeline::new(Config::new().with_workers(2));

    let streamed = pipeline.run(ReaderSource::new(Cursor::new(data))).unwrap();
    let mapped = pipeline
        .run(MmapSource::open(file.path(), u64::MAX).unwrap())
        .unwrap();

    for report in [&streamed, &mapped] {
        assert_eq!(report.produced, 6);
        assert_eq!(report.malformed, 1);
        assert!(report.source_error.is_none());
        assert_eq!(report.totals.primes, 6);
        assert!(report.is_consistent());
    }
    assert_eq!(streamed.totals, mapped.totals);
}

#[test]
fn test_strict_mode_stops_at_first_malformed_entry() {
    let file = fixtures::write_text("2 3 abc 5\n");
    let source = MmapSource::open(file.path(), u64::MAX).unwrap();
    let config = Config::new()
        .with_workers(2)
        .with_malformed_policy(MalformedPolicy::Stop);
    let report = Pipeline::new(config).run(source).unwrap();
    assert_eq!(report.produced, 2);
    assert!(matches!(
        report.source_error,
        Some(PipelineError::MalformedEntry { ref token, offset: 4 }) if token == "abc"
    ));
    assert!(report.is_consistent());
}

#[test]
fn test_empty_file_produces_empty_report() {
    let file = fixtures::write_text("");
    let source = MmapSource::open(file.path(), u64::MAX).unwrap();
    let report = Pipeline::new(Config::new().with_workers(4))
        .run(source)
        .unwrap();
    assert_eq!(report.produced, 0);
    assert_eq!(report.consumed, 0);
    assert_eq!(report.mean(), 0.0);
    assert!(report.is_consistent());
}

/// Yields items slowly so workers repeatedly find the queue open and empty.
struct TrickleSource {
    next: i64,
    end: i64,
}

impl ItemSource for TrickleSource {
    fn next_item(&mut self) -> Option<primeflow::Result<i64>> {
        if self.next >= self.end {
            return None;
        }
        std::thread::sleep(std::time::Duration::from_micros(200));
        self.next += 1;
        Some(Ok(self.next - 1))
    }
}

#[test]
fn test_workers_tolerate_slow_producer() {
    let pipeline = Pipeline::with_classifier(Config::new().with_workers(4), TrialDivision);
    let report = pipeline.run(TrickleSource { next: 0, end: 200 }).unwrap();
    assert_eq!(report.consumed, 200);
    assert!(report.is_consistent());
    assert!(report.queue.waits > 0);
}
