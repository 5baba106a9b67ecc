//! Parallel integer classification pipeline.
//!
//! One producer thread reads integers from an [`ItemSource`] into a shared
//! [`WorkQueue`]; a pool of workers pops them, classifies each as prime or not
//! and folds the result into an [`Aggregator`]. Two aggregators are provided:
//! [`AtomicAggregate`] (one atomic per field) and [`LockedAggregate`] (one
//! mutex around the whole record).

pub mod aggregate;
pub mod bench;
pub mod classify;
pub mod cli;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod queue;
pub mod report;
pub mod source;

mod builder;

pub use aggregate::{
    AggregateSnapshot, AggregateStrategy, Aggregator, AtomicAggregate, BUCKETS, LockedAggregate,
    bucket,
};
pub use builder::PipelineBuilder;
pub use classify::{Classification, Classifier, TrialDivision, is_prime};
pub use concurrent::{Pipeline, ProducerStats, WorkerStats, produce, work};
pub use config::{Config, MAX_WORKERS, MalformedPolicy, available_workers};
pub use error::{PipelineError, Result};
pub use queue::{CloseGuard, Pop, PushError, QueueStatsSnapshot, WorkQueue};
pub use report::{
    OutputFormat, ReportOptions, RunReport, write_consistency_error, write_report,
};
pub use source::{ItemSource, MmapSource, ReaderSource, TokenScanner, VecSource, open_source};
