use crate::aggregate::AggregateStrategy;

/// Upper bound on worker threads for any configuration.
pub const MAX_WORKERS: usize = 1024;

/// What the producer does with an entry that does not parse as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Count it, log it, keep reading.
    #[default]
    Skip,
    /// Treat it as the end of the source.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Worker threads; 0 means one per available core.
    pub num_workers: usize,
    pub strategy: AggregateStrategy,
    /// `None` for an unbounded queue.
    pub queue_capacity: Option<usize>,
    pub malformed: MalformedPolicy,
    pub max_source_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            num_workers: 0,
            strategy: AggregateStrategy::Atomic,
            queue_capacity: None,
            malformed: MalformedPolicy::Skip,
            max_source_size: 16 * 1024 * 1024 * 1024, // 16 GB
        }
    }

    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    pub const fn with_strategy(mut self, strategy: AggregateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(if capacity == 0 { 1 } else { capacity });
        self
    }

    pub const fn unbounded(mut self) -> Self {
        self.queue_capacity = None;
        self
    }

    pub const fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    pub const fn with_max_source_size(mut self, size: u64) -> Self {
        self.max_source_size = size;
        self
    }

    pub const fn with_max_source_size_mb(mut self, size_mb: u64) -> Self {
        self.max_source_size = size_mb.saturating_mul(1024 * 1024);
        self
    }

    /// Worker count with the "auto" value resolved, capped at [`MAX_WORKERS`].
    pub fn workers(&self) -> usize {
        let workers = if self.num_workers == 0 {
            available_workers()
        } else {
            self.num_workers
        };
        workers.min(MAX_WORKERS)
    }
}

pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
