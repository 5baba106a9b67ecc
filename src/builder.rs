use crate::aggregate::AggregateStrategy;
use crate::classify::{Classifier, TrialDivision};
use crate::config::{Config, MAX_WORKERS, MalformedPolicy};
use crate::concurrent::Pipeline;

#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: Config,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    /// One worker per available core.
    pub fn auto_workers(mut self) -> Self {
        self.config.num_workers = 0;
        self
    }

    pub fn strategy(mut self, strategy: AggregateStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn atomic(self) -> Self {
        self.strategy(AggregateStrategy::Atomic)
    }

    pub fn locked(self) -> Self {
        self.strategy(AggregateStrategy::Locked)
    }

    pub fn bounded(mut self, capacity: usize) -> Self {
        self.config = self.config.with_queue_capacity(capacity);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.config = self.config.unbounded();
        self
    }

    pub fn skip_malformed(mut self) -> Self {
        self.config.malformed = MalformedPolicy::Skip;
        self
    }

    pub fn strict(mut self) -> Self {
        self.config.malformed = MalformedPolicy::Stop;
        self
    }

    pub fn max_source_size_mb(mut self, size_mb: u64) -> Self {
        self.config = self.config.with_max_source_size_mb(size_mb);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build_config(self) -> Config {
        self.config
    }

    pub fn build(self) -> Pipeline<TrialDivision> {
        Pipeline::new(self.config)
    }

    pub fn build_with_classifier<C: Classifier>(self, classifier: C) -> Pipeline<C> {
        Pipeline::with_classifier(self.config, classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::source::VecSource;

    #[test]
    fn test_workers_are_clamped() {
        assert_eq!(PipelineBuilder::new().workers(0).config().num_workers, 1);
        assert_eq!(
            PipelineBuilder::new().workers(usize::MAX).config().num_workers,
            MAX_WORKERS
        );
        assert_eq!(PipelineBuilder::new().workers(3).auto_workers().config().num_workers, 0);
    }

    #[test]
    fn test_builder_sets_config() {
        let config = PipelineBuilder::new()
            .workers(2)
            .locked()
            .bounded(16)
            .strict()
            .max_source_size_mb(1)
            .build_config();
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.strategy, AggregateStrategy::Locked);
        assert_eq!(config.queue_capacity, Some(16));
        assert_eq!(config.malformed, MalformedPolicy::Stop);
        assert_eq!(config.max_source_size, 1024 * 1024);

        let config = PipelineBuilder::from_config(config)
            .atomic()
            .unbounded()
            .skip_malformed()
            .build_config();
        assert_eq!(config.strategy, AggregateStrategy::Atomic);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.malformed, MalformedPolicy::Skip);
    }

    #[test]
    fn test_build_with_custom_classifier() {
        let pipeline = PipelineBuilder::new()
            .workers(2)
            .build_with_classifier(|_v: i64| Classification::Prime);
        let report = pipeline.run(VecSource::new(vec![4, 6, 8])).unwrap();
        assert_eq!(report.totals.primes, 3);
        assert_eq!(report.totals.non_primes, 0);
    }
}
