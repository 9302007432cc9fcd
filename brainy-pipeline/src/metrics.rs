//! Per-stage invocation and error counters.

use crate::stage::StageType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct StageCounters {
    invocations: AtomicU64,
    errors: AtomicU64,
}

/// Lock-free counters tracking how often each stage ran and failed.
/// Safe to share across tasks and read concurrently with pipeline runs.
pub struct PipelineMetrics {
    counters: [StageCounters; 6],
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self { counters: Default::default() }
    }
}

impl PipelineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn index(stage_type: StageType) -> usize {
        StageType::ORDER.iter().position(|s| *s == stage_type).expect("StageType::ORDER covers every variant")
    }

    pub fn record_invocation(&self, stage_type: StageType) {
        self.counters[Self::index(stage_type)].invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, stage_type: StageType) {
        self.counters[Self::index(stage_type)].errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocations(&self, stage_type: StageType) -> u64 {
        self.counters[Self::index(stage_type)].invocations.load(Ordering::Relaxed)
    }

    pub fn errors(&self, stage_type: StageType) -> u64 {
        self.counters[Self::index(stage_type)].errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_independent_per_stage() {
        let metrics = PipelineMetrics::new();
        metrics.record_invocation(StageType::Sense);
        metrics.record_invocation(StageType::Sense);
        metrics.record_error(StageType::Sense);
        metrics.record_invocation(StageType::Memory);

        assert_eq!(metrics.invocations(StageType::Sense), 2);
        assert_eq!(metrics.errors(StageType::Sense), 1);
        assert_eq!(metrics.invocations(StageType::Memory), 1);
        assert_eq!(metrics.errors(StageType::Memory), 0);
    }
}
