//! Pipeline execution: runs the six stages in order against a registry.

use crate::metrics::PipelineMetrics;
use crate::registry::AugmentationRegistry;
use crate::stage::{PipelineContext, StageOutcome, StageType};
use brainy_core::{BrainyError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// If true, a failing stage aborts the whole pipeline. If false, the
    /// failure is recorded and downstream stages run on the failing
    /// stage's original input.
    pub stop_on_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { stop_on_error: true }
    }
}

/// The result of running the full pipeline once.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub success: bool,
    pub stage_results: HashMap<StageType, StageOutcome>,
    pub output: Value,
}

/// Runs augmentations registered in an [`AugmentationRegistry`] across the
/// six fixed stages.
pub struct Pipeline {
    registry: Arc<AugmentationRegistry>,
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(registry: Arc<AugmentationRegistry>, config: PipelineConfig) -> Self {
        Self { registry, config, metrics: PipelineMetrics::new() }
    }

    pub fn with_metrics(registry: Arc<AugmentationRegistry>, config: PipelineConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self { registry, config, metrics }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Runs every stage, in fixed order, against `input`.
    pub async fn run(&self, input: Value, context: &PipelineContext) -> PipelineResult {
        let mut current = input;
        let mut stage_results = HashMap::new();
        let mut aborted = false;

        for stage_type in StageType::ORDER {
            if aborted {
                break;
            }

            let stage_input = current.clone();
            let outcome = self.run_stage(stage_type, stage_input.clone(), context).await;

            if !outcome.success {
                if self.config.stop_on_error {
                    aborted = true;
                } else {
                    current = stage_input;
                }
            } else {
                current = outcome.data.clone();
            }

            stage_results.insert(stage_type, outcome);
        }

        let success = stage_results.values().all(|o| o.success);
        PipelineResult { success, stage_results, output: current }
    }

    async fn run_stage(&self, stage_type: StageType, input: Value, context: &PipelineContext) -> StageOutcome {
        let augmentations = self.registry.enabled_for(stage_type);
        if augmentations.is_empty() {
            return StageOutcome::ok(input);
        }

        self.metrics.record_invocation(stage_type);
        let mut current = input;
        for augmentation in augmentations {
            let attempt_input = current.clone();
            let invocation = augmentation.execute(attempt_input.clone(), context);

            let result: Result<StageOutcome> = match augmentation.timeout() {
                Some(duration) => run_with_timeout(duration, invocation).await,
                None => invocation.await,
            };

            match result {
                Ok(outcome) if outcome.success => {
                    current = outcome.data;
                }
                Ok(outcome) => {
                    tracing::warn!(
                        stage = %stage_type,
                        augmentation = augmentation.name(),
                        error = ?outcome.error,
                        "augmentation reported failure"
                    );
                    self.metrics.record_error(stage_type);
                    return outcome;
                }
                Err(err) => {
                    tracing::warn!(
                        stage = %stage_type,
                        augmentation = augmentation.name(),
                        error = %err,
                        "augmentation invocation errored"
                    );
                    self.metrics.record_error(stage_type);
                    return StageOutcome::failed(attempt_input, err.to_string());
                }
            }
        }

        StageOutcome::ok(current)
    }
}

async fn run_with_timeout(
    duration: Duration,
    future: impl std::future::Future<Output = Result<StageOutcome>>,
) -> Result<StageOutcome> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(BrainyError::StageTimeout(format!("stage exceeded {duration:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Augmentation;
    use async_trait::async_trait;
    use serde_json::json;

    struct Uppercase;

    #[async_trait]
    impl Augmentation for Uppercase {
        fn name(&self) -> &str {
            "uppercase"
        }

        fn stage_type(&self) -> StageType {
            StageType::Sense
        }

        async fn execute(&self, input: Value, _context: &PipelineContext) -> Result<StageOutcome> {
            let text = input.as_str().unwrap_or_default().to_uppercase();
            Ok(StageOutcome::ok(json!(text)))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Augmentation for AlwaysFails {
        fn name(&self) -> &str {
            "failer"
        }

        fn stage_type(&self) -> StageType {
            StageType::Memory
        }

        async fn execute(&self, input: Value, _context: &PipelineContext) -> Result<StageOutcome> {
            Ok(StageOutcome::failed(input, "persistence unavailable"))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl Augmentation for SlowHandler {
        fn name(&self) -> &str {
            "slow"
        }

        fn stage_type(&self) -> StageType {
            StageType::Cognition
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(10))
        }

        async fn execute(&self, input: Value, _context: &PipelineContext) -> Result<StageOutcome> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(StageOutcome::ok(input))
        }
    }

    struct RecordsContext;

    #[async_trait]
    impl Augmentation for RecordsContext {
        fn name(&self) -> &str {
            "context-reader"
        }

        fn stage_type(&self) -> StageType {
            StageType::Perception
        }

        async fn execute(&self, input: Value, context: &PipelineContext) -> Result<StageOutcome> {
            let tag = context.get("tag").cloned().unwrap_or(Value::Null);
            Ok(StageOutcome::ok(json!({"input": input, "tag": tag})))
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline_passes_input_through_unchanged() {
        let registry = Arc::new(AugmentationRegistry::new());
        let pipeline = Pipeline::new(registry, PipelineConfig::default());
        let result = pipeline.run(json!("hello"), &PipelineContext::new()).await;
        assert!(result.success);
        assert_eq!(result.output, json!("hello"));
    }

    #[tokio::test]
    async fn test_stage_transforms_data_for_downstream_stages() {
        let registry = Arc::new(AugmentationRegistry::new());
        registry.register(Arc::new(Uppercase)).unwrap();
        let pipeline = Pipeline::new(registry, PipelineConfig::default());
        let result = pipeline.run(json!("hi"), &PipelineContext::new()).await;
        assert!(result.success);
        assert_eq!(result.output, json!("HI"));
    }

    #[tokio::test]
    async fn test_stop_on_error_true_aborts_downstream_stages() {
        let registry = Arc::new(AugmentationRegistry::new());
        registry.register(Arc::new(AlwaysFails)).unwrap();
        registry.register(Arc::new(RecordsContext)).unwrap();
        let pipeline = Pipeline::new(registry, PipelineConfig { stop_on_error: true });

        let result = pipeline.run(json!("input"), &PipelineContext::new()).await;
        assert!(!result.success);
        assert!(!result.stage_results[&StageType::Memory].success);
        assert!(!result.stage_results.contains_key(&StageType::Perception));
    }

    #[tokio::test]
    async fn test_stop_on_error_false_forwards_original_input_downstream() {
        let registry = Arc::new(AugmentationRegistry::new());
        registry.register(Arc::new(AlwaysFails)).unwrap();
        registry.register(Arc::new(RecordsContext)).unwrap();
        let pipeline = Pipeline::new(registry, PipelineConfig { stop_on_error: false });

        let result = pipeline.run(json!("input"), &PipelineContext::new()).await;
        assert!(!result.success, "aggregate success is false when any stage failed");
        assert!(result.stage_results.contains_key(&StageType::Perception));
        let perception = &result.stage_results[&StageType::Perception];
        assert_eq!(perception.data["input"], json!("input"));
    }

    #[tokio::test]
    async fn test_stage_timeout_yields_stage_timeout_error() {
        let registry = Arc::new(AugmentationRegistry::new());
        registry.register(Arc::new(SlowHandler)).unwrap();
        let pipeline = Pipeline::new(registry, PipelineConfig::default());

        let result = pipeline.run(json!("x"), &PipelineContext::new()).await;
        assert!(!result.success);
        let outcome = &result.stage_results[&StageType::Cognition];
        assert!(outcome.error.as_ref().unwrap().contains("exceeded"));
    }

    #[tokio::test]
    async fn test_context_is_visible_to_handlers() {
        let registry = Arc::new(AugmentationRegistry::new());
        registry.register(Arc::new(RecordsContext)).unwrap();
        let pipeline = Pipeline::new(registry, PipelineConfig::default());

        let mut context = PipelineContext::new();
        context.insert("tag".to_string(), json!("trace-1"));

        let result = pipeline.run(json!("payload"), &context).await;
        assert!(result.success);
        assert_eq!(result.output["tag"], json!("trace-1"));
    }
}
