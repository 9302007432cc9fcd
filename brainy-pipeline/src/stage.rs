//! Stage contract and the six fixed augmentation types.

use async_trait::async_trait;
use brainy_core::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One of the six fixed points in the pipeline. Order here is execution
/// order: SENSE feeds MEMORY feeds COGNITION, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageType {
    Sense,
    Memory,
    Cognition,
    Conduit,
    Activation,
    Perception,
}

impl StageType {
    /// The six stages in their fixed execution order.
    pub const ORDER: [StageType; 6] = [
        StageType::Sense,
        StageType::Memory,
        StageType::Cognition,
        StageType::Conduit,
        StageType::Activation,
        StageType::Perception,
    ];
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageType::Sense => "sense",
            StageType::Memory => "memory",
            StageType::Cognition => "cognition",
            StageType::Conduit => "conduit",
            StageType::Activation => "activation",
            StageType::Perception => "perception",
        };
        write!(f, "{s}")
    }
}

/// Opaque bag of request-scoped values passed to every stage invocation.
pub type PipelineContext = HashMap<String, Value>;

/// A stage's verdict on one invocation.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn failed(input: Value, error: impl Into<String>) -> Self {
        Self { success: false, data: input, error: Some(error.into()) }
    }
}

/// A pluggable augmentation handler for one stage type.
///
/// `execute` never errors on its own business logic failing — a failed
/// handler returns `StageOutcome::failed`. The `Result` here is reserved
/// for infrastructure failures (e.g. a panic caught upstream); handlers
/// should prefer `StageOutcome::failed` over propagating an error.
#[async_trait]
pub trait Augmentation: Send + Sync {
    /// Unique within its `stage_type`; used as the registry key together
    /// with the type.
    fn name(&self) -> &str;

    fn stage_type(&self) -> StageType;

    /// `None` means no timeout is enforced for this handler.
    fn timeout(&self) -> Option<std::time::Duration> {
        None
    }

    async fn execute(&self, input: Value, context: &PipelineContext) -> Result<StageOutcome>;
}
