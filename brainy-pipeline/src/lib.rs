//! Augmentation pipeline: registry, six-stage execution, and streaming
//! ingestion on top of it.

pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod streaming;

pub use metrics::PipelineMetrics;
pub use pipeline::{Pipeline, PipelineConfig, PipelineResult};
pub use registry::AugmentationRegistry;
pub use stage::{Augmentation, PipelineContext, StageOutcome, StageType};
pub use streaming::{ingest, StreamingConfig, StreamingMetrics};
