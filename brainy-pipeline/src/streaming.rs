//! Attaches a pipeline to a streaming source of messages.
//!
//! Each message becomes an independent pipeline invocation. Concurrency is
//! bounded by a semaphore-backed parallelism cap; when the cap is
//! saturated, pulling the next message from the source is paused until a
//! permit frees up, which is how back-pressure reaches the source.

use crate::pipeline::{Pipeline, PipelineResult};
use crate::stage::PipelineContext;
use futures::Stream;
use futures::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Parallelism cap and counters for a streaming run.
pub struct StreamingConfig {
    pub parallelism: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { parallelism: 8 }
    }
}

/// Running counters for a streaming ingestion, safe to read from another
/// task while ingestion is in progress.
#[derive(Default)]
pub struct StreamingMetrics {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl StreamingMetrics {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record(&self, result: &PipelineResult) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if result.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Drives `source` through `pipeline`, one invocation per message, with
/// concurrency bounded by `config.parallelism`. Reading the next message
/// from `source` is itself gated on acquiring a permit, so an exhausted
/// cap naturally pauses the read side.
pub async fn ingest<S>(
    pipeline: Arc<Pipeline>,
    mut source: S,
    context: PipelineContext,
    config: StreamingConfig,
) -> Arc<StreamingMetrics>
where
    S: Stream<Item = Value> + Unpin,
{
    let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
    let metrics = Arc::new(StreamingMetrics::default());
    let mut in_flight = Vec::new();

    while let Some(message) = source.next().await {
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let pipeline = pipeline.clone();
        let metrics = metrics.clone();
        let context = context.clone();

        let handle = tokio::spawn(async move {
            let result = pipeline.run(message, &context).await;
            metrics.record(&result);
            drop(permit);
        });
        in_flight.push(handle);
    }

    for handle in in_flight {
        let _ = handle.await;
    }

    metrics
}
