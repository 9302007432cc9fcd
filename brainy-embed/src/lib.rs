//! Embedding dispatch bridge for Brainy.
//!
//! Wraps an opaque [`EmbeddingFunction`] (the consumed interface of the
//! core spec: `embed(text) -> vector`) and decides, per [`DispatchMode`],
//! whether a call runs inline on the caller's task or is handed to a
//! worker task. A worker dispatch that fails sticks to inline for the
//! rest of the process rather than retrying the worker path on every
//! subsequent call.

use async_trait::async_trait;
use brainy_core::{BrainyError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A fixed-dimension embedding vector.
pub type Vector = Vec<f32>;

/// The consumed embedding interface (§6.2): fixed output dimension, empty
/// input yields a zero vector, concurrent invocation is safe.
#[async_trait]
pub trait EmbeddingFunction: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Default batch implementation calls `embed` sequentially; backends
    /// with a native batch API should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize;
}

/// Where an embedding call actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Hand off to a `tokio::spawn`ed worker task.
    Worker,
    /// Run on the caller's own task.
    Inline,
}

/// Routes embedding calls to a worker task or inline, per [`DispatchMode`],
/// falling back to inline for the rest of the process the first time a
/// worker dispatch fails.
pub struct EmbeddingBridge {
    function: Arc<dyn EmbeddingFunction>,
    mode: DispatchMode,
    worker_failed: AtomicBool,
}

impl EmbeddingBridge {
    pub fn new(function: Arc<dyn EmbeddingFunction>, mode: DispatchMode) -> Self {
        Self {
            function,
            mode,
            worker_failed: AtomicBool::new(false),
        }
    }

    pub fn dimension(&self) -> usize {
        self.function.dimension()
    }

    /// Embeds a single piece of text. Empty input returns a zero vector
    /// without invoking the underlying function.
    pub async fn embed(&self, text: &str) -> Result<Vector> {
        if text.is_empty() {
            return Ok(vec![0.0; self.dimension()]);
        }

        if self.mode == DispatchMode::Worker && !self.worker_failed.load(Ordering::Acquire) {
            match self.embed_on_worker(text).await {
                Ok(vector) => return Ok(vector),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "embedding worker dispatch failed, falling back to inline for the remainder of the process"
                    );
                    self.worker_failed.store(true, Ordering::Release);
                }
            }
        }

        self.function.embed(text).await
    }

    /// Embeds a batch, auto-detecting the all-empty case the same way
    /// `embed` does for a single string.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if self.mode == DispatchMode::Worker && !self.worker_failed.load(Ordering::Acquire) {
            let function = self.function.clone();
            let owned = texts.to_vec();
            match tokio::spawn(async move { function.embed_batch(&owned).await }).await {
                Ok(result) => return result,
                Err(join_err) => {
                    tracing::warn!(
                        error = %join_err,
                        "embedding worker dispatch failed, falling back to inline for the remainder of the process"
                    );
                    self.worker_failed.store(true, Ordering::Release);
                }
            }
        }

        self.function.embed_batch(texts).await
    }

    async fn embed_on_worker(&self, text: &str) -> Result<Vector> {
        let function = self.function.clone();
        let owned = text.to_string();
        tokio::spawn(async move { function.embed(&owned).await })
            .await
            .map_err(|e| BrainyError::EmbeddingFailed(format!("worker task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FixedEmbedder {
        dim: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingFunction for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vector> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(vec![text.len() as f32; self.dim])
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingFunction for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vector> {
            Err(BrainyError::EmbeddingFailed("boom".to_string()))
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn test_empty_input_returns_zero_vector() {
        let bridge = EmbeddingBridge::new(Arc::new(FixedEmbedder { dim: 8, calls: AtomicUsize::new(0) }), DispatchMode::Inline);
        let result = bridge.embed("").await.unwrap();
        assert_eq!(result, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_inline_dispatch_calls_function_directly() {
        let embedder = Arc::new(FixedEmbedder { dim: 4, calls: AtomicUsize::new(0) });
        let bridge = EmbeddingBridge::new(embedder.clone(), DispatchMode::Inline);
        let result = bridge.embed("hello").await.unwrap();
        assert_eq!(result, vec![5.0; 4]);
        assert_eq!(embedder.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_worker_dispatch_runs_on_spawned_task() {
        let embedder = Arc::new(FixedEmbedder { dim: 3, calls: AtomicUsize::new(0) });
        let bridge = EmbeddingBridge::new(embedder.clone(), DispatchMode::Worker);
        let result = bridge.embed("abc").await.unwrap();
        assert_eq!(result, vec![3.0; 3]);
    }

    #[tokio::test]
    async fn test_batch_embed_preserves_order() {
        let embedder = Arc::new(FixedEmbedder { dim: 1, calls: AtomicUsize::new(0) });
        let bridge = EmbeddingBridge::new(embedder, DispatchMode::Inline);
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let results = bridge.embed_batch(&texts).await.unwrap();
        assert_eq!(results, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[tokio::test]
    async fn test_underlying_function_error_propagates_when_inline() {
        let bridge = EmbeddingBridge::new(Arc::new(FailingEmbedder), DispatchMode::Inline);
        let err = bridge.embed("x").await.unwrap_err();
        assert!(matches!(err, BrainyError::EmbeddingFailed(_)));
    }
}
