use thiserror::Error;

/// Error kinds shared across the Brainy workspace.
///
/// Every crate-local error type (`brainy_storage::StorageError`,
/// `brainy_vector::VectorError`, ...) converts into this one at a façade
/// boundary, so callers of `BrainyData` see one error enum regardless of
/// which layer raised it.
#[derive(Error, Debug)]
pub enum BrainyError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Logged and skipped, never surfaced to a caller (see propagation policy).
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("lock acquisition failed: {0}")]
    LockAcquisitionFailed(String),

    #[error("stage timed out: {0}")]
    StageTimeout(String),

    #[error("pipeline aborted: {0}")]
    PipelineAborted(String),

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("operation aborted")]
    Aborted,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrainyError>;
