//! Vector search for Brainy.
//!
//! Provides high-performance approximate nearest neighbor search using HNSW
//! indexing, for embedding-based semantic recall over noun records.
//!
//! # Features
//!
//! - **HNSW Indexing**: Hierarchical Navigable Small World graphs for fast approximate nearest neighbor search
//! - **Multiple Distance Metrics**: Cosine similarity, Euclidean, Manhattan, dot product
//! - **Persistence**: Backed by any [`brainy_storage::StorageAdapter`]
//!
//! # Example
//!
//! ```rust,no_run
//! use brainy_vector::{VectorIndex, Vector, DistanceMetric};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = VectorIndex::new(384, DistanceMetric::Cosine)?;
//!
//! let vec1 = Vector::new(vec![0.1; 384]);
//! index.insert("noun-1".to_string(), vec1).await?;
//!
//! let query = Vector::new(vec![0.1; 384]);
//! let results = index.search(&query, 10).await?;
//! # Ok(())
//! # }
//! ```

mod distance;
mod hnsw;
mod storage;
mod types;
mod vector;

pub use distance::DistanceMetric;
pub use hnsw::{HnswConfig, HnswIndex};
pub use storage::PersistentVectorIndex;
pub use types::{NounId, SearchResult};
pub use vector::{Vector, VectorIndex, VectorIndexConfig};

/// Errors that can occur during vector operations
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector not found: {0}")]
    NotFound(NounId),

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] brainy_storage::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Index error: {0}")]
    IndexError(String),
}

pub type Result<T> = std::result::Result<T, VectorError>;
