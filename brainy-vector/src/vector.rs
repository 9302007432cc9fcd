//! Vector type and the in-memory HNSW-backed index.

use crate::{DistanceMetric, HnswConfig, HnswIndex, NounId, Result, SearchResult, VectorError};
use serde::{Deserialize, Serialize};

/// A vector with a fixed dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vector {
    /// The vector data
    pub data: Vec<f32>,
}

impl Vector {
    /// Create a new vector
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of this vector
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    /// Normalize this vector to unit length
    pub fn normalize(&mut self) {
        crate::distance::normalize(&mut self.data);
    }

    /// Get a normalized copy of this vector
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// Calculate magnitude (L2 norm)
    pub fn magnitude(&self) -> f32 {
        crate::distance::magnitude(&self.data)
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[f32]> for Vector {
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}

/// Configuration for vector index
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Dimension of vectors
    pub dimension: usize,
    /// Distance metric to use
    pub metric: DistanceMetric,
    /// HNSW configuration
    pub hnsw_config: HnswConfig,
}

impl VectorIndexConfig {
    /// Create a new configuration with default HNSW parameters
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            hnsw_config: HnswConfig::default(),
        }
    }

    /// Set HNSW configuration
    pub fn with_hnsw_config(mut self, config: HnswConfig) -> Self {
        self.hnsw_config = config;
        self
    }
}

/// Vector index with HNSW for fast similarity search. Keyed by `NounId`
/// since every vector corresponds 1:1 to a noun elsewhere in the system;
/// metadata lives on the noun record, not here.
pub struct VectorIndex {
    config: VectorIndexConfig,
    hnsw: HnswIndex,
    vectors: std::collections::HashMap<NounId, Vector>,
}

impl VectorIndex {
    /// Create a new vector index
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self> {
        let config = VectorIndexConfig::new(dimension, metric);
        Self::with_config(config)
    }

    /// Create a vector index with custom configuration
    pub fn with_config(config: VectorIndexConfig) -> Result<Self> {
        let hnsw = HnswIndex::new(config.hnsw_config.clone(), config.metric);
        Ok(Self {
            config,
            hnsw,
            vectors: std::collections::HashMap::new(),
        })
    }

    /// Get the dimension of vectors in this index
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Get the distance metric used by this index
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Insert a vector into the index
    pub async fn insert(&mut self, id: NounId, vector: Vector) -> Result<()> {
        if vector.dim() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.dim(),
            });
        }

        self.hnsw.insert(id.clone(), &vector.data)?;
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Search for k nearest neighbors
    pub async fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        if query.dim() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.dim(),
            });
        }

        self.hnsw.search(&query.data, k)
    }

    /// Get a vector by ID
    pub fn get(&self, id: &NounId) -> Option<&Vector> {
        self.vectors.get(id)
    }

    /// Soft-delete a vector: excluded from search results, graph edges
    /// retained. This is the default delete mode.
    pub async fn delete(&mut self, id: &NounId) -> Result<()> {
        if !self.vectors.contains_key(id) {
            return Err(VectorError::NotFound(id.clone()));
        }
        self.hnsw.soft_delete(id)?;
        self.vectors.remove(id);
        Ok(())
    }

    /// Hard-delete a vector: physically removed from the graph, direct
    /// neighbors' back-edges torn down and re-pruned.
    pub async fn hard_delete(&mut self, id: &NounId) -> Result<()> {
        if !self.vectors.contains_key(id) {
            return Err(VectorError::NotFound(id.clone()));
        }
        self.hnsw.hard_delete(id)?;
        self.vectors.remove(id);
        Ok(())
    }

    /// Re-prunes a node's neighbor lists back down to their configured
    /// caps without waiting for the next insert to trigger it.
    pub fn prune(&mut self, id: &NounId) -> Result<()> {
        self.hnsw.prune(id)
    }

    /// Get all vector IDs in the index
    pub fn ids(&self) -> Vec<NounId> {
        self.vectors.keys().cloned().collect()
    }

    /// Per-layer neighbor ids for a node, for persistence.
    pub fn connections_for(&self, id: &NounId) -> Option<brainy_core::Connections> {
        self.hnsw.connections_for(id)
    }

    /// The raw vector for a node even if it has been soft-deleted (the
    /// HNSW graph keeps tombstoned vectors around for traversal).
    pub fn raw_vector_for(&self, id: &NounId) -> Option<Vec<f32>> {
        self.hnsw.vector_for(id).cloned()
    }

    pub fn is_tombstoned(&self, id: &NounId) -> bool {
        self.hnsw.is_tombstoned(id)
    }

    /// Reinstates a node loaded from storage without running it back
    /// through the insert algorithm.
    pub fn rehydrate(
        &mut self,
        id: NounId,
        vector: Vector,
        connections: &brainy_core::Connections,
        tombstoned: bool,
    ) -> Result<()> {
        self.hnsw
            .rehydrate(id.clone(), vector.data.clone(), connections, tombstoned)?;
        if !tombstoned {
            self.vectors.insert(id, vector);
        }
        Ok(())
    }
}
