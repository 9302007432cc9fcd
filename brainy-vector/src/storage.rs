//! Persistence for a vector index over a [`brainy_storage::StorageAdapter`].
//!
//! A node's vector and its HNSW connections are persisted together as a
//! single [`Noun`] record, matching the data model the rest of the system
//! uses — there is no separate vector-blob keyspace.

use crate::{DistanceMetric, HnswConfig, Result, Vector, VectorError, VectorIndex, VectorIndexConfig};
use brainy_core::{Metadata, Noun, NounId};
use brainy_storage::StorageAdapter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CONFIG_METADATA_KEY: &str = "vector_index_config";
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexConfigRecord {
    dimension: usize,
    metric: DistanceMetric,
    hnsw_config: HnswConfig,
    version: u32,
}

/// Persistent vector index backed by any Brainy storage adapter.
pub struct PersistentVectorIndex {
    index: VectorIndex,
    storage: Arc<dyn StorageAdapter>,
    /// Remembers each node's `nounType` across `prune`/`delete` calls,
    /// which otherwise only see the vector and connections, not the noun
    /// record's metadata.
    noun_types: std::collections::HashMap<NounId, Option<String>>,
}

impl PersistentVectorIndex {
    /// Create a fresh persistent index and record its configuration.
    pub async fn create(storage: Arc<dyn StorageAdapter>, config: VectorIndexConfig) -> Result<Self> {
        let index = VectorIndex::with_config(config.clone())?;

        let record = IndexConfigRecord {
            dimension: config.dimension,
            metric: config.metric,
            hnsw_config: config.hnsw_config,
            version: CONFIG_VERSION,
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| VectorError::SerializationError(e.to_string()))?;
        storage
            .save_metadata(CONFIG_METADATA_KEY, &value)
            .await
            .map_err(VectorError::StorageError)?;

        Ok(Self { index, storage, noun_types: std::collections::HashMap::new() })
    }

    /// Open an existing persistent index, rehydrating the HNSW graph from
    /// every noun the backend holds (legacy, non-partitioned layout plus
    /// `default`).
    pub async fn open(storage: Arc<dyn StorageAdapter>) -> Result<Self> {
        Self::open_filtered(storage, None).await
    }

    /// Open a persistent index scoped to a single noun-type partition,
    /// rehydrating only the nouns that live in it. Used for lazy
    /// per-partition loading: a caller holding several partitions opens
    /// each one independently and only on first access.
    pub async fn open_partition(storage: Arc<dyn StorageAdapter>, partition: &str) -> Result<Self> {
        Self::open_filtered(storage, Some(partition)).await
    }

    async fn open_filtered(storage: Arc<dyn StorageAdapter>, noun_type: Option<&str>) -> Result<Self> {
        let value = storage
            .get_metadata(CONFIG_METADATA_KEY)
            .await
            .map_err(VectorError::StorageError)?
            .ok_or_else(|| VectorError::InvalidVector("index metadata not found".to_string()))?;

        let record: IndexConfigRecord = serde_json::from_value(value)
            .map_err(|e| VectorError::SerializationError(e.to_string()))?;

        if record.version != CONFIG_VERSION {
            return Err(VectorError::InvalidVector(format!(
                "unsupported index version: {}",
                record.version
            )));
        }

        let config = VectorIndexConfig {
            dimension: record.dimension,
            metric: record.metric,
            hnsw_config: record.hnsw_config,
        };
        let mut index = VectorIndex::with_config(config)?;
        let mut noun_types = std::collections::HashMap::new();

        let nouns = storage.get_all_nouns(noun_type).await.map_err(VectorError::StorageError)?;
        for noun in nouns {
            noun_types.insert(noun.id.clone(), noun.noun_type().map(str::to_string));
            index.rehydrate(
                noun.id.clone(),
                Vector::new(noun.vector.clone()),
                &noun.connections,
                noun.deleted,
            )?;
        }

        Ok(Self { index, storage, noun_types })
    }

    /// Insert a vector with automatic persistence.
    pub async fn insert(&mut self, id: NounId, vector: Vector) -> Result<()> {
        self.insert_typed(id, vector, None).await
    }

    /// Insert a vector, recording its `nounType` on the persisted noun
    /// record so partitioned reopen (`open_partition`) can find it again.
    pub async fn insert_typed(&mut self, id: NounId, vector: Vector, noun_type: Option<&str>) -> Result<()> {
        self.index.insert(id.clone(), vector.clone()).await?;
        self.noun_types.insert(id.clone(), noun_type.map(str::to_string));
        self.persist_node(&id, false, noun_type).await
    }

    /// Search for k nearest neighbors.
    pub async fn search(&self, query: &Vector, k: usize) -> Result<Vec<crate::SearchResult>> {
        self.index.search(query, k).await
    }

    /// Get a vector by ID.
    pub fn get(&self, id: &NounId) -> Option<&Vector> {
        self.index.get(id)
    }

    /// Soft-delete a vector with automatic persistence (tombstoned, edges
    /// kept).
    pub async fn delete(&mut self, id: &NounId) -> Result<()> {
        let vector = self
            .index
            .raw_vector_for(id)
            .ok_or_else(|| VectorError::NotFound(id.clone()))?;
        self.index.delete(id).await?;
        let noun_type = self.noun_types.get(id).cloned().flatten();
        self.persist_tombstone(id, &vector, noun_type.as_deref()).await
    }

    /// Hard-delete a vector with automatic persistence (node and its
    /// back-edges physically removed).
    pub async fn hard_delete(&mut self, id: &NounId) -> Result<()> {
        self.index.hard_delete(id).await?;
        self.noun_types.remove(id);
        self.storage.delete_noun(id).await.map_err(VectorError::StorageError)
    }

    /// Re-prune a node's neighbor lists and persist the result.
    pub async fn prune(&mut self, id: &NounId) -> Result<()> {
        self.index.prune(id)?;
        let noun_type = self.noun_types.get(id).cloned().flatten();
        self.persist_node(id, self.index.is_tombstoned(id), noun_type.as_deref()).await
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get all vector IDs.
    pub fn ids(&self) -> Vec<NounId> {
        self.index.ids()
    }

    /// Get the dimension of vectors in this index.
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Get the distance metric used by this index.
    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    async fn persist_node(&self, id: &NounId, deleted: bool, noun_type: Option<&str>) -> Result<()> {
        let vector = self
            .index
            .raw_vector_for(id)
            .ok_or_else(|| VectorError::NotFound(id.clone()))?;
        let connections = self.index.connections_for(id).unwrap_or_default();
        let mut metadata = Metadata::new();
        if let Some(noun_type) = noun_type {
            metadata.set_noun_type(noun_type);
        }
        let noun = Noun {
            id: id.clone(),
            vector,
            connections,
            metadata,
            deleted,
        };
        self.storage.save_noun(&noun).await.map_err(VectorError::StorageError)
    }

    async fn persist_tombstone(&self, id: &NounId, vector: &[f32], noun_type: Option<&str>) -> Result<()> {
        let connections = self.index.connections_for(id).unwrap_or_default();
        let mut metadata = Metadata::new();
        if let Some(noun_type) = noun_type {
            metadata.set_noun_type(noun_type);
        }
        let noun = Noun {
            id: id.clone(),
            vector: vector.to_vec(),
            connections,
            metadata,
            deleted: true,
        };
        self.storage.save_noun(&noun).await.map_err(VectorError::StorageError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DistanceMetric;
    use brainy_storage::MemoryAdapter;

    fn id(s: &str) -> NounId {
        s.to_string()
    }

    #[tokio::test]
    async fn test_persistent_index_create_and_reopen() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());

        {
            let config = VectorIndexConfig::new(3, DistanceMetric::Cosine);
            let mut index = PersistentVectorIndex::create(storage.clone(), config).await.unwrap();

            index.insert(id("1"), Vector::new(vec![1.0, 0.0, 0.0])).await.unwrap();
            index.insert(id("2"), Vector::new(vec![0.0, 1.0, 0.0])).await.unwrap();

            assert_eq!(index.len(), 2);
        }

        {
            let index = PersistentVectorIndex::open(storage.clone()).await.unwrap();
            assert_eq!(index.len(), 2);
            assert!(index.get(&id("1")).is_some());
            assert!(index.get(&id("2")).is_some());
        }
    }

    #[tokio::test]
    async fn test_persistent_index_search() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let config = VectorIndexConfig::new(3, DistanceMetric::Cosine);
        let mut index = PersistentVectorIndex::create(storage, config).await.unwrap();

        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let v2 = Vector::new(vec![0.9, 0.1, 0.0]);
        let v3 = Vector::new(vec![0.0, 1.0, 0.0]);

        index.insert(id("1"), v1.clone()).await.unwrap();
        index.insert(id("2"), v2).await.unwrap();
        index.insert(id("3"), v3).await.unwrap();

        let results = index.search(&v1, 2).await.unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_persistent_index_soft_delete_survives_reopen() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let config = VectorIndexConfig::new(3, DistanceMetric::Cosine);

        {
            let mut index = PersistentVectorIndex::create(storage.clone(), config).await.unwrap();
            index.insert(id("1"), Vector::new(vec![1.0, 0.0, 0.0])).await.unwrap();
            index.delete(&id("1")).await.unwrap();
        }

        let reopened = PersistentVectorIndex::open(storage).await.unwrap();
        assert!(reopened.get(&id("1")).is_none(), "tombstoned vector stays out of live results");
    }

    #[tokio::test]
    async fn test_open_partition_only_rehydrates_matching_nouns() {
        use brainy_core::{Metadata, Noun};

        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let config = VectorIndexConfig::new(2, DistanceMetric::Euclidean);
        {
            let _index = PersistentVectorIndex::create(storage.clone(), config).await.unwrap();
        }

        let person = Noun {
            id: id("person-1"),
            vector: vec![1.0, 0.0],
            connections: Default::default(),
            metadata: {
                let mut m = Metadata::new();
                m.set_noun_type("person");
                m
            },
            deleted: false,
        };
        let place = Noun {
            id: id("place-1"),
            vector: vec![0.0, 1.0],
            connections: Default::default(),
            metadata: {
                let mut m = Metadata::new();
                m.set_noun_type("place");
                m
            },
            deleted: false,
        };
        storage.save_noun(&person).await.unwrap();
        storage.save_noun(&place).await.unwrap();

        let partitioned = PersistentVectorIndex::open_partition(storage, "person").await.unwrap();
        assert_eq!(partitioned.len(), 1);
        assert!(partitioned.get(&id("person-1")).is_some());
    }

    #[tokio::test]
    async fn test_insert_typed_survives_partitioned_reopen() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let config = VectorIndexConfig::new(2, DistanceMetric::Euclidean);

        {
            let mut index = PersistentVectorIndex::create(storage.clone(), config).await.unwrap();
            index
                .insert_typed(id("p1"), Vector::new(vec![1.0, 0.0]), Some("person"))
                .await
                .unwrap();
        }

        let reopened = PersistentVectorIndex::open_partition(storage, "person").await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get(&id("p1")).is_some());
    }

    #[tokio::test]
    async fn test_persistent_index_hard_delete() {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let config = VectorIndexConfig::new(3, DistanceMetric::Cosine);
        let mut index = PersistentVectorIndex::create(storage, config).await.unwrap();

        index.insert(id("1"), Vector::new(vec![1.0, 0.0, 0.0])).await.unwrap();
        assert_eq!(index.len(), 1);

        index.hard_delete(&id("1")).await.unwrap();
        assert_eq!(index.len(), 0);
    }
}
