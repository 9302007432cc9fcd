//! The `BrainyData` façade: the single entry point embedding applications
//! use. A plain async library — no transport, no CLI, no routing; those
//! are external collaborators that call these methods directly.

use brainy_core::{
    partition_for, BrainyError, Metadata, Noun, NounId, OperationKind, RelationshipType, Result,
    Statistics, Verb, VerbId, NOUN_TYPE_KEY, STAT_NOUN_COUNT, STAT_VERB_COUNT,
};
use brainy_embed::EmbeddingBridge;
use brainy_storage::{ChangeLog, StatisticsManager, StorageAdapter};
use brainy_vector::{DistanceMetric, PersistentVectorIndex, SearchResult, Vector, VectorIndexConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const CHANGE_LOG_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// Input to [`BrainyData::add`] / [`BrainyData::search`]: either raw text
/// to embed, or a pre-embedded vector to use as-is.
#[derive(Debug, Clone)]
pub enum AddInput {
    Text(String),
    Vector(Vec<f32>),
}

/// Options for [`BrainyData::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub noun_type: Option<String>,
    pub hydrate_metadata: bool,
}

/// A single search result, with metadata attached when requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: NounId,
    pub score: f32,
    pub metadata: Option<serde_json::Value>,
}

/// Options for [`BrainyData::delete`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Soft-delete (tombstone, edges kept) is the default; set `hard` to
    /// physically remove the node and its back-edges.
    pub hard: bool,
}

/// An ordered, complete export of everything the façade holds, used by
/// [`BrainyData::backup`] / [`BrainyData::restore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupBundle {
    pub nouns: Vec<Noun>,
    pub verbs: Vec<Verb>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub statistics: Statistics,
}

struct Partition {
    index: RwLock<PersistentVectorIndex>,
}

/// The embeddable vector-and-graph database façade.
pub struct BrainyData {
    storage: Arc<dyn StorageAdapter>,
    vector_config: VectorIndexConfig,
    embedder: Arc<EmbeddingBridge>,
    statistics: Arc<StatisticsManager>,
    change_log: ChangeLog,
    partitions: RwLock<HashMap<String, Arc<Partition>>>,
    instance_id: String,
    watermark: std::sync::atomic::AtomicU64,
    change_log_poller: RwLock<Option<JoinHandle<()>>>,
    statistics_flusher: RwLock<Option<JoinHandle<()>>>,
}

impl BrainyData {
    /// Opens storage, loads statistics, and starts the change-log poller.
    /// Per-partition HNSW state is loaded lazily, on first access to that
    /// partition.
    pub async fn init(
        storage: Arc<dyn StorageAdapter>,
        dimension: usize,
        metric: DistanceMetric,
        embedder: Arc<EmbeddingBridge>,
    ) -> Result<Arc<Self>> {
        let instance_id = uuid::Uuid::new_v4().to_string();
        let vector_config = VectorIndexConfig::new(dimension, metric);

        // Ensures the shared index-configuration record exists before any
        // partition is lazily opened. Harmless to re-run with the same
        // dimension/metric on every startup.
        let _ = PersistentVectorIndex::create(storage.clone(), vector_config.clone()).await;

        let statistics = StatisticsManager::new(storage.clone(), instance_id.clone())
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;

        let change_log = ChangeLog::new();
        let existing = storage
            .read_change_log(0)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        let watermark = existing.iter().map(|e| e.seq).max().unwrap_or(0);
        change_log.observe_seq(watermark);

        let data = Arc::new(Self {
            storage,
            vector_config,
            embedder,
            statistics,
            change_log,
            partitions: RwLock::new(HashMap::new()),
            instance_id,
            watermark: std::sync::atomic::AtomicU64::new(watermark),
            change_log_poller: RwLock::new(None),
            statistics_flusher: RwLock::new(None),
        });

        *data.statistics_flusher.write().await = Some(data.statistics.start());
        *data.change_log_poller.write().await = Some(Arc::clone(&data).spawn_change_log_poller());

        Ok(data)
    }

    fn now_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Appends a change-log entry. Logged and swallowed on failure: the
    /// mutation that produced it has already landed, and catch-up for
    /// other instances is best-effort.
    async fn append_log(&self, op: OperationKind, id: impl Into<String>) {
        let entry = self.change_log.entry(op, id, Self::now_ms());
        if let Err(err) = self.storage.append_change_log(&entry).await {
            tracing::warn!(error = %err, "failed to append change-log entry");
        }
    }

    fn spawn_change_log_poller(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CHANGE_LOG_POLL_INTERVAL).await;
                if let Err(err) = self.poll_change_log().await {
                    tracing::warn!(error = %err, "change-log catch-up failed");
                }
            }
        })
    }

    async fn poll_change_log(&self) -> Result<()> {
        let since = self.watermark.load(std::sync::atomic::Ordering::Acquire);
        let entries = self
            .storage
            .read_change_log(since)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;

        let mut max_seq = since;
        for entry in &entries {
            self.apply_change_log_entry(entry).await;
            max_seq = max_seq.max(entry.seq);
        }

        if max_seq > since {
            self.watermark.store(max_seq, std::sync::atomic::Ordering::Release);
        }
        Ok(())
    }

    /// Applies one entry to whichever in-memory partitions are already
    /// loaded. A partition nobody has touched yet simply reads current
    /// storage state the first time it's opened, so it never needs
    /// catch-up. Re-application is idempotent: an already-present id is a
    /// no-op insert, an already-absent id is a no-op delete.
    async fn apply_change_log_entry(&self, entry: &brainy_core::ChangeLogEntry) {
        match entry.op {
            OperationKind::AddNoun | OperationKind::Prune => {
                let Ok(Some(noun)) = self.storage.get_noun(&entry.id).await else { return };
                let partition = partition_for(noun.noun_type());
                let Some(handle) = self.loaded_partition(partition).await else { return };
                let mut index = handle.index.write().await;
                if index.get(&entry.id).is_none() {
                    let _ = index
                        .insert_typed(entry.id.clone(), Vector::new(noun.vector.clone()), noun.noun_type())
                        .await;
                }
            }
            OperationKind::DeleteNoun => {
                for handle in self.partitions.read().await.values() {
                    let mut index = handle.index.write().await;
                    if index.get(&entry.id).is_some() {
                        let _ = index.delete(&entry.id).await;
                    }
                }
            }
            OperationKind::AddVerb | OperationKind::DeleteVerb => {
                // Verbs never live in the HNSW graph; nothing to replay.
            }
        }
    }

    async fn loaded_partition(&self, partition: &str) -> Option<Arc<Partition>> {
        self.partitions.read().await.get(partition).cloned()
    }

    async fn ensure_partition(&self, partition: &str) -> Result<Arc<Partition>> {
        if let Some(existing) = self.loaded_partition(partition).await {
            return Ok(existing);
        }

        let mut partitions = self.partitions.write().await;
        if let Some(existing) = partitions.get(partition) {
            return Ok(existing.clone());
        }

        let index = PersistentVectorIndex::open_partition(self.storage.clone(), partition)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        let handle = Arc::new(Partition { index: RwLock::new(index) });
        partitions.insert(partition.to_string(), handle.clone());
        Ok(handle)
    }

    /// Embeds text or accepts a pre-embedded vector, allocates an id,
    /// inserts into the owning partition's HNSW graph, persists the noun
    /// and its metadata, and increments `nounCount`.
    pub async fn add(&self, input: AddInput, metadata: Option<serde_json::Value>) -> Result<NounId> {
        let vector = match input {
            AddInput::Text(text) => self.embedder.embed(&text).await?,
            AddInput::Vector(vector) => vector,
        };

        if vector.len() != self.vector_config.dimension {
            return Err(BrainyError::DimensionMismatch {
                expected: self.vector_config.dimension,
                actual: vector.len(),
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let noun_type = metadata
            .as_ref()
            .and_then(|m| m.get(NOUN_TYPE_KEY))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let partition = partition_for(noun_type.as_deref());

        let handle = self.ensure_partition(partition).await?;
        {
            let mut index = handle.index.write().await;
            index
                .insert_typed(id.clone(), Vector::new(vector), noun_type.as_deref())
                .await
                .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        }

        if let Some(metadata) = metadata {
            self.storage
                .save_metadata(&id, &metadata)
                .await
                .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        }

        self.statistics.record(STAT_NOUN_COUNT, 1).await;
        self.append_log(OperationKind::AddNoun, id.clone()).await;
        Ok(id)
    }

    /// Verifies both endpoints exist, optionally embeds verb text, and
    /// persists the verb.
    pub async fn add_verb(
        &self,
        source_id: NounId,
        target_id: NounId,
        verb_type: impl Into<RelationshipType>,
        text: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<VerbId> {
        let source = self
            .storage
            .get_noun(&source_id)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        if source.is_none() {
            return Err(BrainyError::NotFound(format!("source noun {source_id}")));
        }
        let target = self
            .storage
            .get_noun(&target_id)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        if target.is_none() {
            return Err(BrainyError::NotFound(format!("target noun {target_id}")));
        }

        let vector = match text {
            Some(text) => Some(self.embedder.embed(&text).await?),
            None => None,
        };

        let id = uuid::Uuid::new_v4().to_string();
        let verb = Verb {
            id: id.clone(),
            source_id,
            target_id,
            verb_type: verb_type.into(),
            vector,
            metadata: metadata.unwrap_or_default(),
            created_at: Self::now_ms(),
            deleted: false,
        };
        self.storage
            .save_verb(&verb)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        self.statistics.record(STAT_VERB_COUNT, 1).await;
        self.append_log(OperationKind::AddVerb, id.clone()).await;
        Ok(id)
    }

    /// Fetches a noun record by id (searching storage directly, not the
    /// in-memory index, so this works even for partitions nobody has
    /// loaded yet).
    pub async fn get(&self, id: &NounId) -> Result<Option<Noun>> {
        self.storage.get_noun(id).await.map_err(|e| BrainyError::StorageUnavailable(e.to_string()))
    }

    /// Fetches the arbitrary metadata attached via `add`/`update_metadata`.
    pub async fn get_metadata(&self, id: &NounId) -> Result<Option<serde_json::Value>> {
        self.storage.get_metadata(id).await.map_err(|e| BrainyError::StorageUnavailable(e.to_string()))
    }

    pub async fn update_metadata(&self, id: &NounId, metadata: serde_json::Value) -> Result<()> {
        if self.get(id).await?.is_none() {
            return Err(BrainyError::NotFound(id.clone()));
        }
        self.storage
            .save_metadata(id, &metadata)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))
    }

    /// Deletes a noun. Soft-delete (the default) tombstones it and keeps
    /// HNSW edges for traversal; `options.hard` physically removes it and
    /// tears down back-edges.
    pub async fn delete(&self, id: &NounId, options: DeleteOptions) -> Result<()> {
        let noun = self.get(id).await?.ok_or_else(|| BrainyError::NotFound(id.clone()))?;
        let partition = partition_for(noun.noun_type());
        let handle = self.ensure_partition(partition).await?;

        let mut index = handle.index.write().await;
        if options.hard {
            index
                .hard_delete(id)
                .await
                .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        } else {
            index.delete(id).await.map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        }
        drop(index);

        self.statistics.record(STAT_NOUN_COUNT, -1).await;
        self.append_log(OperationKind::DeleteNoun, id.clone()).await;
        Ok(())
    }

    /// Searches for nearest neighbors of `query` (text or vector). With a
    /// `noun_type` filter, only the matching partition is searched — the
    /// result set is exact, never a post-filtered approximation. Without
    /// one, every partition is searched and results are merged and
    /// globally re-ranked, each partition asked for a full `k` candidates
    /// (over-fetching relative to an even split across partitions, the
    /// chosen form of "expand the candidate pool") so a partition holding
    /// all of the true top-k is never shortchanged.
    pub async fn search(&self, query: AddInput, k: usize, options: SearchOptions) -> Result<Vec<SearchHit>> {
        let vector = match query {
            AddInput::Text(text) => self.embedder.embed(&text).await?,
            AddInput::Vector(vector) => vector,
        };
        let query_vector = Vector::new(vector);

        let mut hits: Vec<SearchResult> = match &options.noun_type {
            Some(noun_type) => {
                let partition = partition_for(Some(noun_type));
                let handle = self.ensure_partition(partition).await?;
                let index = handle.index.read().await;
                index
                    .search(&query_vector, k)
                    .await
                    .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?
            }
            None => {
                for partition in brainy_core::NOUN_PARTITIONS {
                    self.ensure_partition(partition).await?;
                }
                let mut merged = Vec::new();
                for handle in self.partitions.read().await.values() {
                    let index = handle.index.read().await;
                    let partial = index
                        .search(&query_vector, k)
                        .await
                        .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
                    merged.extend(partial);
                }
                let metric = self.vector_config.metric;
                merged.sort_by(|a, b| a.cmp_by_metric(b, metric));
                merged
            }
        };

        hits.truncate(k);

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits.drain(..) {
            let metadata = if options.hydrate_metadata {
                self.get_metadata(&hit.id).await?
            } else {
                None
            };
            results.push(SearchHit { id: hit.id, score: hit.score, metadata });
        }
        Ok(results)
    }

    /// Ordered export of every noun, verb, metadata entry, and the
    /// current statistics snapshot.
    pub async fn backup(&self) -> Result<BackupBundle> {
        let nouns = self
            .storage
            .get_all_nouns(None)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        let verbs = self
            .storage
            .get_all_verbs()
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;

        let mut metadata = HashMap::new();
        for noun in &nouns {
            if let Some(value) = self.get_metadata(&noun.id).await? {
                metadata.insert(noun.id.clone(), value);
            }
        }

        let statistics = self.statistics.snapshot().await;
        Ok(BackupBundle { nouns, verbs, metadata, statistics })
    }

    /// Restores from a bundle produced by [`BrainyData::backup`].
    /// Idempotent per id: restoring the same bundle twice leaves the same
    /// final state.
    pub async fn restore(&self, bundle: BackupBundle) -> Result<()> {
        for noun in &bundle.nouns {
            self.storage.save_noun(noun).await.map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        }
        for verb in &bundle.verbs {
            self.storage.save_verb(verb).await.map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        }
        for (id, value) in &bundle.metadata {
            self.storage
                .save_metadata(id, value)
                .await
                .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        }
        self.storage
            .save_statistics(&bundle.statistics)
            .await
            .map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;

        // Dropping every loaded partition forces a fresh rehydrate from
        // storage on next access, rather than leaving stale in-memory
        // graphs shadowing the restored records.
        self.partitions.write().await.clear();
        Ok(())
    }

    /// Drops all state, delegating to the storage adapter's native clear.
    pub async fn clear(&self) -> Result<()> {
        self.storage.clear().await.map_err(|e| BrainyError::StorageUnavailable(e.to_string()))?;
        self.partitions.write().await.clear();
        self.watermark.store(0, std::sync::atomic::Ordering::Release);
        Ok(())
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl Drop for BrainyData {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.change_log_poller.try_write() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        if let Ok(mut guard) = self.statistics_flusher.try_write() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brainy_embed::{DispatchMode, EmbeddingFunction};
    use brainy_storage::MemoryAdapter;

    struct FixedEmbedder {
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingFunction for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; self.dimension];
            if let Some(first) = text.bytes().next() {
                v[0] = first as f32;
            }
            Ok(v)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    async fn test_instance(dimension: usize) -> Arc<BrainyData> {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let embedder = Arc::new(EmbeddingBridge::new(
            Arc::new(FixedEmbedder { dimension }),
            DispatchMode::Inline,
        ));
        BrainyData::init(storage, dimension, DistanceMetric::Euclidean, embedder)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let data = test_instance(4).await;
        let id = data
            .add(AddInput::Vector(vec![1.0, 0.0, 0.0, 0.0]), None)
            .await
            .unwrap();
        let noun = data.get(&id).await.unwrap().unwrap();
        assert_eq!(noun.id, id);
        assert!(!noun.deleted);
    }

    #[tokio::test]
    async fn add_persists_noun_type_and_metadata_separately() {
        let data = test_instance(3).await;
        let metadata = serde_json::json!({"nounType": "person", "name": "Ada"});
        let id = data
            .add(AddInput::Vector(vec![1.0, 0.0, 0.0]), Some(metadata.clone()))
            .await
            .unwrap();

        let noun = data.get(&id).await.unwrap().unwrap();
        assert_eq!(noun.noun_type(), Some("person"));

        let stored_metadata = data.get_metadata(&id).await.unwrap().unwrap();
        assert_eq!(stored_metadata, metadata);
    }

    #[tokio::test]
    async fn search_respects_noun_type_filter() {
        let data = test_instance(3).await;
        data.add(
            AddInput::Vector(vec![1.0, 0.0, 0.0]),
            Some(serde_json::json!({"nounType": "person"})),
        )
        .await
        .unwrap();
        data.add(
            AddInput::Vector(vec![0.9, 0.1, 0.0]),
            Some(serde_json::json!({"nounType": "place"})),
        )
        .await
        .unwrap();

        let hits = data
            .search(
                AddInput::Vector(vec![1.0, 0.0, 0.0]),
                5,
                SearchOptions { noun_type: Some("person".to_string()), hydrate_metadata: false },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn soft_delete_removes_from_search_but_keeps_record() {
        let data = test_instance(3).await;
        let id = data.add(AddInput::Vector(vec![1.0, 0.0, 0.0]), None).await.unwrap();

        data.delete(&id, DeleteOptions::default()).await.unwrap();

        let hits = data
            .search(AddInput::Vector(vec![1.0, 0.0, 0.0]), 5, SearchOptions::default())
            .await
            .unwrap();
        assert!(!hits.iter().any(|h| h.id == id));
        assert!(data.get(&id).await.unwrap().is_some(), "soft delete keeps the record");
    }

    #[tokio::test]
    async fn add_verb_requires_both_endpoints_to_exist() {
        let data = test_instance(3).await;
        let a = data.add(AddInput::Vector(vec![1.0, 0.0, 0.0]), None).await.unwrap();

        let err = data
            .add_verb(a.clone(), "missing".to_string(), "relatedTo", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BrainyError::NotFound(_)));
    }

    #[tokio::test]
    async fn backup_then_restore_round_trips_state() {
        let data = test_instance(3).await;
        let id = data
            .add(
                AddInput::Vector(vec![1.0, 0.0, 0.0]),
                Some(serde_json::json!({"nounType": "concept", "label": "gravity"})),
            )
            .await
            .unwrap();

        let bundle = data.backup().await.unwrap();

        let other = test_instance(3).await;
        other.restore(bundle).await.unwrap();

        let restored = other.get(&id).await.unwrap().unwrap();
        assert_eq!(restored.noun_type(), Some("concept"));
        let metadata = other.get_metadata(&id).await.unwrap().unwrap();
        assert_eq!(metadata["label"], "gravity");
    }

    #[tokio::test]
    async fn clear_drops_all_state() {
        let data = test_instance(3).await;
        let id = data.add(AddInput::Vector(vec![1.0, 0.0, 0.0]), None).await.unwrap();
        data.clear().await.unwrap();
        assert!(data.get(&id).await.unwrap().is_none());
    }
}
