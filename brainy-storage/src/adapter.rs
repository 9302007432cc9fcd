//! The storage capability every backend implements.

use crate::Result;
use async_trait::async_trait;
use brainy_core::{ChangeLogEntry, Noun, NounId, Statistics, StatisticsDelta, Verb, VerbId};

/// Backends implement this trait rather than a shared base struct: memory,
/// filesystem (RocksDB-backed), object store, and browser OPFS each satisfy
/// it with an entirely different persistence strategy. Callers (the HNSW
/// index, the pipeline, the façade) hold an `Arc<dyn StorageAdapter>` and
/// never know which one they got.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn save_noun(&self, noun: &Noun) -> Result<()>;
    async fn get_noun(&self, id: &NounId) -> Result<Option<Noun>>;
    /// All nouns in the given partition. `noun_type: None` scans the
    /// legacy, non-partitioned fallback location in addition to `default`.
    async fn get_all_nouns(&self, noun_type: Option<&str>) -> Result<Vec<Noun>>;
    async fn get_nouns_by_noun_type(&self, noun_type: &str) -> Result<Vec<Noun>>;
    async fn delete_noun(&self, id: &NounId) -> Result<()>;

    async fn save_verb(&self, verb: &Verb) -> Result<()>;
    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>>;
    async fn get_all_verbs(&self) -> Result<Vec<Verb>>;
    async fn get_verbs_by_source(&self, source_id: &NounId) -> Result<Vec<Verb>>;
    async fn get_verbs_by_target(&self, target_id: &NounId) -> Result<Vec<Verb>>;
    async fn get_verbs_by_type(&self, verb_type: &str) -> Result<Vec<Verb>>;
    async fn delete_verb(&self, id: &VerbId) -> Result<()>;

    async fn save_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn save_statistics(&self, stats: &Statistics) -> Result<()>;
    async fn get_statistics(&self) -> Result<Statistics>;
    /// Applies a batch of pending deltas onto the durable counters.
    async fn flush_statistics(&self, deltas: &StatisticsDelta) -> Result<Statistics>;

    /// Acquires a TTL-bound advisory lock, failing immediately (no
    /// blocking) if another instance already holds it. `ttl_ms` bounds how
    /// long the lock is honored if the holder disappears.
    async fn acquire_lock(&self, name: &str, owner: &str, ttl_ms: u64) -> Result<bool>;
    async fn release_lock(&self, name: &str, owner: &str) -> Result<()>;

    async fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()>;
    /// Entries with `seq > since`, in ascending order, for cross-instance
    /// catch-up.
    async fn read_change_log(&self, since: u64) -> Result<Vec<ChangeLogEntry>>;

    async fn clear(&self) -> Result<()>;
    async fn get_storage_status(&self) -> Result<StorageStatus>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StorageStatus {
    pub noun_count: u64,
    pub verb_count: u64,
    pub backend: String,
}
