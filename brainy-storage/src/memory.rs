//! In-memory backend. Used for tests and single-process, non-durable
//! deployments; also the easiest adapter to read as a spec of the trait's
//! intended semantics before reading the durable backends.

use crate::adapter::{StorageAdapter, StorageStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use brainy_core::{apply_deltas, partition_for, ChangeLogEntry, Noun, NounId, Statistics, StatisticsDelta, Verb, VerbId};
use dashmap::DashMap;
use std::sync::Mutex;

struct LockState {
    owner: String,
    expires_at_ms: u64,
}

pub struct MemoryAdapter {
    nouns: DashMap<NounId, Noun>,
    verbs: DashMap<VerbId, Verb>,
    metadata: DashMap<String, serde_json::Value>,
    statistics: Mutex<Statistics>,
    locks: DashMap<String, LockState>,
    change_log: Mutex<Vec<ChangeLogEntry>>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            nouns: DashMap::new(),
            verbs: DashMap::new(),
            metadata: DashMap::new(),
            statistics: Mutex::new(Statistics::new()),
            locks: DashMap::new(),
            change_log: Mutex::new(Vec::new()),
        }
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn save_noun(&self, noun: &Noun) -> Result<()> {
        self.nouns.insert(noun.id.clone(), noun.clone());
        Ok(())
    }

    async fn get_noun(&self, id: &NounId) -> Result<Option<Noun>> {
        Ok(self.nouns.get(id).map(|n| n.clone()))
    }

    async fn get_all_nouns(&self, noun_type: Option<&str>) -> Result<Vec<Noun>> {
        let target = noun_type.map(partition_for);
        Ok(self
            .nouns
            .iter()
            .filter(|entry| match &target {
                Some(t) => partition_for(entry.noun_type()) == *t,
                None => true,
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_nouns_by_noun_type(&self, noun_type: &str) -> Result<Vec<Noun>> {
        self.get_all_nouns(Some(noun_type)).await
    }

    async fn delete_noun(&self, id: &NounId) -> Result<()> {
        self.nouns.remove(id);
        Ok(())
    }

    async fn save_verb(&self, verb: &Verb) -> Result<()> {
        self.verbs.insert(verb.id.clone(), verb.clone());
        Ok(())
    }

    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>> {
        Ok(self.verbs.get(id).map(|v| v.clone()))
    }

    async fn get_all_verbs(&self) -> Result<Vec<Verb>> {
        Ok(self.verbs.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn get_verbs_by_source(&self, source_id: &NounId) -> Result<Vec<Verb>> {
        Ok(self
            .verbs
            .iter()
            .filter(|entry| &entry.source_id == source_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_verbs_by_target(&self, target_id: &NounId) -> Result<Vec<Verb>> {
        Ok(self
            .verbs
            .iter()
            .filter(|entry| &entry.target_id == target_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_verbs_by_type(&self, verb_type: &str) -> Result<Vec<Verb>> {
        Ok(self
            .verbs
            .iter()
            .filter(|entry| entry.verb_type.to_string() == verb_type)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_verb(&self, id: &VerbId) -> Result<()> {
        self.verbs.remove(id);
        Ok(())
    }

    async fn save_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.metadata.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.metadata.get(key).map(|v| v.clone()))
    }

    async fn save_statistics(&self, stats: &Statistics) -> Result<()> {
        *self.statistics.lock().unwrap() = stats.clone();
        Ok(())
    }

    async fn get_statistics(&self) -> Result<Statistics> {
        Ok(self.statistics.lock().unwrap().clone())
    }

    async fn flush_statistics(&self, deltas: &StatisticsDelta) -> Result<Statistics> {
        let mut stats = self.statistics.lock().unwrap();
        apply_deltas(&mut stats, deltas);
        Ok(stats.clone())
    }

    async fn acquire_lock(&self, name: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let now = Self::now_ms();
        let mut entry = self.locks.entry(name.to_string());
        match &mut entry {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let state = existing.get();
                if state.owner == owner || state.expires_at_ms < now {
                    existing.insert(LockState {
                        owner: owner.to_string(),
                        expires_at_ms: now + ttl_ms,
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(LockState {
                    owner: owner.to_string(),
                    expires_at_ms: now + ttl_ms,
                });
                Ok(true)
            }
        }
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<()> {
        if let Some(state) = self.locks.get(name) {
            if state.owner != owner {
                return Err(Error::LockHeld(format!(
                    "lock {name} held by a different owner"
                )));
            }
        }
        self.locks.remove(name);
        Ok(())
    }

    async fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        self.change_log.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn read_change_log(&self, since: u64) -> Result<Vec<ChangeLogEntry>> {
        Ok(self
            .change_log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.seq > since)
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.nouns.clear();
        self.verbs.clear();
        self.metadata.clear();
        *self.statistics.lock().unwrap() = Statistics::new();
        self.locks.clear();
        self.change_log.lock().unwrap().clear();
        Ok(())
    }

    async fn get_storage_status(&self) -> Result<StorageStatus> {
        Ok(StorageStatus {
            noun_count: self.nouns.len() as u64,
            verb_count: self.verbs.len() as u64,
            backend: "memory".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainy_core::{Connections, Metadata};

    fn sample_noun(id: &str, noun_type: &str) -> Noun {
        let mut metadata = Metadata::new();
        metadata.set_noun_type(noun_type);
        Noun {
            id: id.to_string(),
            vector: vec![0.1, 0.2],
            connections: Connections::new(),
            metadata,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn save_and_get_noun_roundtrips() {
        let storage = MemoryAdapter::new();
        storage.save_noun(&sample_noun("n1", "concept")).await.unwrap();
        let fetched = storage.get_noun(&"n1".to_string()).await.unwrap();
        assert_eq!(fetched.unwrap().id, "n1");
    }

    #[tokio::test]
    async fn get_all_nouns_filters_by_partition() {
        let storage = MemoryAdapter::new();
        storage.save_noun(&sample_noun("n1", "person")).await.unwrap();
        storage.save_noun(&sample_noun("n2", "concept")).await.unwrap();

        let persons = storage.get_all_nouns(Some("person")).await.unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].id, "n1");
    }

    #[tokio::test]
    async fn lock_cannot_be_acquired_twice_by_different_owners() {
        let storage = MemoryAdapter::new();
        assert!(storage.acquire_lock("l", "a", 5_000).await.unwrap());
        assert!(!storage.acquire_lock("l", "b", 5_000).await.unwrap());
        storage.release_lock("l", "a").await.unwrap();
        assert!(storage.acquire_lock("l", "b", 5_000).await.unwrap());
    }

    #[tokio::test]
    async fn change_log_read_since_filters_earlier_entries() {
        let storage = MemoryAdapter::new();
        storage
            .append_change_log(&ChangeLogEntry {
                seq: 1,
                op: brainy_core::OperationKind::AddNoun,
                id: "n1".to_string(),
                timestamp: 0,
            })
            .await
            .unwrap();
        storage
            .append_change_log(&ChangeLogEntry {
                seq: 2,
                op: brainy_core::OperationKind::AddNoun,
                id: "n2".to_string(),
                timestamp: 1,
            })
            .await
            .unwrap();

        let entries = storage.read_change_log(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "n2");
    }
}
