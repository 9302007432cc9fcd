//! Durable backend built on [`StorageEngine`] (RocksDB + WAL + cache).
//!
//! The engine only exposes a flat byte-oriented `get`/`put`/`delete`; this
//! adapter layers noun/verb partitioning, secondary indices, and locks on
//! top as JSON-serialized index records. Partition indices are keyed by
//! `brainy_core::partition_for`; a `__legacy__` index holds ids saved
//! before partitioning existed, and reads merge it in alongside `default`.

use crate::adapter::{StorageAdapter, StorageStatus};
use crate::engine::{StorageConfig, StorageEngine};
use crate::{Error, Result};
use async_trait::async_trait;
use brainy_core::{
    apply_deltas, partition_for, ChangeLogEntry, Noun, NounId, Statistics, StatisticsDelta, Verb, VerbId,
    NOUN_PARTITIONS,
};
use std::path::Path;

const LEGACY_PARTITION: &str = "__legacy__";
const STATS_KEY: &str = "stats";
const CHANGE_LOG_KEY: &str = "changelog";

pub struct FileSystemAdapter {
    engine: StorageEngine,
}

impl FileSystemAdapter {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StorageConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or_else(|| Error::Storage("invalid path".to_string()))?;
        let engine = StorageEngine::with_config(path_str, config)?;
        Ok(Self { engine })
    }

    fn noun_key(id: &NounId) -> Vec<u8> {
        format!("noun:{id}").into_bytes()
    }

    fn verb_key(id: &VerbId) -> Vec<u8> {
        format!("verb:{id}").into_bytes()
    }

    fn noun_index_key(partition: &str) -> Vec<u8> {
        format!("idx:noun:{partition}").into_bytes()
    }

    fn verb_index_key(name: &str) -> Vec<u8> {
        format!("idx:verb:{name}").into_bytes()
    }

    fn lock_key(name: &str) -> Vec<u8> {
        format!("lock:{name}").into_bytes()
    }

    async fn load_index(&self, key: &[u8]) -> Result<Vec<String>> {
        match self.engine.get(key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_index(&self, key: &[u8], ids: &[String]) -> Result<()> {
        let bytes = serde_json::to_vec(ids)?;
        self.engine.put(key, &bytes).await
    }

    async fn add_to_index(&self, key: &[u8], id: &str) -> Result<()> {
        let mut ids = self.load_index(key).await?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
            self.save_index(key, &ids).await?;
        }
        Ok(())
    }

    async fn remove_from_index(&self, key: &[u8], id: &str) -> Result<()> {
        let mut ids = self.load_index(key).await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            self.save_index(key, &ids).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FileSystemAdapter {
    async fn save_noun(&self, noun: &Noun) -> Result<()> {
        let bytes = serde_json::to_vec(noun)?;
        self.engine
            .put(&Self::noun_key(&noun.id), &bytes)
            .await
            ?;
        let partition = partition_for(noun.noun_type());
        self.add_to_index(&Self::noun_index_key(partition), &noun.id).await
    }

    async fn get_noun(&self, id: &NounId) -> Result<Option<Noun>> {
        match self.engine.get(&Self::noun_key(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_all_nouns(&self, noun_type: Option<&str>) -> Result<Vec<Noun>> {
        let partitions: Vec<String> = match noun_type {
            Some(t) => vec![partition_for(Some(t)).to_string(), LEGACY_PARTITION.to_string()],
            None => NOUN_PARTITIONS
                .iter()
                .map(|p| p.to_string())
                .chain(std::iter::once(LEGACY_PARTITION.to_string()))
                .collect(),
        };

        let mut nouns = Vec::new();
        for partition in partitions {
            let ids = self.load_index(&Self::noun_index_key(&partition)).await?;
            for id in ids {
                if let Some(noun) = self.get_noun(&id).await? {
                    nouns.push(noun);
                }
            }
        }
        Ok(nouns)
    }

    async fn get_nouns_by_noun_type(&self, noun_type: &str) -> Result<Vec<Noun>> {
        self.get_all_nouns(Some(noun_type)).await
    }

    async fn delete_noun(&self, id: &NounId) -> Result<()> {
        if let Some(noun) = self.get_noun(id).await? {
            let partition = partition_for(noun.noun_type());
            self.remove_from_index(&Self::noun_index_key(partition), id).await?;
        }
        self.remove_from_index(&Self::noun_index_key(LEGACY_PARTITION), id).await?;
        self.engine.delete(&Self::noun_key(id)).await
    }

    async fn save_verb(&self, verb: &Verb) -> Result<()> {
        let bytes = serde_json::to_vec(verb)?;
        self.engine
            .put(&Self::verb_key(&verb.id), &bytes)
            .await
            ?;
        self.add_to_index(&Self::verb_index_key("all"), &verb.id).await?;
        self.add_to_index(&Self::verb_index_key(&format!("source:{}", verb.source_id)), &verb.id)
            .await?;
        self.add_to_index(&Self::verb_index_key(&format!("target:{}", verb.target_id)), &verb.id)
            .await?;
        self.add_to_index(
            &Self::verb_index_key(&format!("type:{}", verb.verb_type)),
            &verb.id,
        )
        .await
    }

    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>> {
        match self.engine.get(&Self::verb_key(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_all_verbs(&self) -> Result<Vec<Verb>> {
        let ids = self.load_index(&Self::verb_index_key("all")).await?;
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_source(&self, source_id: &NounId) -> Result<Vec<Verb>> {
        let ids = self
            .load_index(&Self::verb_index_key(&format!("source:{source_id}")))
            .await?;
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_target(&self, target_id: &NounId) -> Result<Vec<Verb>> {
        let ids = self
            .load_index(&Self::verb_index_key(&format!("target:{target_id}")))
            .await?;
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_type(&self, verb_type: &str) -> Result<Vec<Verb>> {
        let ids = self
            .load_index(&Self::verb_index_key(&format!("type:{verb_type}")))
            .await?;
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn delete_verb(&self, id: &VerbId) -> Result<()> {
        if let Some(verb) = self.get_verb(id).await? {
            self.remove_from_index(&Self::verb_index_key("all"), id).await?;
            self.remove_from_index(&Self::verb_index_key(&format!("source:{}", verb.source_id)), id)
                .await?;
            self.remove_from_index(&Self::verb_index_key(&format!("target:{}", verb.target_id)), id)
                .await?;
            self.remove_from_index(
                &Self::verb_index_key(&format!("type:{}", verb.verb_type)),
                id,
            )
            .await?;
        }
        self.engine.delete(&Self::verb_key(id)).await
    }

    async fn save_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.engine
            .put(format!("meta:{key}").as_bytes(), &bytes)
            .await
            
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self
            .engine
            .get(format!("meta:{key}").as_bytes())
            .await
            ?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save_statistics(&self, stats: &Statistics) -> Result<()> {
        let bytes = serde_json::to_vec(stats)?;
        self.engine.put(STATS_KEY.as_bytes(), &bytes).await
    }

    async fn get_statistics(&self) -> Result<Statistics> {
        match self.engine.get(STATS_KEY.as_bytes()).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Statistics::new()),
        }
    }

    async fn flush_statistics(&self, deltas: &StatisticsDelta) -> Result<Statistics> {
        let mut stats = self.get_statistics().await?;
        apply_deltas(&mut stats, deltas);
        self.save_statistics(&stats).await?;
        Ok(stats)
    }

    async fn acquire_lock(&self, name: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let key = Self::lock_key(name);
        let existing = self.engine.get(&key).await?;
        if let Some(bytes) = &existing {
            let state: LockRecord = serde_json::from_slice(bytes)?;
            if state.owner != owner && state.expires_at_ms >= now_ms {
                return Ok(false);
            }
        }

        let record = LockRecord {
            owner: owner.to_string(),
            expires_at_ms: now_ms + ttl_ms,
        };
        self.engine
            .put(&key, &serde_json::to_vec(&record)?)
            .await
            ?;
        Ok(true)
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<()> {
        let key = Self::lock_key(name);
        if let Some(bytes) = self.engine.get(&key).await? {
            let state: LockRecord = serde_json::from_slice(&bytes)?;
            if state.owner != owner {
                return Err(Error::LockHeld(format!("lock {name} held by a different owner")));
            }
        }
        self.engine.delete(&key).await
    }

    async fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        let mut log: Vec<ChangeLogEntry> = match self
            .engine
            .get(CHANGE_LOG_KEY.as_bytes())
            .await
            ?
        {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        log.push(entry.clone());
        self.engine
            .put(CHANGE_LOG_KEY.as_bytes(), &serde_json::to_vec(&log)?)
            .await
            
    }

    async fn read_change_log(&self, since: u64) -> Result<Vec<ChangeLogEntry>> {
        let log: Vec<ChangeLogEntry> = match self
            .engine
            .get(CHANGE_LOG_KEY.as_bytes())
            .await
            ?
        {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        Ok(log.into_iter().filter(|e| e.seq > since).collect())
    }

    async fn clear(&self) -> Result<()> {
        for partition in NOUN_PARTITIONS.iter().chain(std::iter::once(&LEGACY_PARTITION)) {
            let ids = self.load_index(&Self::noun_index_key(partition)).await?;
            for id in ids {
                self.engine.delete(&Self::noun_key(&id)).await?;
            }
            self.save_index(&Self::noun_index_key(partition), &[]).await?;
        }
        let verb_ids = self.load_index(&Self::verb_index_key("all")).await?;
        for id in verb_ids {
            self.engine.delete(&Self::verb_key(&id)).await?;
        }
        self.save_index(&Self::verb_index_key("all"), &[]).await?;
        self.engine.delete(STATS_KEY.as_bytes()).await?;
        self.engine
            .delete(CHANGE_LOG_KEY.as_bytes())
            .await
            
    }

    async fn get_storage_status(&self) -> Result<StorageStatus> {
        let nouns = self.get_all_nouns(None).await?;
        let verbs = self.get_all_verbs().await?;
        Ok(StorageStatus {
            noun_count: nouns.len() as u64,
            verb_count: verbs.len() as u64,
            backend: "filesystem".to_string(),
        })
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LockRecord {
    owner: String,
    expires_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainy_core::{Connections, Metadata};
    use tempfile::TempDir;

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
    async fn save_and_reopen_preserves_nouns() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db");

        {
            let storage = FileSystemAdapter::open(&path).unwrap();
            storage.save_noun(&sample_noun("n1", "concept")).await.unwrap();
        }

        let storage = FileSystemAdapter::open(&path).unwrap();
        let fetched = storage.get_noun(&"n1".to_string()).await.unwrap();
        assert_eq!(fetched.unwrap().id, "n1");
    }

    #[tokio::test]
    async fn partition_index_survives_delete() {
        let temp = TempDir::new().unwrap();
        let storage = FileSystemAdapter::open(temp.path().join("db")).unwrap();

        storage.save_noun(&sample_noun("n1", "person")).await.unwrap();
        storage.save_noun(&sample_noun("n2", "person")).await.unwrap();
        storage.delete_noun(&"n1".to_string()).await.unwrap();

        let people = storage.get_nouns_by_noun_type("person").await.unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, "n2");
    }
}
