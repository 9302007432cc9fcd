//! S3-compatible backend on top of the `object_store` crate. Locks use
//! conditional-put (put-if-absent / put-if-match) rather than a native
//! lease primitive, since object stores don't offer one.

use crate::adapter::{StorageAdapter, StorageStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use brainy_core::{
    apply_deltas, partition_for, ChangeLogEntry, Noun, NounId, Statistics, StatisticsDelta, Verb, VerbId,
    NOUN_PARTITIONS,
};
use object_store::{path::Path as ObjectPath, ObjectStore, PutMode, PutOptions, UpdateVersion};
use std::sync::Arc;

const LEGACY_PARTITION: &str = "__legacy__";

pub struct ObjectStoreAdapter {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreAdapter {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn path(&self, suffix: &str) -> ObjectPath {
        ObjectPath::from(format!("{}/{}", self.prefix, suffix))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, suffix: &str) -> Result<Option<T>> {
        match self.store.get(&self.path(suffix)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(Error::ObjectStore(err)),
        }
    }

    async fn put_json<T: serde::Serialize>(&self, suffix: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.put(&self.path(suffix), bytes.into()).await?;
        Ok(())
    }

    async fn delete_quiet(&self, suffix: &str) -> Result<()> {
        match self.store.delete(&self.path(suffix)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(Error::ObjectStore(err)),
        }
    }

    fn noun_index_suffix(partition: &str) -> String {
        format!("index/noun/{partition}.json")
    }

    fn verb_index_suffix(name: &str) -> String {
        format!("index/verb/{name}.json")
    }

    async fn add_to_index(&self, suffix: &str, id: &str) -> Result<()> {
        let mut ids: Vec<String> = self.get_json(suffix).await?.unwrap_or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
            self.put_json(suffix, &ids).await?;
        }
        Ok(())
    }

    async fn remove_from_index(&self, suffix: &str, id: &str) -> Result<()> {
        let mut ids: Vec<String> = self.get_json(suffix).await?.unwrap_or_default();
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            self.put_json(suffix, &ids).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for ObjectStoreAdapter {
    async fn save_noun(&self, noun: &Noun) -> Result<()> {
        self.put_json(&format!("noun/{}.json", noun.id), noun).await?;
        let partition = partition_for(noun.noun_type());
        self.add_to_index(&Self::noun_index_suffix(partition), &noun.id).await
    }

    async fn get_noun(&self, id: &NounId) -> Result<Option<Noun>> {
        self.get_json(&format!("noun/{id}.json")).await
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
            let ids: Vec<String> = self
                .get_json(&Self::noun_index_suffix(&partition))
                .await?
                .unwrap_or_default();
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
            self.remove_from_index(&Self::noun_index_suffix(partition), id).await?;
        }
        self.remove_from_index(&Self::noun_index_suffix(LEGACY_PARTITION), id).await?;
        self.delete_quiet(&format!("noun/{id}.json")).await
    }

    async fn save_verb(&self, verb: &Verb) -> Result<()> {
        self.put_json(&format!("verb/{}.json", verb.id), verb).await?;
        self.add_to_index(&Self::verb_index_suffix("all"), &verb.id).await?;
        self.add_to_index(&Self::verb_index_suffix(&format!("source/{}", verb.source_id)), &verb.id)
            .await?;
        self.add_to_index(&Self::verb_index_suffix(&format!("target/{}", verb.target_id)), &verb.id)
            .await?;
        self.add_to_index(
            &Self::verb_index_suffix(&format!("type/{}", verb.verb_type)),
            &verb.id,
        )
        .await
    }

    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>> {
        self.get_json(&format!("verb/{id}.json")).await
    }

    async fn get_all_verbs(&self) -> Result<Vec<Verb>> {
        let ids: Vec<String> = self.get_json(&Self::verb_index_suffix("all")).await?.unwrap_or_default();
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_source(&self, source_id: &NounId) -> Result<Vec<Verb>> {
        let ids: Vec<String> = self
            .get_json(&Self::verb_index_suffix(&format!("source/{source_id}")))
            .await?
            .unwrap_or_default();
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_target(&self, target_id: &NounId) -> Result<Vec<Verb>> {
        let ids: Vec<String> = self
            .get_json(&Self::verb_index_suffix(&format!("target/{target_id}")))
            .await?
            .unwrap_or_default();
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_type(&self, verb_type: &str) -> Result<Vec<Verb>> {
        let ids: Vec<String> = self
            .get_json(&Self::verb_index_suffix(&format!("type/{verb_type}")))
            .await?
            .unwrap_or_default();
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
            self.remove_from_index(&Self::verb_index_suffix("all"), id).await?;
            self.remove_from_index(&Self::verb_index_suffix(&format!("source/{}", verb.source_id)), id)
                .await?;
            self.remove_from_index(&Self::verb_index_suffix(&format!("target/{}", verb.target_id)), id)
                .await?;
            self.remove_from_index(&Self::verb_index_suffix(&format!("type/{}", verb.verb_type)), id)
                .await?;
        }
        self.delete_quiet(&format!("verb/{id}.json")).await
    }

    async fn save_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.put_json(&format!("meta/{key}.json"), value).await
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get_json(&format!("meta/{key}.json")).await
    }

    async fn save_statistics(&self, stats: &Statistics) -> Result<()> {
        self.put_json("stats.json", stats).await
    }

    async fn get_statistics(&self) -> Result<Statistics> {
        Ok(self.get_json("stats.json").await?.unwrap_or_default())
    }

    async fn flush_statistics(&self, deltas: &StatisticsDelta) -> Result<Statistics> {
        let mut stats = self.get_statistics().await?;
        apply_deltas(&mut stats, deltas);
        self.save_statistics(&stats).await?;
        Ok(stats)
    }

    /// Conditional put: the lock object is written with `PutMode::Create`
    /// (fails if it already exists) unless the existing lease has expired,
    /// in which case it's overwritten with `PutMode::Update` pinned to the
    /// version just read, so a racing refresh from another instance loses.
    async fn acquire_lock(&self, name: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let path = self.path(&format!("lock/{name}.json"));
        let record = LockRecord {
            owner: owner.to_string(),
            expires_at_ms: now_ms + ttl_ms,
        };
        let bytes: bytes::Bytes = serde_json::to_vec(&record)?.into();

        match self.store.get(&path).await {
            Err(object_store::Error::NotFound { .. }) => {
                match self
                    .store
                    .put_opts(&path, bytes, PutOptions::from(PutMode::Create))
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
                    Err(err) => Err(Error::ObjectStore(err)),
                }
            }
            Ok(existing) => {
                let version = UpdateVersion {
                    e_tag: existing.meta.e_tag.clone(),
                    version: existing.meta.version.clone(),
                };
                let current: LockRecord = serde_json::from_slice(&existing.bytes().await?)?;
                if current.owner != owner && current.expires_at_ms >= now_ms {
                    return Ok(false);
                }
                match self
                    .store
                    .put_opts(&path, bytes, PutOptions::from(PutMode::Update(version)))
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(object_store::Error::Precondition { .. }) => Ok(false),
                    Err(err) => Err(Error::ObjectStore(err)),
                }
            }
            Err(err) => Err(Error::ObjectStore(err)),
        }
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<()> {
        let suffix = format!("lock/{name}.json");
        if let Some(current) = self.get_json::<LockRecord>(&suffix).await? {
            if current.owner != owner {
                return Err(Error::LockHeld(format!("lock {name} held by a different owner")));
            }
        }
        self.delete_quiet(&suffix).await
    }

    async fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<()> {
        let mut log: Vec<ChangeLogEntry> = self.get_json("changelog.json").await?.unwrap_or_default();
        log.push(entry.clone());
        self.put_json("changelog.json", &log).await
    }

    async fn read_change_log(&self, since: u64) -> Result<Vec<ChangeLogEntry>> {
        let log: Vec<ChangeLogEntry> = self.get_json("changelog.json").await?.unwrap_or_default();
        Ok(log.into_iter().filter(|e| e.seq > since).collect())
    }

    async fn clear(&self) -> Result<()> {
        for partition in NOUN_PARTITIONS.iter().chain(std::iter::once(&LEGACY_PARTITION)) {
            let ids: Vec<String> = self
                .get_json(&Self::noun_index_suffix(partition))
                .await?
                .unwrap_or_default();
            for id in ids {
                self.delete_quiet(&format!("noun/{id}.json")).await?;
            }
            self.put_json(&Self::noun_index_suffix(partition), &Vec::<String>::new()).await?;
        }
        let verb_ids: Vec<String> = self.get_json(&Self::verb_index_suffix("all")).await?.unwrap_or_default();
        for id in verb_ids {
            self.delete_quiet(&format!("verb/{id}.json")).await?;
        }
        self.put_json(&Self::verb_index_suffix("all"), &Vec::<String>::new()).await?;
        self.delete_quiet("stats.json").await?;
        self.delete_quiet("changelog.json").await
    }

    async fn get_storage_status(&self) -> Result<StorageStatus> {
        let nouns = self.get_all_nouns(None).await?;
        let verbs = self.get_all_verbs().await?;
        Ok(StorageStatus {
            noun_count: nouns.len() as u64,
            verb_count: verbs.len() as u64,
            backend: "object_store".to_string(),
        })
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LockRecord {
    owner: String,
    expires_at_ms: u64,
}
