//! Browser Origin-Private-File-System backend. Only compiled for
//! `wasm32` targets; every other platform never sees this module.
//!
//! OPFS exposes a directory-handle tree, not a key-value store, so this
//! adapter lays out one file per noun/verb under content-addressed
//! subdirectories mirroring the partitions used by [`crate::FileSystemAdapter`].
//! There is no native lease primitive in OPFS either, so locks are files
//! holding a JSON `{owner, expires_at_ms}` record, written with
//! create-exclusive semantics via `getFileHandle({create: true})` plus a
//! read-check-write race window — acceptable because OPFS access is
//! single-tab in practice (each browser tab owns its own origin storage).

use crate::adapter::{StorageAdapter, StorageStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use brainy_core::{
    apply_deltas, partition_for, ChangeLogEntry, Noun, NounId, Statistics, StatisticsDelta, Verb, VerbId,
    NOUN_PARTITIONS,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::FileSystemDirectoryHandle;

const LEGACY_PARTITION: &str = "__legacy__";

pub struct OpfsAdapter {
    root: FileSystemDirectoryHandle,
}

impl OpfsAdapter {
    /// Opens (creating if absent) the origin-private root directory.
    pub async fn open() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| Error::Storage("no window".to_string()))?;
        let storage_manager = window.navigator().storage();
        let root: FileSystemDirectoryHandle = JsFuture::from(storage_manager.get_directory())
            .await
            .map_err(|e| Error::Storage(format!("{e:?}")))?
            .dyn_into()
            .map_err(|_| Error::Storage("getDirectory did not return a directory handle".to_string()))?;
        Ok(Self { root })
    }

    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.file_handle(path, false).await {
            Ok(handle) => {
                let file = JsFuture::from(handle.get_file())
                    .await
                    .map_err(|e| Error::Storage(format!("{e:?}")))?;
                let array_buffer = JsFuture::from(
                    file.dyn_into::<web_sys::File>()
                        .map_err(|_| Error::Storage("not a File".to_string()))?
                        .array_buffer(),
                )
                .await
                .map_err(|e| Error::Storage(format!("{e:?}")))?;
                let bytes = js_sys::Uint8Array::new(&array_buffer).to_vec();
                Ok(Some(bytes))
            }
            Err(_) => Ok(None),
        }
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let handle = self.file_handle(path, true).await?;
        let writable = JsFuture::from(handle.create_writable())
            .await
            .map_err(|e| Error::Storage(format!("{e:?}")))?;
        let array = js_sys::Uint8Array::from(bytes);
        let writable: web_sys::FileSystemWritableFileStream = writable
            .dyn_into()
            .map_err(|_| Error::Storage("not a writable stream".to_string()))?;
        JsFuture::from(
            writable
                .write_with_buffer_source(&array)
                .map_err(|e| Error::Storage(format!("{e:?}")))?,
        )
        .await
        .map_err(|e| Error::Storage(format!("{e:?}")))?;
        JsFuture::from(writable.close())
            .await
            .map_err(|e| Error::Storage(format!("{e:?}")))?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let _ = JsFuture::from(self.root.remove_entry(path)).await;
        Ok(())
    }

    async fn file_handle(&self, path: &str, create: bool) -> Result<web_sys::FileSystemFileHandle> {
        let opts = web_sys::FileSystemGetFileOptions::new();
        opts.set_create(create);
        JsFuture::from(self.root.get_file_handle_with_options(path, &opts))
            .await
            .map_err(|e| Error::Storage(format!("{e:?}")))?
            .dyn_into()
            .map_err(|_| Error::Storage("not a file handle".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.read_file(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T: serde::Serialize>(&self, path: &str, value: &T) -> Result<()> {
        self.write_file(path, &serde_json::to_vec(value)?).await
    }

    async fn add_to_index(&self, path: &str, id: &str) -> Result<()> {
        let mut ids: Vec<String> = self.get_json(path).await?.unwrap_or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
            self.put_json(path, &ids).await?;
        }
        Ok(())
    }

    async fn remove_from_index(&self, path: &str, id: &str) -> Result<()> {
        let mut ids: Vec<String> = self.get_json(path).await?.unwrap_or_default();
        ids.retain(|existing| existing != id);
        self.put_json(path, &ids).await
    }

    fn noun_path(id: &str) -> String {
        format!("noun-{id}.json")
    }

    fn verb_path(id: &str) -> String {
        format!("verb-{id}.json")
    }

    fn noun_index_path(partition: &str) -> String {
        format!("idx-noun-{partition}.json")
    }
}

#[async_trait(?Send)]
impl StorageAdapter for OpfsAdapter {
    async fn save_noun(&self, noun: &Noun) -> Result<()> {
        self.put_json(&Self::noun_path(&noun.id), noun).await?;
        let partition = partition_for(noun.noun_type());
        self.add_to_index(&Self::noun_index_path(partition), &noun.id).await
    }

    async fn get_noun(&self, id: &NounId) -> Result<Option<Noun>> {
        self.get_json(&Self::noun_path(id)).await
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
            let ids: Vec<String> = self.get_json(&Self::noun_index_path(&partition)).await?.unwrap_or_default();
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
            self.remove_from_index(&Self::noun_index_path(partition), id).await?;
        }
        self.delete_file(&Self::noun_path(id)).await
    }

    async fn save_verb(&self, verb: &Verb) -> Result<()> {
        self.put_json(&Self::verb_path(&verb.id), verb).await?;
        self.add_to_index("idx-verb-all.json", &verb.id).await
    }

    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>> {
        self.get_json(&Self::verb_path(id)).await
    }

    async fn get_all_verbs(&self) -> Result<Vec<Verb>> {
        let ids: Vec<String> = self.get_json("idx-verb-all.json").await?.unwrap_or_default();
        let mut verbs = Vec::new();
        for id in ids {
            if let Some(verb) = self.get_verb(&id).await? {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }

    async fn get_verbs_by_source(&self, source_id: &NounId) -> Result<Vec<Verb>> {
        Ok(self
            .get_all_verbs()
            .await?
            .into_iter()
            .filter(|v| &v.source_id == source_id)
            .collect())
    }

    async fn get_verbs_by_target(&self, target_id: &NounId) -> Result<Vec<Verb>> {
        Ok(self
            .get_all_verbs()
            .await?
            .into_iter()
            .filter(|v| &v.target_id == target_id)
            .collect())
    }

    async fn get_verbs_by_type(&self, verb_type: &str) -> Result<Vec<Verb>> {
        Ok(self
            .get_all_verbs()
            .await?
            .into_iter()
            .filter(|v| v.verb_type.to_string() == verb_type)
            .collect())
    }

    async fn delete_verb(&self, id: &VerbId) -> Result<()> {
        self.remove_from_index("idx-verb-all.json", id).await?;
        self.delete_file(&Self::verb_path(id)).await
    }

    async fn save_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.put_json(&format!("meta-{key}.json"), value).await
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        self.get_json(&format!("meta-{key}.json")).await
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

    async fn acquire_lock(&self, name: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let path = format!("lock-{name}.json");
        let now_ms = js_sys::Date::now() as u64;
        if let Some(current) = self.get_json::<LockRecord>(&path).await? {
            if current.owner != owner && current.expires_at_ms >= now_ms {
                return Ok(false);
            }
        }
        self.put_json(
            &path,
            &LockRecord {
                owner: owner.to_string(),
                expires_at_ms: now_ms + ttl_ms,
            },
        )
        .await?;
        Ok(true)
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<()> {
        let path = format!("lock-{name}.json");
        if let Some(current) = self.get_json::<LockRecord>(&path).await? {
            if current.owner != owner {
                return Err(Error::LockHeld(format!("lock {name} held by a different owner")));
            }
        }
        self.delete_file(&path).await
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
        let nouns = self.get_all_nouns(None).await?;
        for noun in nouns {
            self.delete_file(&Self::noun_path(&noun.id)).await?;
        }
        let verbs = self.get_all_verbs().await?;
        for verb in verbs {
            self.delete_file(&Self::verb_path(&verb.id)).await?;
        }
        self.delete_file("stats.json").await?;
        self.delete_file("changelog.json").await
    }

    async fn get_storage_status(&self) -> Result<StorageStatus> {
        let nouns = self.get_all_nouns(None).await?;
        let verbs = self.get_all_verbs().await?;
        Ok(StorageStatus {
            noun_count: nouns.len() as u64,
            verb_count: verbs.len() as u64,
            backend: "opfs".to_string(),
        })
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LockRecord {
    owner: String,
    expires_at_ms: u64,
}
