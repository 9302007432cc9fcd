//! Pluggable storage backends for Brainy.
//!
//! [`StorageAdapter`] is the capability that every backend (in-memory,
//! filesystem, object store, browser OPFS) implements; nothing above this
//! crate depends on a concrete backend type. Nouns and verbs are kept in
//! seven logical partitions (one per noun type, plus `default`); legacy
//! records written before partitioning existed are still readable through
//! the same calls (see `brainy_core::partition_for`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock held: {0}")]
    LockHeld(String),
}

pub type Result<T> = std::result::Result<T, Error>;

mod adapter;
mod cache;
mod changelog;
mod compaction;
mod engine;
mod filesystem;
mod lock;
mod lsm;
mod memory;
mod object_store_backend;
mod statistics;
mod wal;

#[cfg(target_arch = "wasm32")]
mod opfs;

pub use adapter::{StorageAdapter, StorageStatus};
pub use cache::CacheManager;
pub use changelog::ChangeLog;
pub use engine::{StorageConfig, StorageEngine, StorageStats};
pub use filesystem::FileSystemAdapter;
pub use lock::LockHandle;
pub use lsm::LSMTree;
pub use memory::MemoryAdapter;
pub use object_store_backend::ObjectStoreAdapter;
pub use statistics::StatisticsManager;
pub use wal::WriteAheadLog;

#[cfg(target_arch = "wasm32")]
pub use opfs::OpfsAdapter;

use std::sync::Arc;

/// Creates a complete storage stack with LSM tree and compaction (used by
/// [`FileSystemAdapter`] under the hood).
pub async fn create_storage_stack(
    max_level_size: usize,
    compaction_threshold: usize,
) -> Arc<LSMTree> {
    let mut lsm = LSMTree::new(max_level_size);
    lsm.add_level().await;

    let lsm_arc = Arc::new(lsm);
    let _compaction = compaction::CompactionManager::new(lsm_arc.clone(), compaction_threshold);
    lsm_arc
}
