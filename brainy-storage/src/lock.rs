//! TTL-bound advisory locks and the retry-with-backoff helper adapters use
//! to acquire them under contention.

use crate::{Result, StorageAdapter};
use std::time::Duration;

/// An acquired lock. Dropping it does not release it — callers must call
/// [`LockHandle::release`] explicitly, since release is an async I/O call
/// against the backend.
#[derive(Debug, Clone)]
pub struct LockHandle {
    pub name: String,
    pub owner: String,
}

impl LockHandle {
    pub async fn release(&self, storage: &dyn StorageAdapter) -> Result<()> {
        storage.release_lock(&self.name, &self.owner).await
    }
}

/// Retries `acquire_lock` with exponential backoff and jitter, giving up
/// after `max_attempts`. Mirrors the retry shape used elsewhere in the
/// workspace for contended remote calls.
pub async fn acquire_with_backoff(
    storage: &dyn StorageAdapter,
    name: &str,
    owner: &str,
    ttl_ms: u64,
    max_attempts: u32,
) -> Result<Option<LockHandle>> {
    let mut attempt = 0u32;
    let mut delay = Duration::from_millis(25);

    loop {
        if storage.acquire_lock(name, owner, ttl_ms).await? {
            return Ok(Some(LockHandle {
                name: name.to_string(),
                owner: owner.to_string(),
            }));
        }

        attempt += 1;
        if attempt >= max_attempts {
            tracing::debug!(lock = name, attempts = attempt, "giving up on lock acquisition");
            return Ok(None);
        }

        let jitter_ms = rand::random::<u64>() % 20;
        tokio::time::sleep(delay + Duration::from_millis(jitter_ms)).await;
        delay = (delay * 2).min(Duration::from_secs(2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryAdapter;

    #[tokio::test]
    async fn acquire_with_backoff_succeeds_when_free() {
        let storage = MemoryAdapter::new();
        let lock = acquire_with_backoff(&storage, "stats", "instance-a", 5_000, 5)
            .await
            .unwrap();
        assert!(lock.is_some());
    }

    #[tokio::test]
    async fn acquire_with_backoff_gives_up_when_held() {
        let storage = MemoryAdapter::new();
        storage.acquire_lock("stats", "instance-a", 5_000).await.unwrap();
        let lock = acquire_with_backoff(&storage, "stats", "instance-b", 5_000, 3)
            .await
            .unwrap();
        assert!(lock.is_none());
    }
}
