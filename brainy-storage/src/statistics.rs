//! Adaptive, batched statistics flushing.
//!
//! In-memory counters are authoritative for the lifetime of a process;
//! durable counters lag behind by at most one flush interval and converge
//! across instances only once each flush has landed (eventual consistency,
//! not linearizability).

use crate::StorageAdapter;
use brainy_core::{apply_deltas, Statistics, StatisticsDelta};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const BASE_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
const BUSY_QUEUE_DEPTH: usize = 100;
const LOCK_NAME: &str = "statistics-flush";

pub struct StatisticsManager {
    storage: Arc<dyn StorageAdapter>,
    counters: Mutex<Statistics>,
    pending: Mutex<StatisticsDelta>,
    owner: String,
}

impl StatisticsManager {
    pub async fn new(storage: Arc<dyn StorageAdapter>, owner: impl Into<String>) -> anyhow::Result<Arc<Self>> {
        let counters = storage.get_statistics().await?;
        Ok(Arc::new(Self {
            storage,
            counters: Mutex::new(counters),
            pending: Mutex::new(StatisticsDelta::new()),
            owner: owner.into(),
        }))
    }

    /// Applies a delta to the in-memory counters immediately and queues it
    /// for the next durable flush.
    pub async fn record(&self, name: &str, delta: i64) {
        let mut deltas = StatisticsDelta::new();
        deltas.insert(name.to_string(), delta);

        let mut counters = self.counters.lock().await;
        apply_deltas(&mut counters, &deltas);
        drop(counters);

        let mut pending = self.pending.lock().await;
        *pending.entry(name.to_string()).or_insert(0) += delta;
    }

    pub async fn snapshot(&self) -> Statistics {
        self.counters.lock().await.clone()
    }

    /// Drains the pending queue and writes it through, holding the
    /// cross-instance flush lock so concurrent instances don't race each
    /// other's deltas onto the same counters.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let deltas = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut *pending)
        };

        let ttl_ms = (MAX_FLUSH_INTERVAL.as_millis() * 3) as u64;
        let lock = crate::lock::acquire_with_backoff(
            self.storage.as_ref(),
            LOCK_NAME,
            &self.owner,
            ttl_ms,
            5,
        )
        .await?;

        let Some(lock) = lock else {
            // Another instance is flushing; re-queue and try on the next tick.
            let mut pending = self.pending.lock().await;
            for (name, delta) in deltas {
                *pending.entry(name).or_insert(0) += delta;
            }
            return Ok(());
        };

        self.storage.flush_statistics(&deltas).await?;
        lock.release(self.storage.as_ref()).await?;
        Ok(())
    }

    /// Spawns the adaptive background flush loop and returns its handle so
    /// the caller can abort it on shutdown. The interval halves under load
    /// (pending queue deeper than [`BUSY_QUEUE_DEPTH`]) and backs off to
    /// [`MAX_FLUSH_INTERVAL`] while idle.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = BASE_FLUSH_INTERVAL;
            loop {
                tokio::time::sleep(interval).await;

                let depth = this.pending.lock().await.len();
                if let Err(err) = this.flush().await {
                    tracing::warn!(error = %err, "statistics flush failed");
                }

                interval = if depth > BUSY_QUEUE_DEPTH {
                    BASE_FLUSH_INTERVAL / 2
                } else if depth == 0 {
                    (interval * 2).min(MAX_FLUSH_INTERVAL)
                } else {
                    BASE_FLUSH_INTERVAL
                };
            }
        })
    }
}
