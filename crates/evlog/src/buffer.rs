//! 🧵 The Event Buffer: where events wait for company.
//!
//! 🎬 *[producers shout events into the void. the void, it turns out, has a queue.]*
//!
//! Producers call [`EventBuffer::submit`] and walk away. Behind it, two workers:
//!
//! - the **batch worker** reads the intake channel and cuts it into windows. A
//!   window closes when it reaches `max_batch_len` records or when
//!   `flush_interval` has passed since its first record, whichever comes first.
//!   Empty windows never leave the building.
//! - the **index worker** takes closed windows, in order, and hands each one to
//!   the [`BatchIndexer`]. One flush at a time; the batch worker keeps cutting
//!   windows while a flush is in flight.
//!
//! [`EventBuffer::shutdown`] closes the intake, lets the batch worker drain what
//! was already queued (plus the final partial window), then waits for the index
//! worker to finish every flush. When it returns, nothing is left in memory. 🦆

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Sender;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::common::EventRecord;
use crate::indexer::BatchIndexer;

mod batch_worker;
mod index_worker;

use batch_worker::BatchWorker;
use index_worker::IndexWorker;

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. The handle resolves when the worker has nothing left to do.
    fn start(self) -> JoinHandle<Result<()>>;
}

/// 🔧 Window knobs.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// ⏱️ Longest a window stays open, measured from its first record.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// 📏 Most records a window holds before it closes on the spot.
    #[serde(default = "default_max_batch_len")]
    pub max_batch_len: usize,
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_max_batch_len() -> usize {
    100
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            max_batch_len: default_max_batch_len(),
        }
    }
}

impl BufferConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// 🔢 Counters, shared by the buffer and its batch worker.
#[derive(Debug, Default)]
pub(crate) struct BufferCounters {
    submitted: AtomicU64,
    dropped_after_close: AtomicU64,
    batches: AtomicU64,
}

/// 📊 A point-in-time copy of the buffer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub submitted: u64,
    pub dropped_after_close: u64,
    /// 📦 Windows handed to the index worker.
    pub batches: u64,
}

type WorkerHandles = (JoinHandle<Result<()>>, JoinHandle<Result<()>>);

/// 🧵 The producer-facing side of the pipeline.
#[derive(Debug)]
pub struct EventBuffer {
    intake: Sender<EventRecord>,
    workers: Mutex<Option<WorkerHandles>>,
    counters: Arc<BufferCounters>,
}

impl EventBuffer {
    /// 🚀 Spawn both workers. Must be called from inside a tokio runtime.
    pub fn start(indexer: BatchIndexer, config: &BufferConfig) -> Self {
        let (intake_tx, intake_rx) = async_channel::unbounded();
        let (batch_tx, batch_rx) = async_channel::unbounded();
        let counters = Arc::new(BufferCounters::default());

        let batcher = BatchWorker::new(
            intake_rx,
            batch_tx,
            config.flush_interval(),
            config.max_batch_len.max(1),
            counters.clone(),
        )
        .start();
        let flusher = IndexWorker::new(batch_rx, indexer).start();
        debug!(
            "🧵 event buffer started: flush every {:?} or {} records",
            config.flush_interval(),
            config.max_batch_len
        );

        Self {
            intake: intake_tx,
            workers: Mutex::new(Some((batcher, flusher))),
            counters,
        }
    }

    /// 📥 Queue an event. Never blocks, never fails; after shutdown the event is dropped with a warning.
    pub fn submit(&self, record: EventRecord) {
        match self.intake.try_send(record) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.counters.dropped_after_close.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "🚫 event buffer is shut down, dropping event for {}",
                    err.into_inner().index
                );
            }
        }
    }

    /// 🏁 Close the intake and wait until every queued event has been flushed.
    ///
    /// The second and later calls return once the first one has finished.
    pub async fn shutdown(&self) -> Result<()> {
        self.intake.close();
        let mut workers = self.workers.lock().await;
        let Some((batcher, flusher)) = workers.take() else {
            return Ok(());
        };
        batcher
            .await
            .context("💀 the batch worker panicked on its way out")?
            .context("💀 the batch worker failed while draining")?;
        flusher
            .await
            .context("💀 the index worker panicked on its way out")?
            .context("💀 the index worker failed while draining")?;
        info!("🏁 event buffer drained: {:?}", self.stats());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.intake.is_closed()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped_after_close: self.counters.dropped_after_close.load(Ordering::Relaxed),
            batches: self.counters.batches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryStore, StoreBackend};
    use crate::client::ClientHandle;
    use crate::readiness::{Readiness, always_ready, readiness_fn};
    use serde_json::json;
    use tokio::time::sleep;

    fn buffer_over(store: &InMemoryStore, readiness: Readiness) -> EventBuffer {
        let client = ClientHandle::ready(StoreBackend::InMemory(store.clone()));
        EventBuffer::start(BatchIndexer::new(client, readiness), &BufferConfig::default())
    }

    fn record(n: usize) -> EventRecord {
        EventRecord::new("events", json!({ "n": n }))
    }

    async fn batch_sizes(store: &InMemoryStore) -> Vec<usize> {
        store.bulk_requests().await.iter().map(Vec::len).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_lonely_event_waits_out_the_window() -> Result<()> {
        let store = InMemoryStore::new();
        let buffer = buffer_over(&store, always_ready());
        buffer.submit(record(1));

        sleep(Duration::from_millis(900)).await;
        assert!(batch_sizes(&store).await.is_empty());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(batch_sizes(&store).await, vec![1]);

        buffer.shutdown().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_full_window_does_not_wait_for_the_clock() -> Result<()> {
        let store = InMemoryStore::new();
        let buffer = buffer_over(&store, always_ready());
        for n in 0..101 {
            buffer.submit(record(n));
        }

        sleep(Duration::from_millis(10)).await;
        assert_eq!(batch_sizes(&store).await, vec![100]);

        // -- the 101st opened a window of its own and waits for its timer
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(batch_sizes(&store).await, vec![100, 1]);

        let numbers: Vec<_> = store.documents("events").await.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(numbers, (0..101).map(|n| json!(n)).collect::<Vec<_>>());
        buffer.shutdown().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_silence_produces_no_flushes() -> Result<()> {
        let store = InMemoryStore::new();
        let buffer = buffer_over(&store, always_ready());
        sleep(Duration::from_secs(10)).await;
        buffer.shutdown().await?;
        assert!(store.bulk_requests().await.is_empty());
        assert_eq!(buffer.stats().batches, 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_shutdown_waits_for_the_last_flush_to_land() -> Result<()> {
        let store = InMemoryStore::new();
        let slow = readiness_fn(|| async {
            sleep(Duration::from_secs(5)).await;
            true
        });
        let buffer = buffer_over(&store, slow);
        for n in 0..3 {
            buffer.submit(record(n));
        }

        buffer.shutdown().await?;
        assert_eq!(batch_sizes(&store).await, vec![3]);
        assert_eq!(
            buffer.stats(),
            BufferStats {
                submitted: 3,
                dropped_after_close: 0,
                batches: 1
            }
        );

        // -- second call: nothing left to do, returns right away
        buffer.shutdown().await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_late_events_are_turned_away_politely() -> Result<()> {
        let store = InMemoryStore::new();
        let buffer = buffer_over(&store, always_ready());
        buffer.shutdown().await?;
        assert!(buffer.is_closed());

        buffer.submit(record(1));
        assert_eq!(buffer.stats().dropped_after_close, 1);
        assert!(store.bulk_requests().await.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_not_ready_drops_the_batch_quietly() -> Result<()> {
        let store = InMemoryStore::new();
        let buffer = buffer_over(&store, readiness_fn(|| async { false }));
        buffer.submit(record(1));
        buffer.shutdown().await?;
        assert!(store.bulk_requests().await.is_empty());
        assert_eq!(buffer.stats().batches, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_concurrent_shutdowns_both_wait_for_the_drain() -> Result<()> {
        let store = InMemoryStore::new();
        let slow = readiness_fn(|| async {
            sleep(Duration::from_secs(2)).await;
            true
        });
        let buffer = Arc::new(buffer_over(&store, slow));
        buffer.submit(record(1));

        let twin = buffer.clone();
        let (first, second) = tokio::join!(buffer.shutdown(), twin.shutdown());
        first?;
        second?;
        assert_eq!(batch_sizes(&store).await, vec![1]);
        Ok(())
    }
}
