//! 📦 The IndexWorker: patient, sequential, deeply unbothered.
//!
//! It receives batches. It indexes batches. One at a time, in the order the
//! batch worker closed them. Whatever the indexer says happened is logged at
//! trace and forgotten; the indexer already shouted about anything that matters.
//!
//! 🦆 (the duck has no comment at this time)

use anyhow::Result;
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::Worker;
use crate::common::EventBatch;
use crate::indexer::BatchIndexer;

#[derive(Debug)]
pub(crate) struct IndexWorker {
    batches: Receiver<EventBatch>,
    indexer: BatchIndexer,
}

impl IndexWorker {
    pub(crate) fn new(batches: Receiver<EventBatch>, indexer: BatchIndexer) -> Self {
        Self { batches, indexer }
    }
}

impl Worker for IndexWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 IndexWorker started draining batches...");
            loop {
                match self.batches.recv().await {
                    Ok(batch) => {
                        debug!("🪣 IndexWorker received batch of {} events", batch.len());
                        let outcome = self.indexer.index_batch(batch).await;
                        trace!("🧾 IndexWorker batch outcome: {outcome:?}");
                    }
                    Err(_) => {
                        // Channel is empty and closed
                        debug!("🏁 IndexWorker: batch channel closed. Shutting down.");
                        return Ok(());
                    }
                }
            }
        })
    }
}
