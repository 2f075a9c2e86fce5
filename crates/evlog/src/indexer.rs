//! 📦 The Batch Indexer: turns a batch of events into exactly one `_bulk` request.
//!
//! 🎬 *[a batch arrives. it has been waiting up to a whole second. it is tired.]*
//!
//! The indexer is the last stop. It asks the readiness predicate whether writes
//! are allowed, renders the batch as `create` operations, sends them, and reports
//! what happened. It never raises: item failures are logged with their reasons,
//! request failures are logged with the body that failed, and the caller gets an
//! [`IndexOutcome`] it is free to ignore. Events that fail are lost. That's the
//! deal with fire-and-forget. 🦆

use tracing::{debug, error, trace};

use crate::backends::EventStore;
use crate::bulk::{BulkOperation, BulkResponse, render_bulk_body};
use crate::client::ClientHandle;
use crate::common::EventBatch;
use crate::readiness::Readiness;

/// 🧾 What became of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// 🚦 Writes weren't allowed; nothing was sent.
    NotReady { dropped: usize },
    /// ✅ The request went through. Some items may still have failed.
    Indexed { created: usize, failed: usize },
    /// 💀 The request itself failed; every record in it is gone.
    RequestFailed { records: usize },
}

/// 📦 Sends batches to the store, one request per batch.
#[derive(Clone)]
pub struct BatchIndexer {
    client: ClientHandle,
    readiness: Readiness,
}

impl std::fmt::Debug for BatchIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchIndexer").field("client", &self.client).finish_non_exhaustive()
    }
}

impl BatchIndexer {
    pub fn new(client: ClientHandle, readiness: Readiness) -> Self {
        Self { client, readiness }
    }

    /// 🚀 Index one batch. Never fails; see [`IndexOutcome`] for what happened.
    pub async fn index_batch(&self, batch: EventBatch) -> IndexOutcome {
        if !(self.readiness)().await {
            debug!("🚦 store not ready, not indexing {} documents", batch.len());
            return IndexOutcome::NotReady { dropped: batch.len() };
        }

        let operations: Vec<BulkOperation> = batch
            .records
            .into_iter()
            // -- a null body would be a two-line pair with nothing to say
            .filter(|record| !record.body.is_null())
            .map(|record| BulkOperation::create(record.index, record.body))
            .collect();
        if operations.is_empty() {
            return IndexOutcome::Indexed { created: 0, failed: 0 };
        }
        let records = operations.len();

        let result: anyhow::Result<BulkResponse> = async {
            let store = self.client.get().await?;
            store.bulk(&operations).await
        }
        .await;

        match result {
            Ok(response) => {
                let mut failed = 0;
                for (action, item) in response.failed_items() {
                    failed += 1;
                    error!(
                        "💀 {action} into {} failed with status {}: {}",
                        item.index.as_deref().unwrap_or("<unknown index>"),
                        item.status,
                        item.describe_error()
                    );
                }
                let created = response.succeeded();
                trace!("✅ indexed batch: {created} created, {failed} failed");
                IndexOutcome::Indexed { created, failed }
            }
            Err(err) => {
                let body = render_bulk_body(&operations).unwrap_or_else(|render_err| format!("<unrenderable: {render_err}>"));
                error!("💀 error writing bulk events: \"{err:#}\"; docs: {body}");
                IndexOutcome::RequestFailed { records }
            }
        }
    }
}
