//! 🎬 The Lifecycle Controller: birth, readiness, and a dignified exit.
//!
//! [`EventLogService`] wires the pipeline together:
//!
//! 1. a lazy [`ClientHandle`] for the store,
//! 2. a [`ReadySignal`] resolved by provisioning, running in the background,
//! 3. an [`EventBuffer`] whose indexer waits on that signal before each flush.
//!
//! Producers can log from the first moment. Batches that flush before provisioning
//! finishes wait for it; if provisioning fails, every batch is dropped as not
//! ready and the failure is logged once, loudly.
//!
//! ```text
//!  Uninitialized ──start──▶ Ready ──shutdown──▶ Draining ──drained──▶ Stopped
//! ```
//!
//! There is no way back from `Stopped`. Build a new service. 🦆

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use crate::app_config::AppConfig;
use crate::buffer::{BufferConfig, BufferStats, EventBuffer};
use crate::client::ClientHandle;
use crate::filter::{FilterTranslator, QueryStringTranslator};
use crate::indexer::BatchIndexer;
use crate::logger::EventLogger;
use crate::provisioner::SchemaProvisioner;
use crate::query::QueryGateway;
use crate::readiness::ReadySignal;
use crate::schema::{EsNames, SchemaConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Draining,
    Stopped,
}

/// 🎬 The event log, running.
#[derive(Debug)]
pub struct EventLogService {
    client: ClientHandle,
    provisioner: SchemaProvisioner,
    version: String,
    buffer: Arc<EventBuffer>,
    ready: ReadySignal,
    state: watch::Sender<LifecycleState>,
    translator: Arc<dyn FilterTranslator>,
}

impl EventLogService {
    /// 🚀 Connect lazily to the configured store and start everything.
    pub fn start(config: &AppConfig) -> Self {
        Self::start_with_client(ClientHandle::connect(config.backend.clone()), &config.buffer, &config.schema)
    }

    /// 🚀 Start on an existing client handle. Must be called from inside a tokio runtime.
    pub fn start_with_client(client: ClientHandle, buffer: &BufferConfig, schema: &SchemaConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        let ready = ReadySignal::new();
        let provisioner = SchemaProvisioner::new(client.clone(), schema);

        let background = provisioner.clone();
        let signal = ready.clone();
        tokio::spawn(async move {
            match background.initialize().await {
                Ok(()) => {
                    signal.signal(true);
                }
                Err(err) => {
                    error!("💀 initialization failed, events will not be indexed: {err:#}");
                    signal.signal(false);
                }
            }
        });

        let indexer = BatchIndexer::new(client.clone(), ready.as_readiness());
        let buffer = Arc::new(EventBuffer::start(indexer, buffer));
        state.send_replace(LifecycleState::Ready);
        info!("🎬 event log service started, writing to {}", provisioner.names().alias);

        Self {
            client,
            provisioner,
            version: schema.version.clone(),
            buffer,
            ready,
            state,
            translator: Arc::new(QueryStringTranslator),
        }
    }

    /// 🔁 Use a different filter translator for queries handed out from now on.
    pub fn with_translator(mut self, translator: Arc<dyn FilterTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn names(&self) -> &EsNames {
        self.provisioner.names()
    }

    pub fn logger(&self) -> EventLogger {
        EventLogger::new(self.buffer.clone(), self.names().alias.clone(), self.version.clone())
    }

    pub fn query(&self) -> QueryGateway {
        QueryGateway::new(self.client.clone(), self.translator.clone())
    }

    pub fn provisioner(&self) -> &SchemaProvisioner {
        &self.provisioner
    }

    /// ⏳ Wait for provisioning. `true` if the store is ready for writes.
    pub async fn wait_until_ready(&self) -> bool {
        self.ready.wait().await
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// 🏁 Stop taking events, flush what's queued, and stop.
    ///
    /// Later calls wait for the first one to finish and then return `Ok`.
    pub async fn shutdown(&self) -> Result<()> {
        let first = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Ready {
                *state = LifecycleState::Draining;
                return true;
            }
            false
        });
        if !first {
            let mut rx = self.state.subscribe();
            // -- the sender lives in self, so the wait can only end with Stopped
            let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
            return Ok(());
        }

        info!("🚰 event log service draining");
        let drained = self.buffer.shutdown().await;
        self.state.send_replace(LifecycleState::Stopped);
        info!("🏁 event log service stopped");
        drained
    }
}
