//! 🔌 The lazy client handle.
//!
//! Producers start logging before the store connection exists. The pipeline is
//! built around a *future* of a connected store, shared by everyone who needs it:
//! the first `get()` drives the connection, every later `get()` gets the same
//! answer, good or bad. Connection failure is remembered, not retried. 🦆

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::backends::{StoreBackend, StoreConfig};

type SharedConnection = Shared<BoxFuture<'static, std::result::Result<Arc<StoreBackend>, Arc<anyhow::Error>>>>;

/// 📡 A cheaply clonable promise of a connected [`StoreBackend`].
#[derive(Clone)]
pub struct ClientHandle {
    inner: SharedConnection,
}

impl ClientHandle {
    /// 🏗️ Wrap any future that eventually produces a store.
    pub fn new<F>(connect: F) -> Self
    where
        F: Future<Output = Result<StoreBackend>> + Send + 'static,
    {
        let inner = async move { connect.await.map(Arc::new).map_err(Arc::new) }
            .boxed()
            .shared();
        Self { inner }
    }

    /// ✅ A handle that is already resolved.
    pub fn ready(store: StoreBackend) -> Self {
        Self::new(async move { Ok(store) })
    }

    /// 🚀 A handle that connects on first use, per the config.
    pub fn connect(config: StoreConfig) -> Self {
        Self::new(StoreBackend::connect(config))
    }

    /// ⏳ Wait for the store. A connection failure is reported to every caller, forever.
    pub async fn get(&self) -> Result<Arc<StoreBackend>> {
        self.inner
            .clone()
            .await
            .map_err(|err| anyhow!("💀 the event store connection could not be established: {err:#}"))
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.peek() {
            None => "pending",
            Some(Ok(_)) => "connected",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("ClientHandle").field("state", &state).finish()
    }
}
