//! 🔌 Backends: where the real I/O happens.
//!
//! 🎭 This module is the casting agency. Need a real Elasticsearch cluster?
//! Need something that lives in RAM and forgets everything when the test ends?
//! We've got a backend for that. Two of them, in fact. Don't get greedy.
//!
//! Every backend implements [`EventStore`]: one bulk call for the hot path, a
//! handful of check/create/update calls for provisioning, and one search call for
//! the read side. [`StoreBackend`] is the enum that dispatches to the concrete
//! store so the rest of the crate never needs to know which one it's talking to.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::bulk::{BulkOperation, BulkResponse};

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchStore};
pub use in_mem::InMemoryStore;

/// 🗄️ Everything evlog asks of a document store.
///
/// # Contract
/// - Non-2xx answers surface as [`crate::error::BackendError`] inside the anyhow chain,
///   so callers can tell "already exists" from "on fire".
/// - `*_exists` calls answer `false` for 404 and only error on real failures.
/// - `get_*` calls answer an empty map for 404 (nothing matched the pattern).
/// - `bulk` only fails for whole-request failures; per-item trouble lives in the response.
#[async_trait]
pub trait EventStore: std::fmt::Debug + Send + Sync {
    /// 📦 One `_bulk` request. Per-item failures are in the response, not the `Err`.
    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse>;

    async fn ilm_policy_exists(&self, name: &str) -> Result<bool>;
    async fn put_ilm_policy(&self, name: &str, policy: &Value) -> Result<()>;

    /// 🏚️ Legacy (`_template`) template existence.
    async fn legacy_template_exists(&self, name: &str) -> Result<bool>;
    /// 🏗️ Composable (`_index_template`) template existence.
    async fn index_template_exists(&self, name: &str) -> Result<bool>;
    /// 🏗️ PUT a composable template. `create_only` makes an existing template an error.
    async fn put_index_template(&self, name: &str, template: &Value, create_only: bool) -> Result<()>;

    /// 🏚️ Legacy templates matching a name pattern, keyed by template name.
    async fn get_legacy_templates(&self, pattern: &str) -> Result<Map<String, Value>>;
    async fn put_legacy_template(&self, name: &str, template: &Value) -> Result<()>;

    /// ⚙️ `{index: {"settings": {...}}}` for indices matching the pattern.
    async fn get_index_settings(&self, pattern: &str) -> Result<Map<String, Value>>;
    async fn put_index_settings(&self, index: &str, settings: &Value) -> Result<()>;

    /// 🏷️ `{index: {"aliases": {...}}}` for indices matching the pattern.
    async fn get_aliases(&self, pattern: &str) -> Result<Map<String, Value>>;
    /// 🏷️ POST `_aliases` with a `{"actions": [...]}` body.
    async fn update_aliases(&self, actions: &Value) -> Result<()>;
    async fn alias_exists(&self, name: &str) -> Result<bool>;

    async fn create_index(&self, name: &str, body: &Value) -> Result<()>;

    /// 🔍 Run a search body against an index pattern.
    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse>;
}

/// 🔍 The slice of a search response evlog reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: SearchHits,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchHits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// 🔢 `hits.total` is a plain number on old clusters and `{value, relation}` on new ones.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: Option<String>,
    },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Object { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl SearchResponse {
    pub fn total(&self) -> u64 {
        self.hits.total.as_ref().map(TotalHits::value).unwrap_or(0)
    }

    pub fn into_sources(self) -> Vec<Value> {
        self.hits.hits.into_iter().map(|hit| hit.source).collect()
    }
}

/// 🔧 Which store to talk to. TOML: `[backend.elasticsearch]` or `backend = "in_memory"`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Elasticsearch(ElasticsearchConfig),
    InMemory,
}

/// 🎭 The many faces of a store: a polymorphic casting call for document backends.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    Elasticsearch(ElasticsearchStore),
}

impl StoreBackend {
    /// 🚀 Build and connect the store named by the config.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        Ok(match config {
            StoreConfig::Elasticsearch(es) => Self::Elasticsearch(ElasticsearchStore::new(es).await?),
            StoreConfig::InMemory => Self::InMemory(InMemoryStore::new()),
        })
    }

    fn inner(&self) -> &dyn EventStore {
        match self {
            Self::InMemory(store) => store,
            Self::Elasticsearch(store) => store,
        }
    }
}

#[async_trait]
impl EventStore for StoreBackend {
    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        self.inner().bulk(operations).await
    }

    async fn ilm_policy_exists(&self, name: &str) -> Result<bool> {
        self.inner().ilm_policy_exists(name).await
    }

    async fn put_ilm_policy(&self, name: &str, policy: &Value) -> Result<()> {
        self.inner().put_ilm_policy(name, policy).await
    }

    async fn legacy_template_exists(&self, name: &str) -> Result<bool> {
        self.inner().legacy_template_exists(name).await
    }

    async fn index_template_exists(&self, name: &str) -> Result<bool> {
        self.inner().index_template_exists(name).await
    }

    async fn put_index_template(&self, name: &str, template: &Value, create_only: bool) -> Result<()> {
        self.inner().put_index_template(name, template, create_only).await
    }

    async fn get_legacy_templates(&self, pattern: &str) -> Result<Map<String, Value>> {
        self.inner().get_legacy_templates(pattern).await
    }

    async fn put_legacy_template(&self, name: &str, template: &Value) -> Result<()> {
        self.inner().put_legacy_template(name, template).await
    }

    async fn get_index_settings(&self, pattern: &str) -> Result<Map<String, Value>> {
        self.inner().get_index_settings(pattern).await
    }

    async fn put_index_settings(&self, index: &str, settings: &Value) -> Result<()> {
        self.inner().put_index_settings(index, settings).await
    }

    async fn get_aliases(&self, pattern: &str) -> Result<Map<String, Value>> {
        self.inner().get_aliases(pattern).await
    }

    async fn update_aliases(&self, actions: &Value) -> Result<()> {
        self.inner().update_aliases(actions).await
    }

    async fn alias_exists(&self, name: &str) -> Result<bool> {
        self.inner().alias_exists(name).await
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<()> {
        self.inner().create_index(name, body).await
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        self.inner().search(index, body).await
    }
}
