//! 📜 evlog: buffered event logging into Elasticsearch.
//!
//! Producers hand events to an [`EventLogger`] and move on. The events are
//! windowed by an [`EventBuffer`], bulk-indexed by a [`BatchIndexer`] once the
//! [`SchemaProvisioner`] has made sure the policy, template and write alias
//! exist, and read back by owner through the [`QueryGateway`]. The
//! [`EventLogService`] starts all of it and shuts it down without losing what
//! was already queued.

pub mod app_config;
pub mod backends;
pub mod buffer;
pub mod bulk;
pub mod client;
pub mod common;
pub mod error;
pub mod filter;
pub mod indexer;
pub mod lifecycle;
pub mod logger;
pub mod ndjson;
pub mod provisioner;
pub mod query;
pub mod readiness;
pub mod schema;

pub use app_config::{AppConfig, load_config};
pub use backends::{EventStore, StoreBackend, StoreConfig};
pub use buffer::{BufferConfig, BufferStats, EventBuffer};
pub use client::ClientHandle;
pub use common::{EventBatch, EventRecord, OwnerReference};
pub use error::{BackendError, EventLogError};
pub use filter::{FilterSyntaxError, FilterTranslator, QueryStringTranslator};
pub use indexer::{BatchIndexer, IndexOutcome};
pub use lifecycle::{EventLogService, LifecycleState};
pub use logger::EventLogger;
pub use provisioner::SchemaProvisioner;
pub use query::{FindOptions, OwnerQuery, QueryGateway, QueryResult, SortOrder};
pub use readiness::{Readiness, ReadySignal};
pub use schema::{EsNames, IlmConfig, SchemaConfig};
