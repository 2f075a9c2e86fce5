//! 🏗️ Schema: names, field paths, and the documents the provisioner PUTs.
//!
//! Everything here is deterministic: same base name and version in, same index
//! names, same template body out. The provisioner decides *whether* to create
//! things; this module decides *what* they look like.
//!
//! 📐 Naming, for base `B` and version `V`:
//!
//! | artifact                   | name                     |
//! |----------------------------|--------------------------|
//! | write alias                | `B-event-log-V`          |
//! | lifecycle policy           | `B-event-log-policy`     |
//! | index pattern              | `B-event-log-*`          |
//! | index pattern with version | `B-event-log-V-*`        |
//! | initial index              | `B-event-log-V-000001`   |
//! | index template             | `B-event-log-V-template` |

use serde::Deserialize;
use serde_json::{Value, json};

/// 🔗 The object holding evlog's own bookkeeping fields on every event.
pub const OWNERS_OBJECT: &str = "event_log";
/// 🔗 Key of the owners array inside [`OWNERS_OBJECT`].
pub const OWNERS_FIELD: &str = "owners";
/// 🔗 Nested path for owner references.
pub const OWNERS_PATH: &str = "event_log.owners";
pub const OWNER_REL_FIELD: &str = "event_log.owners.rel";
pub const OWNER_TYPE_FIELD: &str = "event_log.owners.type";
pub const OWNER_ID_FIELD: &str = "event_log.owners.id";
pub const OWNER_NAMESPACE_FIELD: &str = "event_log.owners.namespace";
/// 🏷️ Product version that wrote the event. Mapped as an ES `version` field so ranges sort semantically.
pub const VERSION_FIELD: &str = "event_log.version";
pub const VERSION_KEY: &str = "version";
pub const TIMESTAMP_FIELD: &str = "@timestamp";
pub const REL_PRIMARY: &str = "primary";

/// ⏳ Events written before this version addressed their owners by legacy id.
pub const LEGACY_ID_CUTOFF_VERSION: &str = "8.0.0";

const EVENT_LOG_NAME_SUFFIX: &str = "-event-log";

/// 🔧 Where the event log lives and how long it sticks around.
#[derive(Debug, Deserialize, Clone)]
pub struct SchemaConfig {
    /// 📛 Prefix for every artifact name.
    #[serde(default = "default_base_name")]
    pub base_name: String,
    /// 🏷️ Version stamped on events and baked into index names.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub ilm: IlmConfig,
}

fn default_base_name() -> String {
    "evlog".to_owned()
}

// -- new events are "current" as far as owner queries are concerned
fn default_version() -> String {
    LEGACY_ID_CUTOFF_VERSION.to_owned()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            base_name: default_base_name(),
            version: default_version(),
            ilm: IlmConfig::default(),
        }
    }
}

impl SchemaConfig {
    pub fn names(&self) -> EsNames {
        EsNames::new(&self.base_name, &self.version)
    }
}

/// ♻️ Lifecycle policy knobs: roll over when hot gets too big or too old, delete when ancient.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IlmConfig {
    #[serde(default = "default_rollover_max_size")]
    pub rollover_max_size: String,
    #[serde(default = "default_rollover_max_age")]
    pub rollover_max_age: String,
    #[serde(default = "default_delete_after")]
    pub delete_after: String,
}

fn default_rollover_max_size() -> String {
    "50GB".to_owned()
}

fn default_rollover_max_age() -> String {
    "30d".to_owned()
}

fn default_delete_after() -> String {
    "90d".to_owned()
}

impl Default for IlmConfig {
    fn default() -> Self {
        Self {
            rollover_max_size: default_rollover_max_size(),
            rollover_max_age: default_rollover_max_age(),
            delete_after: default_delete_after(),
        }
    }
}

/// 📛 Every name the event log uses, computed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsNames {
    pub base: String,
    pub alias: String,
    pub ilm_policy: String,
    pub index_pattern: String,
    pub index_pattern_with_version: String,
    pub initial_index: String,
    pub index_template: String,
}

impl EsNames {
    pub fn new(base_name: &str, version: &str) -> Self {
        // -- index names must be lowercase; versions like "8.1.0-SNAPSHOT" are not
        let version_suffix = format!("-{}", version.to_lowercase());
        let event_log_name = format!("{base_name}{EVENT_LOG_NAME_SUFFIX}");
        let event_log_name_with_version = format!("{event_log_name}{version_suffix}");
        Self {
            base: base_name.to_owned(),
            alias: event_log_name_with_version.clone(),
            ilm_policy: format!("{event_log_name}-policy"),
            index_pattern: format!("{event_log_name}-*"),
            index_pattern_with_version: format!("{event_log_name_with_version}-*"),
            initial_index: format!("{event_log_name_with_version}-000001"),
            index_template: format!("{event_log_name_with_version}-template"),
        }
    }
}

/// ♻️ The lifecycle policy body.
pub fn ilm_policy(config: &IlmConfig) -> Value {
    json!({
        "policy": {
            "phases": {
                "hot": {
                    "actions": {
                        "rollover": {
                            "max_size": config.rollover_max_size,
                            "max_age": config.rollover_max_age,
                        }
                    }
                },
                "delete": {
                    "min_age": config.delete_after,
                    "actions": { "delete": {} }
                }
            }
        }
    })
}

/// 🏗️ The composable index template body.
pub fn index_template(names: &EsNames) -> Value {
    json!({
        "index_patterns": [names.index_pattern_with_version],
        "template": {
            "settings": {
                "number_of_shards": 1,
                "auto_expand_replicas": "0-1",
                "index.lifecycle.name": names.ilm_policy,
                "index.lifecycle.rollover_alias": names.alias,
                "index.hidden": true,
            },
            "mappings": mappings(),
        }
    })
}

/// 🗺️ Mappings for the fields evlog reads. Everything else rides along unindexed.
pub fn mappings() -> Value {
    let keyword = json!({"type": "keyword", "ignore_above": 1024});
    json!({
        "dynamic": false,
        "properties": {
            "@timestamp": {"type": "date"},
            "message": {"type": "text"},
            "tags": keyword,
            "event": {
                "properties": {
                    "action": keyword,
                    "provider": keyword,
                    "outcome": keyword,
                    "start": {"type": "date"},
                    "end": {"type": "date"},
                    "duration": {"type": "long"},
                }
            },
            "error": {
                "properties": {
                    "message": {"type": "text"},
                }
            },
            "event_log": {
                "properties": {
                    "version": {"type": "version"},
                    "owners": {
                        "type": "nested",
                        "properties": {
                            "rel": keyword,
                            "type": keyword,
                            "id": keyword,
                            "namespace": keyword,
                        }
                    }
                }
            }
        }
    })
}

/// 🚀 Body for the first backing index: attaches the write alias, hidden.
pub fn initial_index_body(names: &EsNames) -> Value {
    json!({
        "aliases": {
            names.alias.clone(): {
                "is_write_index": true,
                "is_hidden": true,
            }
        }
    })
}
