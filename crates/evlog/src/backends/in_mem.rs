//! # Previously, on evlog...
//!
//! 🎬 Somebody wanted to test provisioning without a cluster. Somebody wanted
//! to test the buffer without Docker eating half their laptop. Somebody wanted
//! to run `evlog ingest` on a plane. This module is for all of them.
//!
//! [`InMemoryStore`] is a small Elasticsearch impersonator that lives behind an
//! `Arc<Mutex<...>>`. It keeps ILM policies, both flavours of templates, indices
//! with their settings, aliases and documents, and answers searches with the
//! query subset evlog generates (see [`matcher`]). It also remembers the most
//! recent bulk requests it was sent so tests can count them, and it can be told to fail a
//! named operation on demand, for the tests that need a bad day.
//!
//! ⚠️ This is NOT for production. Everything is gone when the process exits.
//! Hidden indices are not special here, wildcards match everything, and there
//! is no refresh interval. Just vibes and heap memory. 🦆

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::backends::{EventStore, SearchHit, SearchHits, SearchResponse, TotalHits};
use crate::bulk::{BulkItemResult, BulkOperation, BulkResponse};
use crate::error::BackendError;

pub(crate) mod matcher;

/// 📬 How many bulk requests are kept for inspection. Older ones are forgotten.
pub const RECORDED_BULK_REQUESTS: usize = 1000;

/// 🧠 A whole cluster's worth of state, minus the cluster.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    ilm_policies: BTreeMap<String, Value>,
    legacy_templates: BTreeMap<String, Value>,
    index_templates: BTreeMap<String, Value>,
    indices: BTreeMap<String, InMemoryIndex>,
    /// 📬 The last [`RECORDED_BULK_REQUESTS`] bulk requests, in arrival order.
    bulk_requests: VecDeque<Vec<BulkOperation>>,
    /// 💣 Operation names that answer 500 until healed.
    faults: BTreeSet<String>,
    next_id: u64,
}

#[derive(Debug, Default, Clone)]
struct InMemoryIndex {
    /// ⚙️ Normalised like `GET _settings` answers: `{"index": {"hidden": "true", ...}}`.
    settings: Map<String, Value>,
    aliases: Map<String, Value>,
    documents: Vec<Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📬 Recently received bulk requests, oldest first.
    pub async fn bulk_requests(&self) -> Vec<Vec<BulkOperation>> {
        self.state.lock().await.bulk_requests.iter().cloned().collect()
    }

    /// 📄 Documents stored in an index, or in whatever indices an alias points at.
    pub async fn documents(&self, index_or_alias: &str) -> Vec<Value> {
        let state = self.state.lock().await;
        state
            .read_targets(index_or_alias)
            .into_iter()
            .filter_map(|name| state.indices.get(&name))
            .flat_map(|index| index.documents.iter().cloned())
            .collect()
    }

    pub async fn ilm_policy(&self, name: &str) -> Option<Value> {
        self.state.lock().await.ilm_policies.get(name).cloned()
    }

    pub async fn index_template(&self, name: &str) -> Option<Value> {
        self.state.lock().await.index_templates.get(name).cloned()
    }

    pub async fn legacy_template(&self, name: &str) -> Option<Value> {
        self.state.lock().await.legacy_templates.get(name).cloned()
    }

    /// ⚙️ An index's settings, normalised the way `GET _settings` shows them.
    pub async fn index_settings(&self, name: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state
            .indices
            .get(name)
            .map(|index| Value::Object(index.settings.clone()))
    }

    pub async fn index_aliases(&self, name: &str) -> Option<Value> {
        let state = self.state.lock().await;
        state
            .indices
            .get(name)
            .map(|index| Value::Object(index.aliases.clone()))
    }

    /// 🌱 Plant a legacy template, the way an older release would have left one behind.
    pub async fn seed_legacy_template(&self, name: &str, template: Value) {
        let mut state = self.state.lock().await;
        let template = normalise_template(template);
        state.legacy_templates.insert(name.to_owned(), template);
    }

    /// 🌱 Plant an index with settings and aliases, bypassing templates.
    pub async fn seed_index(&self, name: &str, settings: Value, aliases: Value) {
        let mut state = self.state.lock().await;
        let mut index = InMemoryIndex::default();
        merge_settings(&mut index.settings, &settings);
        if let Value::Object(aliases) = aliases {
            index.aliases = aliases;
        }
        state.indices.insert(name.to_owned(), index);
    }

    /// 💣 Make `operation` (a trait method name such as `"bulk"`) answer 500 until healed.
    pub async fn fail_operation(&self, operation: &str) {
        self.state.lock().await.faults.insert(operation.to_owned());
    }

    pub async fn heal_operation(&self, operation: &str) {
        self.state.lock().await.faults.remove(operation);
    }
}

impl InMemoryState {
    fn check_fault(&self, operation: &str) -> Result<()> {
        if self.faults.contains(operation) {
            return Err(BackendError::new(
                500,
                "injected_fault",
                format!("{operation} was told to fail, and it listened"),
            )
            .into());
        }
        Ok(())
    }

    /// 🎯 Concrete indices a read request against `pattern` touches: names and aliases both count.
    fn read_targets(&self, pattern: &str) -> BTreeSet<String> {
        self.indices
            .iter()
            .filter(|(name, index)| {
                wildcard_match(pattern, name) || index.aliases.keys().any(|alias| wildcard_match(pattern, alias))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn matching_index_names(&self, pattern: &str) -> Vec<String> {
        self.indices
            .keys()
            .filter(|name| wildcard_match(pattern, name))
            .cloned()
            .collect()
    }

    /// ✍️ Where a write to `target` lands: the index itself, an alias's write index, or a fresh auto-created index.
    fn resolve_write_target(&mut self, target: &str) -> std::result::Result<String, Value> {
        if self.indices.contains_key(target) {
            return Ok(target.to_owned());
        }
        let mut write_index = None;
        let mut members = Vec::new();
        for (name, index) in &self.indices {
            if let Some(options) = index.aliases.get(target) {
                members.push(name.clone());
                if options.get("is_write_index").and_then(Value::as_bool) == Some(true) {
                    write_index = Some(name.clone());
                }
            }
        }
        match (write_index, members.as_slice()) {
            (Some(name), _) => Ok(name),
            (None, [only]) => Ok(only.clone()),
            (None, []) => {
                self.create_index_from_templates(target, &Value::Null);
                Ok(target.to_owned())
            }
            (None, _) => Err(json!({
                "type": "illegal_argument_exception",
                "reason": format!("no write index is defined for alias [{target}]"),
            })),
        }
    }

    /// 🏗️ Create an index, applying any composable template whose patterns match its name.
    fn create_index_from_templates(&mut self, name: &str, body: &Value) {
        let mut index = InMemoryIndex::default();
        for template in self.index_templates.values() {
            let patterns = template
                .get("index_patterns")
                .and_then(Value::as_array)
                .map(|patterns| patterns.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default();
            if patterns.iter().any(|pattern| wildcard_match(pattern, name)) {
                if let Some(settings) = template.pointer("/template/settings") {
                    merge_settings(&mut index.settings, settings);
                }
            }
        }
        if let Some(settings) = body.get("settings") {
            merge_settings(&mut index.settings, settings);
        }
        if let Some(Value::Object(aliases)) = body.get("aliases") {
            index.aliases = aliases.clone();
        }
        self.indices.insert(name.to_owned(), index);
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let mut state = self.state.lock().await;
        // -- the request "arrived" even if we are about to fail it
        if state.bulk_requests.len() == RECORDED_BULK_REQUESTS {
            state.bulk_requests.pop_front();
        }
        state.bulk_requests.push_back(operations.to_vec());
        state.check_fault("bulk")?;

        let mut response = BulkResponse::default();
        for operation in operations {
            let BulkOperation::Create { index, document } = operation;
            let result = match state.resolve_write_target(index) {
                Err(error) => BulkItemResult {
                    index: Some(index.clone()),
                    id: None,
                    status: 400,
                    error: Some(error),
                },
                Ok(_) if !document.is_object() => BulkItemResult {
                    index: Some(index.clone()),
                    id: None,
                    status: 400,
                    error: Some(json!({
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse, document is not an object",
                    })),
                },
                Ok(concrete) => {
                    state.next_id += 1;
                    let id = state.next_id.to_string();
                    if let Some(target) = state.indices.get_mut(&concrete) {
                        target.documents.push(document.clone());
                    }
                    BulkItemResult {
                        index: Some(concrete),
                        id: Some(id),
                        status: 201,
                        error: None,
                    }
                }
            };
            response.errors |= result.is_failure();
            response.items.push(BTreeMap::from([("create".to_owned(), result)]));
        }
        Ok(response)
    }

    async fn ilm_policy_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        state.check_fault("ilm_policy_exists")?;
        Ok(state.ilm_policies.contains_key(name))
    }

    async fn put_ilm_policy(&self, name: &str, policy: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("put_ilm_policy")?;
        state.ilm_policies.insert(name.to_owned(), policy.clone());
        Ok(())
    }

    async fn legacy_template_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        state.check_fault("legacy_template_exists")?;
        Ok(state.legacy_templates.contains_key(name))
    }

    async fn index_template_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        state.check_fault("index_template_exists")?;
        Ok(state.index_templates.contains_key(name))
    }

    async fn put_index_template(&self, name: &str, template: &Value, create_only: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("put_index_template")?;
        if create_only && state.index_templates.contains_key(name) {
            return Err(BackendError::new(
                400,
                "illegal_argument_exception",
                format!("index template [{name}] already exists"),
            )
            .into());
        }
        state.index_templates.insert(name.to_owned(), template.clone());
        Ok(())
    }

    async fn get_legacy_templates(&self, pattern: &str) -> Result<Map<String, Value>> {
        let state = self.state.lock().await;
        state.check_fault("get_legacy_templates")?;
        Ok(state
            .legacy_templates
            .iter()
            .filter(|(name, _)| wildcard_match(pattern, name))
            .map(|(name, template)| (name.clone(), template.clone()))
            .collect())
    }

    async fn put_legacy_template(&self, name: &str, template: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("put_legacy_template")?;
        let template = normalise_template(template.clone());
        state.legacy_templates.insert(name.to_owned(), template);
        Ok(())
    }

    async fn get_index_settings(&self, pattern: &str) -> Result<Map<String, Value>> {
        let state = self.state.lock().await;
        state.check_fault("get_index_settings")?;
        Ok(state
            .matching_index_names(pattern)
            .into_iter()
            .filter_map(|name| {
                let settings = state.indices.get(&name)?.settings.clone();
                Some((name, json!({ "settings": settings })))
            })
            .collect())
    }

    async fn put_index_settings(&self, index: &str, settings: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("put_index_settings")?;
        let Some(target) = state.indices.get_mut(index) else {
            return Err(index_not_found(index).into());
        };
        merge_settings(&mut target.settings, settings);
        Ok(())
    }

    async fn get_aliases(&self, pattern: &str) -> Result<Map<String, Value>> {
        let state = self.state.lock().await;
        state.check_fault("get_aliases")?;
        Ok(state
            .matching_index_names(pattern)
            .into_iter()
            .filter_map(|name| {
                let aliases = state.indices.get(&name)?.aliases.clone();
                Some((name, json!({ "aliases": aliases })))
            })
            .collect())
    }

    async fn update_aliases(&self, actions: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("update_aliases")?;
        let Some(actions) = actions.get("actions").and_then(Value::as_array) else {
            bail!(BackendError::new(400, "action_request_validation_exception", "no actions specified"));
        };
        for action in actions {
            let Some((kind, action_body)) = action.as_object().and_then(|a| a.iter().next()) else {
                bail!(BackendError::new(400, "parsing_exception", format!("malformed alias action {action}")));
            };
            let (Some(index), Some(alias)) = (
                action_body.get("index").and_then(Value::as_str),
                action_body.get("alias").and_then(Value::as_str),
            ) else {
                bail!(BackendError::new(400, "parsing_exception", format!("alias action needs index and alias: {action}")));
            };
            let Some(target) = state.indices.get_mut(index) else {
                return Err(index_not_found(index).into());
            };
            match kind.as_str() {
                "add" => {
                    let mut options = action_body.as_object().cloned().unwrap_or_default();
                    options.remove("index");
                    options.remove("alias");
                    target.aliases.insert(alias.to_owned(), Value::Object(options));
                }
                "remove" => {
                    target.aliases.remove(alias);
                }
                other => bail!(BackendError::new(
                    400,
                    "parsing_exception",
                    format!("the in-memory store does not do [{other}] alias actions"),
                )),
            }
        }
        Ok(())
    }

    async fn alias_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        state.check_fault("alias_exists")?;
        Ok(state
            .indices
            .values()
            .any(|index| index.aliases.keys().any(|alias| wildcard_match(name, alias))))
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("create_index")?;
        if state.indices.contains_key(name) {
            return Err(BackendError::new(
                400,
                "resource_already_exists_exception",
                format!("index [{name}] already exists"),
            )
            .into());
        }
        state.create_index_from_templates(name, body);
        Ok(())
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        let state = self.state.lock().await;
        state.check_fault("search")?;

        let query = body.get("query").cloned().unwrap_or_else(|| json!({"match_all": {}}));
        let mut matched = Vec::new();
        for name in state.read_targets(index) {
            let Some(target) = state.indices.get(&name) else { continue };
            for document in &target.documents {
                if matcher::matches(&query, document)? {
                    matched.push(document.clone());
                }
            }
        }
        matcher::sort_documents(&mut matched, body.get("sort"))?;

        let total = matched.len() as u64;
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let hits = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|source| SearchHit { source })
            .collect();
        Ok(SearchResponse {
            hits: SearchHits {
                total: Some(TotalHits::Object {
                    value: total,
                    relation: Some("eq".to_owned()),
                }),
                hits,
            },
        })
    }
}

fn index_not_found(index: &str) -> BackendError {
    BackendError::new(404, "index_not_found_exception", format!("no such index [{index}]"))
}

/// 🏚️ Legacy templates come back from `GET _template` with settings normalised; store them that way.
fn normalise_template(mut template: Value) -> Value {
    if let Some(settings) = template.get("settings").cloned() {
        let mut normalised = Map::new();
        merge_settings(&mut normalised, &settings);
        template["settings"] = Value::Object(normalised);
    }
    template
}

/// ⚙️ Fold `incoming` settings into `target`, ES style: dotted keys and nested objects land in
/// the same place under `index`, and scalars are stored as strings.
fn merge_settings(target: &mut Map<String, Value>, incoming: &Value) {
    let mut flat = Vec::new();
    flatten_settings(incoming, String::new(), &mut flat);
    for (key, value) in flat {
        let key = key.strip_prefix("index.").unwrap_or(&key).to_owned();
        let mut cursor = &mut *target;
        let mut segments = std::iter::once("index").chain(key.split('.')).peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                cursor.insert(segment.to_owned(), value);
                break;
            }
            let slot = cursor
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else { break };
            cursor = next;
        }
    }
}

fn flatten_settings(value: &Value, prefix: String, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(entries) => {
            for (key, child) in entries {
                let key = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                flatten_settings(child, key, out);
            }
        }
        Value::Null => {}
        Value::String(s) => out.push((prefix, Value::String(s.clone()))),
        scalar => out.push((prefix, Value::String(scalar.to_string()))),
    }
}

/// 🃏 `*` wildcards and comma-separated lists, which is all index patterns ever ask of us.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    pattern
        .split(',')
        .map(str::trim)
        .any(|part| glob(part.as_bytes(), text.as_bytes()))
}

fn glob(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(s) = star {
            // -- backtrack: let the last star swallow one more byte
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&b| b == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    #[test]
    fn the_one_where_wildcards_behave_like_index_patterns() {
        assert!(wildcard_match("evlog-event-log-*", "evlog-event-log-8.0.0-000001"));
        assert!(wildcard_match("a,evlog-*", "evlog-x"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("evlog-event-log-*", "other-event-log-1"));
        assert!(!wildcard_match("abc", "abcd"));
    }

    #[test]
    fn the_one_where_dotted_and_nested_settings_land_in_the_same_place() {
        let mut settings = Map::new();
        merge_settings(&mut settings, &json!({"index.hidden": true, "number_of_shards": 1}));
        merge_settings(&mut settings, &json!({"index": {"lifecycle": {"name": "p"}}}));
        assert_eq!(
            Value::Object(settings),
            json!({"index": {"hidden": "true", "number_of_shards": "1", "lifecycle": {"name": "p"}}})
        );
    }

    #[tokio::test]
    async fn the_one_where_bulk_writes_through_the_alias_to_the_write_index() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .create_index("events-000001", &json!({"aliases": {"events": {"is_write_index": true}}}))
            .await?;
        let response = store
            .bulk(&[
                BulkOperation::create("events", json!({"n": 1})),
                BulkOperation::create("events", json!("not an object")),
            ])
            .await?;
        assert!(response.errors);
        assert_eq!(response.succeeded(), 1);
        assert_eq!(response.items[0]["create"].index.as_deref(), Some("events-000001"));
        assert_eq!(store.documents("events-000001").await, vec![json!({"n": 1})]);
        assert_eq!(store.documents("events").await, vec![json!({"n": 1})]);
        assert_eq!(store.bulk_requests().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_create_only_templates_and_indices_refuse_twins() -> Result<()> {
        let store = InMemoryStore::new();
        store.put_index_template("t", &json!({}), true).await?;
        let err = store.put_index_template("t", &json!({}), true).await.unwrap_err();
        assert_eq!(BackendError::find_in(&err).map(|e| e.status), Some(400));
        store.put_index_template("t", &json!({"v": 2}), false).await?;

        store.create_index("i", &json!({})).await?;
        let err = store.create_index("i", &json!({})).await.unwrap_err();
        assert!(BackendError::find_in(&err).is_some_and(|e| e.is_type("resource_already_exists_exception")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_new_indices_inherit_matching_templates() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .put_index_template(
                "t",
                &json!({"index_patterns": ["logs-*"], "template": {"settings": {"index.hidden": true}}}),
                false,
            )
            .await?;
        store.create_index("logs-1", &json!({})).await?;
        store.create_index("other", &json!({})).await?;
        assert_eq!(store.index_settings("logs-1").await, Some(json!({"index": {"hidden": "true"}})));
        assert_eq!(store.index_settings("other").await, Some(json!({})));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_alias_actions_add_and_remove() -> Result<()> {
        let store = InMemoryStore::new();
        store.create_index("i", &json!({})).await?;
        store
            .update_aliases(&json!({"actions": [{"add": {"index": "i", "alias": "a", "is_hidden": true}}]}))
            .await?;
        assert!(store.alias_exists("a").await?);
        assert_eq!(store.index_aliases("i").await, Some(json!({"a": {"is_hidden": true}})));
        store
            .update_aliases(&json!({"actions": [{"remove": {"index": "i", "alias": "a"}}]}))
            .await?;
        assert!(!store.alias_exists("a").await?);

        let err = store
            .update_aliases(&json!({"actions": [{"add": {"index": "ghost", "alias": "a"}}]}))
            .await
            .unwrap_err();
        assert!(BackendError::find_in(&err).is_some_and(BackendError::is_not_found));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_search_pages_and_counts_everything() -> Result<()> {
        let store = InMemoryStore::new();
        let operations: Vec<_> = (1..=5)
            .map(|n| BulkOperation::create("idx", json!({"n": n, "even": n % 2 == 0})))
            .collect();
        store.bulk(&operations).await?;

        let response = store
            .search(
                "idx",
                &json!({
                    "query": {"bool": {"filter": [{"term": {"even": false}}]}},
                    "sort": [{"n": {"order": "desc"}}],
                    "from": 1,
                    "size": 1,
                }),
            )
            .await?;
        assert_eq!(response.total(), 3);
        assert_eq!(response.into_sources(), vec![json!({"n": 3, "even": false})]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_fault_can_be_injected_and_healed() -> Result<()> {
        let store = InMemoryStore::new();
        store.fail_operation("bulk").await;
        let err = store.bulk(&[BulkOperation::create("i", json!({}))]).await.unwrap_err();
        assert_eq!(BackendError::find_in(&err).map(|e| e.status), Some(500));
        // -- the failed attempt still counts as received
        assert_eq!(store.bulk_requests().await.len(), 1);
        store.heal_operation("bulk").await;
        assert!(!store.bulk(&[BulkOperation::create("i", json!({}))]).await?.errors);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_request_log_forgets_the_oldest() -> Result<()> {
        let store = InMemoryStore::new();
        for n in 0..=RECORDED_BULK_REQUESTS {
            store.bulk(&[BulkOperation::create("i", json!({ "n": n }))]).await?;
        }
        let requests = store.bulk_requests().await;
        assert_eq!(requests.len(), RECORDED_BULK_REQUESTS);
        let BulkOperation::Create { document, .. } = &requests[0][0];
        assert_eq!(document["n"], 1);
        // -- documents are the store's job, not the log's
        assert_eq!(store.documents("i").await.len(), RECORDED_BULK_REQUESTS + 1);
        Ok(())
    }
}
