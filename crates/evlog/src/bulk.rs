//! 📡 Bulk wire format: the `_bulk` API's peculiar tastes, formalised.
//!
//! Rule 1: two lines per document. Action directive, then source. Always.
//! Rule 2: newline-delimited. Not comma-separated. Not XML. NEWLINES.
//! Rule 3: the trailing newline on the whole body matters. It MATTERS.
//!
//! evlog only ever sends `create` directives: events are append-only, and a
//! duplicate id should fail that one item, not overwrite history.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

/// 📦 One entry of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// 🆕 Create a document in `index`; fails per-item if the id already exists.
    Create { index: String, document: Value },
}

impl BulkOperation {
    pub fn create(index: impl Into<String>, document: Value) -> Self {
        Self::Create {
            index: index.into(),
            document,
        }
    }

    pub fn index(&self) -> &str {
        match self {
            Self::Create { index, .. } => index,
        }
    }

    pub fn document(&self) -> &Value {
        match self {
            Self::Create { document, .. } => document,
        }
    }

    fn directive(&self) -> Value {
        match self {
            Self::Create { index, .. } => json!({ "create": { "_index": index } }),
        }
    }
}

/// 🧮 Render operations into an NDJSON `_bulk` body, trailing newline included.
pub fn render_bulk_body(operations: &[BulkOperation]) -> Result<String> {
    // -- 256 bytes per op up front: a vibes-based allocation. the allocator has seen worse.
    let mut body = String::with_capacity(operations.len() * 256);
    for operation in operations {
        let directive = serde_json::to_string(&operation.directive())
            .context("💀 Failed to serialize a bulk directive. The JSON that describes JSON has failed to become JSON.")?;
        let source = serde_json::to_string(operation.document())
            .context("💀 Failed to serialize an event body for the bulk request.")?;
        body.reserve(directive.len() + source.len() + 2);
        body.push_str(&directive);
        body.push('\n');
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// 📬 What `_bulk` says back. `errors` is the "did anything go wrong" flag; `items` has the gossip.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    /// 🧾 One entry per operation, keyed by action name (`create`).
    #[serde(default)]
    pub items: Vec<BTreeMap<String, BulkItemResult>>,
}

/// 🧾 The verdict on a single bulk item.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BulkItemResult {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

impl BulkItemResult {
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }

    /// 🔍 `"<type>: <reason>"` for logs, whatever shape the error came in.
    pub fn describe_error(&self) -> String {
        match &self.error {
            Some(Value::Object(error)) => format!(
                "{}: {}",
                error.get("type").and_then(Value::as_str).unwrap_or("unknown_error"),
                error.get("reason").and_then(Value::as_str).unwrap_or("no reason given")
            ),
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        }
    }
}

impl BulkResponse {
    /// 💀 Items that didn't make it, with their action name.
    pub fn failed_items(&self) -> impl Iterator<Item = (&str, &BulkItemResult)> {
        self.items.iter().flat_map(|item| {
            item.iter()
                .filter(|(_, result)| result.is_failure())
                .map(|(action, result)| (action.as_str(), result))
        })
    }

    pub fn succeeded(&self) -> usize {
        self.items
            .iter()
            .flat_map(|item| item.values())
            .filter(|result| !result.is_failure())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_each_event_becomes_a_sacred_pair_of_lines() -> Result<()> {
        let operations = vec![
            BulkOperation::create("events-a", json!({"n": 1})),
            BulkOperation::create("events-b", json!({"n": 2})),
        ];
        let body = render_bulk_body(&operations)?;
        assert_eq!(
            body,
            "{\"create\":{\"_index\":\"events-a\"}}\n{\"n\":1}\n{\"create\":{\"_index\":\"events-b\"}}\n{\"n\":2}\n"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_nothing_renders_to_nothing() -> Result<()> {
        assert_eq!(render_bulk_body(&[])?, "");
        Ok(())
    }

    #[test]
    fn the_one_where_partial_failures_are_picked_out_of_the_lineup() -> Result<()> {
        let response: BulkResponse = serde_json::from_value(json!({
            "took": 3,
            "errors": true,
            "items": [
                {"create": {"_index": "events", "_id": "1", "status": 201}},
                {"create": {"_index": "events", "_id": "2", "status": 409,
                    "error": {"type": "version_conflict_engine_exception", "reason": "document already exists"}}}
            ]
        }))?;
        assert!(response.errors);
        assert_eq!(response.succeeded(), 1);
        let failed: Vec<_> = response.failed_items().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "create");
        assert_eq!(failed[0].1.id.as_deref(), Some("2"));
        assert_eq!(
            failed[0].1.describe_error(),
            "version_conflict_engine_exception: document already exists"
        );
        Ok(())
    }
}
