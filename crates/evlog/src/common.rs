//! 📦 Common data structures: the building blocks of evlog.
//!
//! 🎬 COLD OPEN. INT. SOMEWHERE IN A PRODUCER, 3:47 AM
//!
//! A rule fires. An action runs. A connector fails spectacularly. Each of them,
//! in its final moments, emits an event, hands it to us, and goes back to work
//! without waiting for an answer. That's the deal. We take the event, we carry it,
//! and eventually it lands in an index where someone will search for it at 3:48 AM.
//!
//! This module defines what gets carried: an [`EventRecord`] (one document, one
//! destination), an [`EventBatch`] (what the buffer hands the indexer), and an
//! [`OwnerReference`] (the tag that says which entity an event belongs to). 🦆

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{OWNERS_FIELD, OWNERS_OBJECT, REL_PRIMARY};

/// 🎯 One event, one destination, zero take-backs.
///
/// The body is an opaque JSON document. The pipeline never looks inside it,
/// never mutates it, and never asks how its day was. `index` names the target
/// index or alias.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub index: String,
    pub body: Value,
}

impl EventRecord {
    pub fn new(index: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            body,
        }
    }
}

/// 📦 An `EventBatch`: because one event is never enough.
///
/// Only ever built by the buffer at flush time, never empty when it leaves the
/// buffer, and gone as soon as the indexer returns. Records keep their arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    pub records: Vec<EventRecord>,
}

impl EventBatch {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 🔗 The tag that ties an event to the entity it belongs to.
///
/// Stored under the nested `event_log.owners` field. The query gateway joins on
/// `rel == "primary"`, the owner type, the owner id, and (optionally) the namespace.
/// No namespace means "default namespace", which on the wire means the field is
/// absent, not null. ES cares about the difference. So do we.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerReference {
    pub rel: String,
    #[serde(rename = "type")]
    pub owner_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl OwnerReference {
    /// 🎯 A primary owner reference in the default namespace.
    pub fn primary(owner_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            rel: REL_PRIMARY.to_owned(),
            owner_type: owner_type.into(),
            id: id.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// 📎 Append this reference to `event_log.owners` on an event body.
    ///
    /// Creates the `event_log` object and the `owners` array if they're missing.
    /// Non-object bodies are left alone; there's nowhere sensible to staple a tag.
    pub fn attach_to(&self, body: &mut Value) {
        let Some(root) = body.as_object_mut() else {
            return;
        };
        let event_log = root
            .entry(OWNERS_OBJECT)
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(event_log) = event_log.as_object_mut() else {
            return;
        };
        let owners = event_log
            .entry(OWNERS_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(owners) = owners {
            // -- serializing a struct of Strings can't fail; Null is the unreachable fallback
            owners.push(serde_json::to_value(self).unwrap_or(Value::Null));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_owners_get_stapled_onto_a_bare_event() {
        let mut body = json!({"event": {"action": "execute"}});
        OwnerReference::primary("alert", "abc").attach_to(&mut body);
        OwnerReference::primary("action", "def")
            .in_namespace("space-1")
            .attach_to(&mut body);

        assert_eq!(
            body["event_log"]["owners"],
            json!([
                {"rel": "primary", "type": "alert", "id": "abc"},
                {"rel": "primary", "type": "action", "id": "def", "namespace": "space-1"}
            ])
        );
        // ✅ the original payload is untouched
        assert_eq!(body["event"]["action"], "execute");
    }

    #[test]
    fn the_one_where_a_non_object_body_is_politely_ignored() {
        let mut body = json!("just a string, no room for owners");
        OwnerReference::primary("alert", "abc").attach_to(&mut body);
        assert_eq!(body, json!("just a string, no room for owners"));
    }

    #[test]
    fn the_one_where_batches_know_their_size() {
        let batch = EventBatch::new(vec![
            EventRecord::new("idx", json!({"n": 1})),
            EventRecord::new("idx", json!({"n": 2})),
        ]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(EventBatch::default().is_empty());
    }
}
