//! ✍️ The Event Logger: what producers actually hold.
//!
//! A thin, cloneable front for the buffer: it knows the write alias and the
//! product version, stamps both bookkeeping fields onto each event, and submits
//! it. `@timestamp` is only added when the producer didn't bring one.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::trace;

use crate::buffer::EventBuffer;
use crate::common::{EventRecord, OwnerReference};
use crate::schema::{OWNERS_OBJECT, TIMESTAMP_FIELD, VERSION_KEY};

#[derive(Debug, Clone)]
pub struct EventLogger {
    buffer: Arc<EventBuffer>,
    index: String,
    version: String,
}

impl EventLogger {
    pub fn new(buffer: Arc<EventBuffer>, index: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            buffer,
            index: index.into(),
            version: version.into(),
        }
    }

    /// 📛 Where events go: the write alias.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// 🔥 Fire and forget. Returns before the event is anywhere near the store.
    pub fn log_event(&self, mut body: Value) {
        if let Some(root) = body.as_object_mut() {
            root.entry(TIMESTAMP_FIELD)
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)));
            let event_log = root
                .entry(OWNERS_OBJECT)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(event_log) = event_log.as_object_mut() {
                event_log.insert(VERSION_KEY.to_owned(), Value::String(self.version.clone()));
            }
        }
        trace!("✍️ logging event into {}", self.index);
        self.buffer.submit(EventRecord::new(self.index.clone(), body));
    }

    /// 🔗 Attach owner references, then log.
    pub fn log_owned_event(&self, mut body: Value, owners: &[OwnerReference]) {
        for owner in owners {
            owner.attach_to(&mut body);
        }
        self.log_event(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryStore, StoreBackend};
    use crate::buffer::BufferConfig;
    use crate::client::ClientHandle;
    use crate::indexer::BatchIndexer;
    use crate::readiness::always_ready;
    use anyhow::Result;
    use serde_json::json;

    fn logger_over(store: &InMemoryStore) -> (Arc<EventBuffer>, EventLogger) {
        let client = ClientHandle::ready(StoreBackend::InMemory(store.clone()));
        let buffer = Arc::new(EventBuffer::start(
            BatchIndexer::new(client, always_ready()),
            &BufferConfig::default(),
        ));
        let logger = EventLogger::new(buffer.clone(), "events", "8.3.0");
        (buffer, logger)
    }

    #[tokio::test]
    async fn the_one_where_events_get_stamped_on_the_way_in() -> Result<()> {
        let store = InMemoryStore::new();
        let (buffer, logger) = logger_over(&store);
        logger.log_event(json!({"message": "hello"}));
        logger.log_event(json!({"message": "dated", "@timestamp": "2020-02-02T00:00:00.000Z"}));
        logger.log_owned_event(json!({"message": "owned"}), &[OwnerReference::primary("alert", "A")]);
        buffer.shutdown().await?;

        let documents = store.documents("events").await;
        assert_eq!(documents.len(), 3);
        let stamped = documents[0]["@timestamp"].as_str().unwrap_or_default();
        assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok(), "{stamped} is not RFC 3339");
        assert_eq!(documents[0]["event_log"]["version"], "8.3.0");
        assert_eq!(documents[1]["@timestamp"], "2020-02-02T00:00:00.000Z");
        assert_eq!(
            documents[2]["event_log"],
            json!({"owners": [{"rel": "primary", "type": "alert", "id": "A"}], "version": "8.3.0"})
        );
        Ok(())
    }
}
