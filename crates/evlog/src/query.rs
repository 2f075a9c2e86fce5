//! 🔎 The Query Gateway: the read side of the event log.
//!
//! One question, asked a lot: "what happened to *this* thing?" Events point at
//! the entities they belong to through nested owner references, and owners
//! changed ids once (events written before [`LEGACY_ID_CUTOFF_VERSION`] know them
//! by their legacy ids). So an owner query matches either
//!
//! - a current id on an event written at or after the cutoff version, or
//! - a legacy id on an event written before it, or with no version at all.
//!
//! The query body is built by [`build_owner_query`], which is pure and easy to
//! test. [`QueryGateway`] translates the filter, runs the search and turns the
//! answer into a [`QueryResult`] page.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::backends::EventStore;
use crate::client::ClientHandle;
use crate::error::EventLogError;
use crate::filter::{FilterTranslator, QueryStringTranslator};
use crate::schema::{
    LEGACY_ID_CUTOFF_VERSION, OWNER_ID_FIELD, OWNER_NAMESPACE_FIELD, OWNER_REL_FIELD, OWNER_TYPE_FIELD, OWNERS_PATH,
    REL_PRIMARY, TIMESTAMP_FIELD, VERSION_FIELD,
};

/// ↕️ Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// 📐 Paging, time bounds, sort and filter for one owner query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    /// 1-based.
    pub page: u64,
    pub per_page: u64,
    /// ⏱️ Inclusive lower bound on `@timestamp`.
    pub start: Option<String>,
    /// ⏱️ Inclusive upper bound on `@timestamp`.
    pub end: Option<String>,
    pub sort_field: String,
    pub sort_order: SortOrder,
    /// 🔍 Free-text filter expression, handed to the [`FilterTranslator`].
    pub filter: Option<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            start: None,
            end: None,
            sort_field: TIMESTAMP_FIELD.to_owned(),
            sort_order: SortOrder::Asc,
            filter: None,
        }
    }
}

/// 🎯 Who we're asking about, and where to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerQuery {
    /// 📛 Index, alias or pattern to search.
    pub index: String,
    /// `None` means the default namespace: owner references with no namespace field.
    pub namespace: Option<String>,
    pub owner_type: String,
    pub ids: Vec<String>,
    /// 🏚️ Ids that only match events written before the cutoff version.
    pub legacy_ids: Vec<String>,
    pub find_options: FindOptions,
}

impl OwnerQuery {
    pub fn new(index: impl Into<String>, owner_type: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            index: index.into(),
            namespace: None,
            owner_type: owner_type.into(),
            ids,
            legacy_ids: Vec::new(),
            find_options: FindOptions::default(),
        }
    }
}

/// 📄 One page of matching events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub page: u64,
    pub per_page: u64,
    /// 🔢 Exact count of all matches, not just this page.
    pub total: u64,
    pub data: Vec<Value>,
}

/// An empty or all-whitespace option counts as not given.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// 🧮 Build the search body for an owner query. `filter` is the already-translated filter clause, if any.
pub fn build_owner_query(query: &OwnerQuery, filter: Option<Value>) -> Result<Value> {
    let options = &query.find_options;
    if options.page == 0 {
        return Err(EventLogError::InvalidFindOptions("page numbers start at 1".to_owned()).into());
    }
    if options.sort_field.trim().is_empty() {
        return Err(EventLogError::InvalidFindOptions("sort field must not be empty".to_owned()).into());
    }
    let Some(from) = (options.page - 1).checked_mul(options.per_page) else {
        return Err(EventLogError::InvalidFindOptions(format!(
            "page {} with {} per page is past the end of anything searchable",
            options.page, options.per_page
        ))
        .into());
    };

    let namespace_clause = match &query.namespace {
        None => json!({ "bool": { "must_not": { "exists": { "field": OWNER_NAMESPACE_FIELD } } } }),
        Some(namespace) => json!({ "term": { OWNER_NAMESPACE_FIELD: { "value": namespace } } }),
    };
    let owner_clause = json!({
        "nested": {
            "path": OWNERS_PATH,
            "query": {
                "bool": {
                    "must": [
                        { "term": { OWNER_REL_FIELD: { "value": REL_PRIMARY } } },
                        { "term": { OWNER_TYPE_FIELD: { "value": query.owner_type } } },
                        namespace_clause,
                    ]
                }
            }
        }
    });

    let ids_clause = |ids: &[String]| {
        json!({ "nested": { "path": OWNERS_PATH, "query": { "terms": { OWNER_ID_FIELD: ids } } } })
    };
    let mut id_branches = vec![json!({
        "bool": {
            "must": [
                ids_clause(&query.ids),
                { "range": { VERSION_FIELD: { "gte": LEGACY_ID_CUTOFF_VERSION } } },
            ]
        }
    })];
    if !query.legacy_ids.is_empty() {
        id_branches.push(json!({
            "bool": {
                "must": [
                    ids_clause(&query.legacy_ids),
                    {
                        "bool": {
                            "should": [
                                { "range": { VERSION_FIELD: { "lt": LEGACY_ID_CUTOFF_VERSION } } },
                                { "bool": { "must_not": { "exists": { "field": VERSION_FIELD } } } },
                            ]
                        }
                    },
                ]
            }
        }));
    }

    let mut must = vec![owner_clause, json!({ "bool": { "should": id_branches } })];
    if let Some(start) = present(&options.start) {
        must.push(json!({ "range": { TIMESTAMP_FIELD: { "gte": start } } }));
    }
    if let Some(end) = present(&options.end) {
        must.push(json!({ "range": { TIMESTAMP_FIELD: { "lte": end } } }));
    }

    let filter = match filter {
        Some(clause) => Value::Array(vec![clause]),
        None => json!([]),
    };
    Ok(json!({
        "size": options.per_page,
        "from": from,
        "sort": [ { options.sort_field.clone(): { "order": options.sort_order.as_str() } } ],
        "track_total_hits": true,
        "query": {
            "bool": {
                "filter": filter,
                "must": must,
            }
        }
    }))
}

/// 🔎 Runs owner queries against the store.
#[derive(Debug, Clone)]
pub struct QueryGateway {
    client: ClientHandle,
    translator: Arc<dyn FilterTranslator>,
}

impl QueryGateway {
    pub fn new(client: ClientHandle, translator: Arc<dyn FilterTranslator>) -> Self {
        Self { client, translator }
    }

    /// 🔎 A gateway using [`QueryStringTranslator`] for filters.
    pub fn with_query_string_filters(client: ClientHandle) -> Self {
        Self::new(client, Arc::new(QueryStringTranslator))
    }

    /// 🔎 One page of events owned by `query.owner_type` / `query.ids`.
    pub async fn query_by_owner(&self, query: &OwnerQuery) -> Result<QueryResult> {
        let filter = match present(&query.find_options.filter) {
            None => None,
            Some(expression) => match self.translator.translate(expression) {
                Ok(clause) => Some(clause),
                Err(err) => {
                    debug!(
                        "🔍 invalid filter expression {expression:?}: {} (status {})",
                        err.message, err.status_code
                    );
                    return Err(EventLogError::InvalidFilter {
                        filter: expression.to_owned(),
                        message: err.message,
                    }
                    .into());
                }
            },
        };
        let body = build_owner_query(query, filter)?;

        let searched = async {
            let store = self.client.get().await?;
            store.search(&query.index, &body).await
        }
        .await;
        let response = searched.map_err(|source| EventLogError::QueryFailed {
            owner_type: query.owner_type.clone(),
            ids: query.ids.clone(),
            source,
        })?;

        let options = &query.find_options;
        Ok(QueryResult {
            page: options.page,
            per_page: options.per_page,
            total: response.total(),
            data: response.into_sources(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemoryStore, StoreBackend};
    use crate::bulk::BulkOperation;
    use crate::common::OwnerReference;
    use crate::filter::FilterSyntaxError;

    fn event(owner_id: &str, version: Option<&str>, timestamp: &str) -> Value {
        let mut body = json!({ "@timestamp": timestamp, "message": format!("event for {owner_id}") });
        OwnerReference::primary("alert", owner_id).attach_to(&mut body);
        if let Some(version) = version {
            body["event_log"]["version"] = json!(version);
        }
        body
    }

    async fn gateway_with(events: Vec<Value>) -> Result<(InMemoryStore, QueryGateway)> {
        let store = InMemoryStore::new();
        let operations: Vec<_> = events.into_iter().map(|e| BulkOperation::create("events", e)).collect();
        store.bulk(&operations).await?;
        let client = ClientHandle::ready(StoreBackend::InMemory(store.clone()));
        Ok((store, QueryGateway::with_query_string_filters(client)))
    }

    fn owner_query(ids: &[&str], legacy_ids: &[&str]) -> OwnerQuery {
        let mut query = OwnerQuery::new("events", "alert", ids.iter().map(|id| id.to_string()).collect());
        query.legacy_ids = legacy_ids.iter().map(|id| id.to_string()).collect();
        query
    }

    #[test]
    fn the_one_where_page_three_starts_at_forty() -> Result<()> {
        let mut query = owner_query(&["A"], &[]);
        query.find_options.page = 3;
        query.find_options.per_page = 20;
        query.find_options.sort_order = SortOrder::Desc;
        let body = build_owner_query(&query, None)?;
        assert_eq!(body["from"], 40);
        assert_eq!(body["size"], 20);
        assert_eq!(body["track_total_hits"], true);
        assert_eq!(body["sort"], json!([{"@timestamp": {"order": "desc"}}]));
        assert_eq!(body["query"]["bool"]["filter"], json!([]));
        Ok(())
    }

    #[test]
    fn the_one_where_page_zero_is_not_a_page() {
        let mut query = owner_query(&["A"], &[]);
        query.find_options.page = 0;
        let err = build_owner_query(&query, None).unwrap_err();
        assert!(matches!(EventLogError::find_in(&err), Some(EventLogError::InvalidFindOptions(_))));
    }

    #[test]
    fn the_one_where_a_page_past_u64_is_refused_not_wrapped() {
        let mut query = owner_query(&["A"], &[]);
        query.find_options.page = u64::MAX;
        query.find_options.per_page = 20;
        let err = build_owner_query(&query, None).unwrap_err();
        assert!(matches!(EventLogError::find_in(&err), Some(EventLogError::InvalidFindOptions(_))));
    }

    #[test]
    fn the_one_where_blank_time_bounds_are_no_bounds_at_all() -> Result<()> {
        let mut query = owner_query(&["A"], &[]);
        query.find_options.start = Some(String::new());
        query.find_options.end = Some("   ".to_owned());
        let body = build_owner_query(&query, None)?;
        assert_eq!(body["query"]["bool"]["must"].as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[test]
    fn the_one_where_the_namespace_clause_is_one_or_the_other() -> Result<()> {
        let default_ns = build_owner_query(&owner_query(&["A"], &[]), None)?;
        let clauses = &default_ns["query"]["bool"]["must"][0]["nested"]["query"]["bool"]["must"];
        assert_eq!(
            clauses[2],
            json!({"bool": {"must_not": {"exists": {"field": "event_log.owners.namespace"}}}})
        );

        let mut query = owner_query(&["A"], &[]);
        query.namespace = Some("space-1".to_owned());
        let custom_ns = build_owner_query(&query, None)?;
        let clauses = &custom_ns["query"]["bool"]["must"][0]["nested"]["query"]["bool"]["must"];
        assert_eq!(clauses[2], json!({"term": {"event_log.owners.namespace": {"value": "space-1"}}}));
        Ok(())
    }

    #[test]
    fn the_one_where_the_legacy_branch_only_shows_up_when_invited() -> Result<()> {
        let without = build_owner_query(&owner_query(&["A"], &[]), None)?;
        assert_eq!(without["query"]["bool"]["must"][1]["bool"]["should"].as_array().map(Vec::len), Some(1));
        let with = build_owner_query(&owner_query(&["A"], &["L"]), None)?;
        assert_eq!(with["query"]["bool"]["must"][1]["bool"]["should"].as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_current_ids_only_match_current_events() -> Result<()> {
        let (_store, gateway) = gateway_with(vec![event("A", Some("8.1.0"), "2024-01-01T00:00:00.000Z")]).await?;

        let found = gateway.query_by_owner(&owner_query(&["A"], &[])).await?;
        assert_eq!(found.total, 1);
        assert_eq!(found.data.len(), 1);

        // -- a legacy id on an 8.1.0 event is not a match
        let legacy_only = gateway.query_by_owner(&owner_query(&[], &["A"])).await?;
        assert_eq!(legacy_only.total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_legacy_ids_find_old_and_unversioned_events() -> Result<()> {
        let (_store, gateway) = gateway_with(vec![
            event("A", Some("7.10.0"), "2021-01-01T00:00:00.000Z"),
            event("A", None, "2020-01-01T00:00:00.000Z"),
            event("A", Some("8.0.0"), "2022-01-01T00:00:00.000Z"),
        ])
        .await?;

        let legacy = gateway.query_by_owner(&owner_query(&[], &["A"])).await?;
        assert_eq!(legacy.total, 2);
        assert_eq!(legacy.data[0]["@timestamp"], "2020-01-01T00:00:00.000Z");

        // -- both branches at once: every event once, none twice
        let both = gateway.query_by_owner(&owner_query(&["A"], &["A"])).await?;
        assert_eq!(both.total, 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_total_counts_everything_but_data_is_one_page() -> Result<()> {
        let events = (0..25)
            .map(|n| event("A", Some("8.1.0"), &format!("2024-01-01T00:00:{n:02}.000Z")))
            .collect();
        let (_store, gateway) = gateway_with(events).await?;

        let mut query = owner_query(&["A"], &[]);
        query.find_options.page = 3;
        query.find_options.per_page = 10;
        let page = gateway.query_by_owner(&query).await?;
        assert_eq!(page.total, 25);
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.data[0]["@timestamp"], "2024-01-01T00:00:20.000Z");

        query.find_options.page = 1;
        query.find_options.start = Some("2024-01-01T00:00:05.000Z".to_owned());
        query.find_options.end = Some("2024-01-01T00:00:09.000Z".to_owned());
        let bounded = gateway.query_by_owner(&query).await?;
        assert_eq!(bounded.total, 5);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_other_owners_and_namespaces_stay_out_of_it() -> Result<()> {
        let mut namespaced = event("A", Some("8.1.0"), "2024-01-01T00:00:00.000Z");
        namespaced["event_log"]["owners"][0]["namespace"] = json!("space-1");
        let mut wrong_type = json!({ "@timestamp": "2024-01-01T00:00:00.000Z" });
        OwnerReference::primary("rule", "A").attach_to(&mut wrong_type);
        wrong_type["event_log"]["version"] = json!("8.1.0");

        let (_store, gateway) = gateway_with(vec![namespaced, wrong_type]).await?;
        assert_eq!(gateway.query_by_owner(&owner_query(&["A"], &[])).await?.total, 0);

        let mut query = owner_query(&["A"], &[]);
        query.namespace = Some("space-1".to_owned());
        assert_eq!(gateway.query_by_owner(&query).await?.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_blank_options_are_treated_as_missing() -> Result<()> {
        let (_store, gateway) = gateway_with(vec![event("A", Some("8.1.0"), "2024-01-01T00:00:00.000Z")]).await?;

        let mut query = owner_query(&["A"], &[]);
        query.find_options.filter = Some(String::new());
        assert_eq!(gateway.query_by_owner(&query).await?.total, 1);

        query.find_options.filter = None;
        query.find_options.start = Some(String::new());
        assert_eq!(gateway.query_by_owner(&query).await?.total, 1);

        query.find_options.start = None;
        query.find_options.end = Some(" ".to_owned());
        assert_eq!(gateway.query_by_owner(&query).await?.total, 1);
        Ok(())
    }

    #[derive(Debug)]
    struct GrumpyTranslator;

    impl FilterTranslator for GrumpyTranslator {
        fn translate(&self, _expression: &str) -> Result<Value, FilterSyntaxError> {
            Err(FilterSyntaxError::new("I don't like it"))
        }
    }

    #[tokio::test]
    async fn the_one_where_a_bad_filter_is_the_callers_problem() -> Result<()> {
        let store = InMemoryStore::new();
        let gateway = QueryGateway::new(
            ClientHandle::ready(StoreBackend::InMemory(store.clone())),
            Arc::new(GrumpyTranslator),
        );
        let mut query = owner_query(&["A"], &[]);
        query.find_options.filter = Some("anything".to_owned());
        let err = gateway.query_by_owner(&query).await.unwrap_err();
        match EventLogError::find_in(&err) {
            Some(EventLogError::InvalidFilter { filter, message }) => {
                assert_eq!(filter, "anything");
                assert_eq!(message, "I don't like it");
            }
            honestly_who_knows => panic!("💀 expected an invalid filter error, got {honestly_who_knows:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_failed_search_names_the_owner() -> Result<()> {
        let (store, gateway) = gateway_with(vec![]).await?;
        store.fail_operation("search").await;
        let err = gateway.query_by_owner(&owner_query(&["A", "B"], &[])).await.unwrap_err();
        match EventLogError::find_in(&err) {
            Some(EventLogError::QueryFailed { owner_type, ids, .. }) => {
                assert_eq!(owner_type, "alert");
                assert_eq!(ids, &vec!["A".to_owned(), "B".to_owned()]);
            }
            honestly_who_knows => panic!("💀 expected a query failure, got {honestly_who_knows:?}"),
        }
        assert_eq!(err.to_string(), "💀 querying for events by type \"alert\" and ids [\"A\", \"B\"] failed");
        Ok(())
    }
}
