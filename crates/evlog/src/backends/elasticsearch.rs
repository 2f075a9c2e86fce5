//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN. INT. SERVER ROOM, 3:47 AM
//!
//! The monitoring dashboard glows amber in the dark. A cluster, somewhere, is
//! yellow. Not red. Yellow. Which is worse, because nobody knows whether to panic.
//! Meanwhile a thousand producers keep emitting events as if nothing happened,
//! because for them, nothing did. They called `submit` and went home.
//!
//! 🚀 This module is the only place evlog speaks HTTP. It is equal parts
//! `reqwest` client, `_bulk` API whisperer, template provisioner, and search
//! courier. It does not retry. It does not buffer. It sends, it reads the answer,
//! and it turns every non-2xx into a [`BackendError`] with the status and the
//! error type intact, so the caller can decide whether "already exists" is a
//! tragedy or a Tuesday.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::backends::{EventStore, SearchResponse};
use crate::bulk::{BulkOperation, BulkResponse, render_bulk_body};
use crate::error::BackendError;

/// 📡 ElasticsearchConfig: "It's just Elasticsearch", she said, before the cluster went yellow.
///
/// 🔧 auth is tri-modal: api_key, username+password, or "I hope anonymous works".
/// API key wins when both are set. This is not a democracy.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    /// 📡 Cluster URL, scheme and port included. Yes, all of it.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 If this is in plaintext in your config file, consider `EVLOG_BACKEND__ELASTICSEARCH__PASSWORD`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// -- if ES can't handshake in 10 seconds, it's not having a good time and neither are we
fn default_connect_timeout_secs() -> u64 {
    10
}

// -- bulk requests can be meaty and we're not monsters
fn default_request_timeout_secs() -> u64 {
    30
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 📡 The HTTP-speaking store. Cheap to clone: `reqwest::Client` is an `Arc` inside.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchStore {
    /// 🚀 Build the client and ping the cluster root, so a bad URL fails here
    /// and not 50,000 events later.
    pub async fn new(config: ElasticsearchConfig) -> Result<Self> {
        let store = Self::build(config)?;
        store.ping().await?;
        Ok(store)
    }

    /// 🏗️ Build the client without talking to anyone.
    pub fn build(config: ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;
        Ok(Self { client, config })
    }

    /// 📡 "Hello? Is this thing on?", a developer, gesturing at a cluster.
    async fn ping(&self) -> Result<()> {
        self.call(Method::GET, self.url(&[])?, None).await.with_context(|| {
            format!(
                "💀 Elasticsearch at '{}' did not answer the ping. Check the URL, the credentials, and whether the cluster is actually running.",
                self.config.url
            )
        })?;
        debug!("✅ Elasticsearch at {} is home and answering the door", self.config.url);
        Ok(())
    }

    /// 🧭 The cluster URL with `segments` appended, each one percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.url)
            .with_context(|| format!("💀 '{}' is not a URL Elasticsearch could live at", self.config.url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("💀 '{}' can't have a path appended to it", self.config.url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        // 🔒 api_key beats basic auth in this club
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {api_key}"))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response> {
        let target = url.path().to_owned();
        let mut request = self.request(method.clone(), url);
        if let Some(body) = body {
            let payload = serde_json::to_vec(body)
                .context("💀 Failed to serialize a request body. The JSON refused to become bytes.")?;
            request = request
                .header("Content-Type", "application/json")
                .body(payload);
        }
        trace!("📡 {} {}", method, target);
        request.send().await.with_context(|| {
            format!("💀 {method} {target} never made it to Elasticsearch. The network said 'not vibing with it.'")
        })
    }

    /// 📬 Send and insist on 2xx; non-2xx becomes a [`BackendError`].
    async fn call(&self, method: Method, url: Url, body: Option<&Value>) -> Result<String> {
        let response = self.send(method, url, body).await?;
        read_success(response).await
    }

    /// 🔍 HEAD-style existence check: 2xx → true, 404 → false, anything else → error.
    async fn exists(&self, url: Url) -> Result<bool> {
        let response = self.send(Method::HEAD, url, None).await?;
        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.as_u16() == 404 {
            Ok(false)
        } else {
            // -- HEAD bodies are empty, so the status is all the story we get
            Err(BackendError::from_response_body(
                status.as_u16(),
                status.canonical_reason().unwrap_or("HEAD request failed"),
            )
            .into())
        }
    }

    /// 📖 GET a JSON object; 404 means "nothing matched" and reads as empty.
    async fn get_map_or_empty(&self, url: Url) -> Result<Map<String, Value>> {
        let response = self.send(Method::GET, url, None).await?;
        if response.status().as_u16() == 404 {
            return Ok(Map::new());
        }
        let body = read_success(response).await?;
        parse_json(&body)
    }
}

async fn read_success(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(BackendError::from_response_body(status.as_u16(), &body).into())
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).with_context(|| {
        format!("💀 Elasticsearch answered with something that isn't the JSON we expected: '{body}'")
    })
}

#[async_trait]
impl EventStore for ElasticsearchStore {
    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let payload = render_bulk_body(operations)?;
        debug!("📡 Sending {} bytes to /_bulk", payload.len());
        let response = self
            .request(Method::POST, self.url(&["_bulk"])?)
            // ⚠️ application/x-ndjson, not application/json. ES will sulk otherwise.
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch. Check connectivity, check timeouts, check your feelings.")?;
        let body = read_success(response).await?;
        parse_json(&body)
    }

    async fn ilm_policy_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .send(Method::GET, self.url(&["_ilm", "policy", name])?, None)
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        read_success(response).await?;
        Ok(true)
    }

    async fn put_ilm_policy(&self, name: &str, policy: &Value) -> Result<()> {
        self.call(Method::PUT, self.url(&["_ilm", "policy", name])?, Some(policy))
            .await?;
        Ok(())
    }

    async fn legacy_template_exists(&self, name: &str) -> Result<bool> {
        self.exists(self.url(&["_template", name])?).await
    }

    async fn index_template_exists(&self, name: &str) -> Result<bool> {
        self.exists(self.url(&["_index_template", name])?).await
    }

    async fn put_index_template(&self, name: &str, template: &Value, create_only: bool) -> Result<()> {
        let mut url = self.url(&["_index_template", name])?;
        if create_only {
            url.set_query(Some("create=true"));
        }
        self.call(Method::PUT, url, Some(template)).await?;
        Ok(())
    }

    async fn get_legacy_templates(&self, pattern: &str) -> Result<Map<String, Value>> {
        self.get_map_or_empty(self.url(&["_template", pattern])?).await
    }

    async fn put_legacy_template(&self, name: &str, template: &Value) -> Result<()> {
        self.call(Method::PUT, self.url(&["_template", name])?, Some(template))
            .await?;
        Ok(())
    }

    async fn get_index_settings(&self, pattern: &str) -> Result<Map<String, Value>> {
        self.get_map_or_empty(self.url(&[pattern, "_settings"])?).await
    }

    async fn put_index_settings(&self, index: &str, settings: &Value) -> Result<()> {
        self.call(Method::PUT, self.url(&[index, "_settings"])?, Some(settings))
            .await?;
        Ok(())
    }

    async fn get_aliases(&self, pattern: &str) -> Result<Map<String, Value>> {
        self.get_map_or_empty(self.url(&[pattern, "_alias"])?).await
    }

    async fn update_aliases(&self, actions: &Value) -> Result<()> {
        self.call(Method::POST, self.url(&["_aliases"])?, Some(actions))
            .await?;
        Ok(())
    }

    async fn alias_exists(&self, name: &str) -> Result<bool> {
        self.exists(self.url(&["_alias", name])?).await
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<()> {
        self.call(Method::PUT, self.url(&[name])?, Some(body)).await?;
        Ok(())
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        let response = self
            .call(Method::POST, self.url(&[index, "_search"])?, Some(body))
            .await?;
        parse_json(&response)
    }
}
