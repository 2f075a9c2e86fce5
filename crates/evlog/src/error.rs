//! 💀 Errors with names.
//!
//! Most of evlog speaks `anyhow` like the rest of the plumbing, but a few failures
//! need a face the caller can recognise in a lineup: the backend said no (and with
//! which status), provisioning blew up (and on which artifact), the filter was
//! gibberish, the query failed. Those live here as `thiserror` enums and travel
//! inside `anyhow::Error`, so callers `downcast_ref` when they care and `{:#}`
//! when they don't. 🦆

use serde_json::Value;
use thiserror::Error;

/// 📡 A non-2xx answer from the backend, decoded from the Elasticsearch error envelope.
///
/// ES error bodies look like `{"error":{"type":"...","reason":"..."},"status":400}`,
/// except when they look like `{"error":"some string"}`, or like nothing at all.
/// We take whatever we're given and keep the status no matter what.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "💀 backend responded with status {status} [{}]: {reason}",
    .error_type.as_deref().unwrap_or("unknown_error")
)]
pub struct BackendError {
    pub status: u16,
    pub error_type: Option<String>,
    pub reason: String,
}

impl BackendError {
    pub fn new(status: u16, error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status,
            error_type: Some(error_type.into()),
            reason: reason.into(),
        }
    }

    /// 🔍 Decode an error response body. Never fails; unparseable bodies become the reason verbatim.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        match parsed.as_ref().and_then(|v| v.get("error")) {
            Some(Value::Object(error)) => Self {
                status,
                error_type: error.get("type").and_then(Value::as_str).map(str::to_owned),
                reason: error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| body.to_owned()),
            },
            Some(Value::String(reason)) => Self {
                status,
                error_type: None,
                reason: reason.clone(),
            },
            _ => Self {
                status,
                error_type: None,
                reason: body.to_owned(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_type(&self, error_type: &str) -> bool {
        self.error_type.as_deref() == Some(error_type)
    }

    /// 🔍 Walk an anyhow chain looking for a backend error. Context layers are see-through.
    pub fn find_in(err: &anyhow::Error) -> Option<&BackendError> {
        err.chain().find_map(|cause| cause.downcast_ref::<BackendError>())
    }
}

/// 🎯 The caller-facing failure classes: fatal-at-startup and fatal-at-call.
///
/// The hot path never produces these. Indexing failures are logged and swallowed.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// 🏗️ A provisioning step failed outside its tolerated race. Startup should abort.
    #[error("💀 error {operation} {artifact}")]
    Provisioning {
        artifact: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// 🔍 The free-text filter could not be translated into a backend query.
    #[error("💀 invalid filter expression ({filter}): {message}")]
    InvalidFilter { filter: String, message: String },

    /// 📐 Pagination or sort options that can't describe a real page.
    #[error("💀 invalid find options: {0}")]
    InvalidFindOptions(String),

    /// 📡 The search call itself failed.
    #[error("💀 querying for events by type \"{owner_type}\" and ids {ids:?} failed")]
    QueryFailed {
        owner_type: String,
        ids: Vec<String>,
        #[source]
        source: anyhow::Error,
    },
}

impl EventLogError {
    pub(crate) fn provisioning(
        artifact: impl Into<String>,
        operation: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self::Provisioning {
            artifact: artifact.into(),
            operation,
            source,
        }
    }

    /// 🔍 Find the first `EventLogError` in an anyhow chain.
    pub fn find_in(err: &anyhow::Error) -> Option<&EventLogError> {
        err.chain().find_map(|cause| cause.downcast_ref::<EventLogError>())
    }
}
