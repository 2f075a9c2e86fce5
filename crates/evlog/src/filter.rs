//! 🔍 Filter translation: free text in, backend query clause out.
//!
//! The query gateway doesn't parse filter expressions itself. It hands them to a
//! [`FilterTranslator`] and either gets a query clause back or a
//! [`FilterSyntaxError`] it can show the caller. The shipped translator,
//! [`QueryStringTranslator`], lets the backend's own `query_string` parser do the
//! real work and only rejects what is obviously broken before it goes anywhere.

use serde_json::{Value, json};
use thiserror::Error;

/// 💀 The expression could not be turned into a query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FilterSyntaxError {
    pub message: String,
    /// 📡 HTTP-ish status a host would answer with. Always 400 for now.
    pub status_code: u16,
}

impl FilterSyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 400,
        }
    }
}

/// 🔁 Turns a filter expression into a backend query clause.
pub trait FilterTranslator: std::fmt::Debug + Send + Sync {
    fn translate(&self, expression: &str) -> Result<Value, FilterSyntaxError>;
}

/// 🔁 `expression` → `{"query_string": {"query": expression}}`, after a sanity check.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringTranslator;

impl FilterTranslator for QueryStringTranslator {
    fn translate(&self, expression: &str) -> Result<Value, FilterSyntaxError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(FilterSyntaxError::new("filter expression is empty"));
        }

        let mut depth: i64 = 0;
        let mut in_quotes = false;
        let mut escaped = false;
        for (position, c) in expression.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => in_quotes = !in_quotes,
                '(' if !in_quotes => depth += 1,
                ')' if !in_quotes => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(FilterSyntaxError::new(format!(
                            "unexpected ')' at position {position}"
                        )));
                    }
                }
                _ => {}
            }
        }
        if in_quotes {
            return Err(FilterSyntaxError::new("unterminated quoted string"));
        }
        if depth > 0 {
            return Err(FilterSyntaxError::new(format!("{depth} unclosed '('")));
        }

        Ok(json!({ "query_string": { "query": expression } }))
    }
}
