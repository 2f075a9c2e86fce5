//! 🔍 A pocket-sized query evaluator for the in-memory store.
//!
//! Understands exactly the clauses evlog generates (`bool`, `term`, `terms`,
//! `range`, `exists`, `nested`, `match_all`, `match_none`) and refuses
//! everything else out loud. Anything fancier belongs to a real cluster.
//!
//! Range comparisons are type-aware enough for our fields: numbers compare as
//! numbers, dotted version strings compare semantically (`8.10.0 > 8.9.0`,
//! `8.0.0-snapshot < 8.0.0`), other strings compare lexicographically, which is
//! exactly right for RFC 3339 timestamps in the same offset.

use std::cmp::Ordering;

use anyhow::{Result, bail};
use serde_json::{Map, Value};

/// ✅ Does `doc` satisfy `query`?
pub(crate) fn matches(query: &Value, doc: &Value) -> Result<bool> {
    Matcher { doc, scope: None }.eval(query)
}

/// 🔄 Sort by the first sort clause; documents missing the field go last.
pub(crate) fn sort_documents(documents: &mut [Value], sort: Option<&Value>) -> Result<()> {
    let Some((field, descending)) = first_sort_clause(sort)? else {
        return Ok(());
    };
    documents.sort_by(|left, right| {
        let left = lookup(left, &field).into_iter().next();
        let right = lookup(right, &field).into_iter().next();
        match (left, right) {
            (Some(l), Some(r)) => {
                let ordering = compare(l, r).unwrap_or(Ordering::Equal);
                if descending { ordering.reverse() } else { ordering }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    Ok(())
}

fn first_sort_clause(sort: Option<&Value>) -> Result<Option<(String, bool)>> {
    let clause = match sort {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(clauses)) => match clauses.first() {
            Some(clause) => clause,
            None => return Ok(None),
        },
        Some(clause) => clause,
    };
    match clause {
        Value::String(field) => Ok(Some((field.clone(), false))),
        Value::Object(clause) => {
            let Some((field, order)) = clause.iter().next() else {
                return Ok(None);
            };
            let order = match order {
                Value::String(order) => order.as_str(),
                Value::Object(options) => options.get("order").and_then(Value::as_str).unwrap_or("asc"),
                _ => "asc",
            };
            Ok(Some((field.clone(), order.eq_ignore_ascii_case("desc"))))
        }
        other => bail!("💀 the in-memory store can't sort by {other}"),
    }
}

struct Matcher<'a> {
    doc: &'a Value,
    /// 🪆 Inside a `nested` clause: the nested path and the one object being tested.
    scope: Option<(&'a str, &'a Value)>,
}

impl<'a> Matcher<'a> {
    fn eval(&self, query: &Value) -> Result<bool> {
        let Some(clause) = query.as_object() else {
            bail!("💀 a query clause must be an object, got {query}");
        };
        let mut entries = clause.iter();
        let (kind, body) = match (entries.next(), entries.next()) {
            (None, _) => return Ok(true),
            (Some(entry), None) => entry,
            (Some(_), Some(_)) => bail!("💀 a query clause may only have one key, got {query}"),
        };
        match kind.as_str() {
            "match_all" => Ok(true),
            "match_none" => Ok(false),
            "bool" => self.eval_bool(body),
            "term" => self.eval_term(body),
            "terms" => self.eval_terms(body),
            "range" => self.eval_range(body),
            "exists" => self.eval_exists(body),
            "nested" => self.eval_nested(body),
            other => bail!("💀 the in-memory store does not speak `{other}` queries"),
        }
    }

    fn eval_bool(&self, body: &Value) -> Result<bool> {
        let must = clauses(body.get("must"));
        let filter = clauses(body.get("filter"));
        let should = clauses(body.get("should"));
        let must_not = clauses(body.get("must_not"));

        for clause in must.iter().chain(filter.iter()) {
            if !self.eval(clause)? {
                return Ok(false);
            }
        }
        for clause in &must_not {
            if self.eval(clause)? {
                return Ok(false);
            }
        }
        if !should.is_empty() {
            // -- should is mandatory only when nothing else constrains the bool
            let default_minimum = if must.is_empty() && filter.is_empty() { 1 } else { 0 };
            let minimum = body
                .get("minimum_should_match")
                .and_then(Value::as_u64)
                .unwrap_or(default_minimum);
            let mut matched = 0;
            for clause in &should {
                if self.eval(clause)? {
                    matched += 1;
                }
            }
            if matched < minimum {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eval_term(&self, body: &Value) -> Result<bool> {
        let (field, clause) = single_field(body, "term")?;
        let expected = match clause {
            Value::Object(options) => options.get("value").unwrap_or(&Value::Null),
            scalar => scalar,
        };
        Ok(self.values(field).into_iter().any(|v| values_equal(v, expected)))
    }

    fn eval_terms(&self, body: &Value) -> Result<bool> {
        let Some(clause) = body.as_object() else {
            bail!("💀 terms query must be an object, got {body}");
        };
        let Some((field, candidates)) = clause.iter().find(|(key, _)| key.as_str() != "boost") else {
            bail!("💀 terms query names no field: {body}");
        };
        let Some(candidates) = candidates.as_array() else {
            bail!("💀 terms query for {field} needs an array, got {candidates}");
        };
        Ok(self
            .values(field)
            .into_iter()
            .any(|v| candidates.iter().any(|candidate| values_equal(v, candidate))))
    }

    fn eval_range(&self, body: &Value) -> Result<bool> {
        let (field, bounds) = single_field(body, "range")?;
        let Some(bounds) = bounds.as_object() else {
            bail!("💀 range bounds for {field} must be an object");
        };
        Ok(self
            .values(field)
            .into_iter()
            .any(|value| within_bounds(value, bounds)))
    }

    fn eval_exists(&self, body: &Value) -> Result<bool> {
        let Some(field) = body.get("field").and_then(Value::as_str) else {
            bail!("💀 exists query needs a field, got {body}");
        };
        Ok(!self.values(field).is_empty())
    }

    fn eval_nested(&self, body: &Value) -> Result<bool> {
        let (Some(path), Some(query)) = (body.get("path").and_then(Value::as_str), body.get("query")) else {
            bail!("💀 nested query needs a path and a query, got {body}");
        };
        for object in lookup(self.doc, path) {
            let inner = Matcher {
                doc: self.doc,
                scope: Some((path, object)),
            };
            if inner.eval(query)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn values(&self, field: &str) -> Vec<&'a Value> {
        if let Some((path, object)) = self.scope {
            if let Some(rest) = field.strip_prefix(path).and_then(|r| r.strip_prefix('.')) {
                return lookup(object, rest);
            }
        }
        lookup(self.doc, field)
    }
}

fn clauses(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

fn single_field<'v>(body: &'v Value, kind: &str) -> Result<(&'v str, &'v Value)> {
    let fields: Vec<_> = body.as_object().map(Map::iter).into_iter().flatten().collect();
    match fields.as_slice() {
        [(field, clause)] => Ok((field.as_str(), *clause)),
        _ => bail!("💀 {kind} query must name exactly one field, got {body}"),
    }
}

/// 🔎 Every non-null value at a dotted path, with arrays flattened along the way.
pub(crate) fn lookup<'v>(root: &'v Value, path: &str) -> Vec<&'v Value> {
    let mut current = Vec::new();
    push_flat(&mut current, root);
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            if let Some(child) = value.get(segment) {
                push_flat(&mut next, child);
            }
        }
        current = next;
    }
    current.retain(|value| !value.is_null());
    current
}

fn push_flat<'v>(out: &mut Vec<&'v Value>, value: &'v Value) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| push_flat(out, item)),
        other => out.push(other),
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => *s == n.to_string(),
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => *s == b.to_string(),
        (a, b) => a == b,
    }
}

fn within_bounds(value: &Value, bounds: &Map<String, Value>) -> bool {
    bounds.iter().all(|(op, bound)| {
        let ordering = compare(value, bound);
        match op.as_str() {
            "gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            "gt" => matches!(ordering, Some(Ordering::Greater)),
            "lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            "lt" => matches!(ordering, Some(Ordering::Less)),
            // -- format, time_zone, boost: decoration, not constraints
            _ => true,
        }
    })
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (parse_version(a), parse_version(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        (Value::String(a), Value::Number(b)) => a.parse::<f64>().ok()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

/// 🏷️ `major.minor[.patch...][-prerelease]` → comparable key. Prereleases sort before releases.
fn parse_version(raw: &str) -> Option<(Vec<u64>, bool)> {
    let (core, prerelease) = match raw.split_once('-') {
        Some((core, _)) => (core, true),
        None => (raw, false),
    };
    if !core.contains('.') {
        return None;
    }
    let mut parts = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    // -- 8.0 and 8.0.0 are the same version wearing different hats
    while parts.len() > 1 && parts.last() == Some(&0) {
        parts.pop();
    }
    Some((parts, !prerelease))
}
