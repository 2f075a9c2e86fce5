//! 📜 NDJSON reading: one event per line, blank lines forgiven.
//!
//! What's the DEAL with NDJSON? It's JSON but every document is in solitary
//! confinement. We find the cells with `memchr` and parse each inmate in turn.
//! A bad line fails the whole read with its line number, so nobody has to
//! bisect a ten-thousand-line file by hand. 🦆

use anyhow::{Context, Result};
use serde_json::Value;

/// 📜 Parse newline-delimited JSON documents. `\r\n` endings and blank lines are fine.
pub fn parse_events(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut events = Vec::new();
    let mut start = 0;
    let mut line_number = 0;
    let ends = memchr::memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for end in ends {
        line_number += 1;
        let line = trim_ascii_whitespace(&bytes[start..end]);
        start = end + 1;
        if line.is_empty() {
            continue;
        }
        let event: Value = serde_json::from_slice(line)
            .with_context(|| format!("💀 line {line_number} is not a JSON document"))?;
        events.push(event);
    }
    Ok(events)
}

fn trim_ascii_whitespace(mut line: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = line {
        if !first.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    while let [rest @ .., last] = line {
        if !last.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    line
}
