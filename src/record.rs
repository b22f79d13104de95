//! JSON record model.
//!
//! Items travel as JSON objects whose field superset depends on the flow
//! stage (`input`, `answer`, `origin_code`, `index`, `patched_code`).
//! Unknown fields are carried through untouched so downstream stages keep
//! whatever upstream attached.

use crate::error::ShapeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Wrapper keys accepted when the input root is an object instead of an
/// array.
const WRAPPER_KEYS: [&str; 4] = ["data", "items", "records", "results"];

/// One pipeline item: an arbitrary JSON object with typed accessors for
/// the fields the flows care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn input(&self) -> Option<&str> {
        self.str_field("input")
    }

    pub fn answer(&self) -> Option<&str> {
        self.str_field("answer")
    }

    pub fn origin_code(&self) -> Option<&str> {
        self.str_field("origin_code")
    }

    /// Explicit stable index, when the record carries one.
    pub fn index(&self) -> Option<i64> {
        self.0.get("index").and_then(Value::as_i64)
    }

    /// Stable index: the explicit `index` field verbatim, else the
    /// record's position in its input sequence.
    pub fn index_or(&self, position: usize) -> i64 {
        self.index().unwrap_or(position as i64)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    /// Copy with one extra/overwritten field, everything else verbatim.
    pub fn with(&self, name: &str, value: Value) -> Self {
        let mut out = self.clone();
        out.set(name, value);
        out
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode the accepted input shapes into a record sequence.
///
/// Accepted: an array of objects (non-object elements are skipped with a
/// warning), an object wrapping such an array under one of
/// `data`/`items`/`records`/`results`, or a single object treated as a
/// one-record sequence. Anything else is a [`ShapeError`].
pub fn decode_records(value: Value) -> Result<Vec<Record>, ShapeError> {
    match value {
        Value::Array(elements) => Ok(objects_of(elements)),
        Value::Object(map) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(elements)) = map.get(key) {
                    return Ok(objects_of(elements.clone()));
                }
            }
            if WRAPPER_KEYS.iter().any(|k| map.contains_key(*k)) {
                return Err(ShapeError::NoWrapperKey);
            }
            Ok(vec![Record(map)])
        }
        Value::Null => Err(ShapeError::UnsupportedRoot { found: "null" }),
        Value::Bool(_) => Err(ShapeError::UnsupportedRoot { found: "bool" }),
        Value::Number(_) => Err(ShapeError::UnsupportedRoot { found: "number" }),
        Value::String(_) => Err(ShapeError::UnsupportedRoot { found: "string" }),
    }
}

fn objects_of(elements: Vec<Value>) -> Vec<Record> {
    let mut records = Vec::with_capacity(elements.len());
    for (pos, element) in elements.into_iter().enumerate() {
        match element {
            Value::Object(map) => records.push(Record(map)),
            other => warn!(position = pos, found = %kind_of(&other), "element is not an object; skipped"),
        }
    }
    records
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Wrap raw code in the fenced form the annotation flow expects.
pub fn wrap_code_block(code: &str) -> String {
    format!("```c\n{code}\n```")
}

/// Build second-pass annotation inputs from records carrying
/// `patched_code` (a string, or a list of strings yielding one input
/// each). The stable `index` is carried forward when present.
pub fn patched_to_inputs(records: &[Record]) -> Vec<Record> {
    let mut outputs = Vec::new();
    for record in records {
        let Some(patched) = record.0.get("patched_code") else {
            continue;
        };
        let index = record.index();
        let mut push = |code: &str| {
            let mut out = Record::new();
            if let Some(idx) = index {
                out.set("index", Value::from(idx));
            }
            out.set("input", Value::from(wrap_code_block(code)));
            outputs.push(out);
        };
        match patched {
            Value::Array(segments) => {
                for segment in segments {
                    match segment.as_str() {
                        Some(code) => push(code),
                        None => push(&segment.to_string()),
                    }
                }
            }
            Value::String(code) => push(code),
            other => push(&other.to_string()),
        }
    }
    outputs
}

/// Read a record sequence from a JSON file.
pub fn read_records_file(path: &Path) -> anyhow::Result<Vec<Record>> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {e}", path.display()))?;
    let records = decode_records(value)?;
    Ok(records)
}

/// Write records as a pretty-printed JSON array, creating parent
/// directories as needed.
pub fn write_records_file(path: &Path, records: &[Record]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let text = serde_json::to_string_pretty(records)?;
    fs::write(path, text)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    Ok(())
}
