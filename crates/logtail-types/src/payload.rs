//! Decoded record payloads.
//!
//! Document payloads are JSON objects. Transaction payloads list the
//! document keys they put or delete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A document decoded from a `document` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    /// Top-level fields of the JSON object
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Concatenate all string values (nested ones included) for full-text indexing.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        for value in self.fields.values() {
            collect_strings(value, &mut parts);
        }
        parts.join(" ")
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

/// A single operation inside a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TxOp {
    /// Make the document under `key` part of the index
    Put { key: String },
    /// Remove the document under `key` from the index
    Delete { key: String },
}

impl TxOp {
    /// The document key this operation refers to
    pub fn key(&self) -> &str {
        match self {
            TxOp::Put { key } | TxOp::Delete { key } => key,
        }
    }
}

/// A transaction decoded from a `transaction` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<TxOp>,
}

impl Transaction {
    pub fn new(ops: Vec<TxOp>) -> Self {
        Self { ops }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
