//! Record type for the append-only log.
//!
//! Records are immutable entries addressed by a strictly increasing id
//! assigned by the store on append. The payload is opaque until decoded
//! according to the record's kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::{Document, Transaction};

/// Discriminator for how a record's payload is decoded and indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A document stored under its key
    Document,
    /// A transaction referencing documents by key
    Transaction,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Document => "document",
            RecordKind::Transaction => "transaction",
        }
    }

    /// Parse from string, returning None for unknown kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(RecordKind::Document),
            "transaction" => Some(RecordKind::Transaction),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown record kind: {}", s))
    }
}

/// An entry in the append-only log.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Strictly increasing id assigned on append
    pub id: u64,

    /// How the payload is decoded
    pub kind: RecordKind,

    /// Wall-clock time at append
    pub timestamp: DateTime<Utc>,

    /// Serialized payload, decoded according to `kind`
    pub payload: Vec<u8>,

    /// Document key (content address). Only meaningful for documents.
    pub key: Option<String>,
}

impl Record {
    /// Create a new record
    pub fn new(id: u64, kind: RecordKind, timestamp: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            id,
            kind,
            timestamp,
            payload,
            key: None,
        }
    }

    /// Attach a document key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Decode the payload as a document.
    pub fn decode_document(&self) -> Result<Document, serde_json::Error> {
        Document::from_bytes(&self.payload)
    }

    /// Decode the payload as a transaction.
    pub fn decode_transaction(&self) -> Result<Transaction, serde_json::Error> {
        Transaction::from_bytes(&self.payload)
    }

    /// Get timestamp as milliseconds since Unix epoch
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
