//! Key and value encoding for the record log.
//!
//! Key format: `rec:{id:020}`
//! - id: record id, zero-padded to 20 digits so that lexicographic key
//!   order equals numeric id order (u64::MAX has 20 digits)
//!
//! Value format: `{header_len: u32 BE}{header JSON}{payload bytes}`
//! - header: kind, optional document key, timestamp in milliseconds
//! - payload: stored verbatim, never re-encoded

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use logtail_types::{Record, RecordKind};

use crate::error::StorageError;

const KEY_PREFIX: &str = "rec:";

/// Key for record storage
/// Format: rec:{id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordKey {
    /// Record id
    pub id: u64,
}

impl RecordKey {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}{:020}", KEY_PREFIX, self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let digits = s
            .strip_prefix(KEY_PREFIX)
            .ok_or_else(|| StorageError::Key(format!("Invalid record key format: {}", s)))?;

        let id: u64 = digits
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid record id: {}", e)))?;

        Ok(Self { id })
    }
}

#[derive(Serialize, Deserialize)]
struct RecordHeader {
    kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    timestamp_ms: i64,
}

/// Encode everything but the id (which lives in the key).
pub fn encode_value(record: &Record) -> Result<Vec<u8>, StorageError> {
    let header = RecordHeader {
        kind: record.kind,
        key: record.key.clone(),
        timestamp_ms: record.timestamp_ms(),
    };
    let header_bytes = serde_json::to_vec(&header)?;
    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| StorageError::Serialization("record header too large".to_string()))?;

    let mut out = Vec::with_capacity(4 + header_bytes.len() + record.payload.len());
    out.extend_from_slice(&header_len.to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&record.payload);
    Ok(out)
}

/// Decode a stored value back into a record with the given id.
pub fn decode_value(id: u64, bytes: &[u8]) -> Result<Record, StorageError> {
    let corrupt = |reason: String| StorageError::Corrupt { id, reason };

    let len_bytes: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| corrupt("value shorter than header length".to_string()))?;
    let header_len = u32::from_be_bytes(len_bytes) as usize;

    let header_bytes = bytes
        .get(4..4 + header_len)
        .ok_or_else(|| corrupt(format!("truncated header ({} bytes)", header_len)))?;
    let header: RecordHeader =
        serde_json::from_slice(header_bytes).map_err(|e| corrupt(e.to_string()))?;

    let timestamp = timestamp_from_ms(header.timestamp_ms)
        .ok_or_else(|| corrupt(format!("timestamp out of range: {}", header.timestamp_ms)))?;

    Ok(Record {
        id,
        kind: header.kind,
        timestamp,
        payload: bytes[4 + header_len..].to_vec(),
        key: header.key,
    })
}

fn timestamp_from_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
