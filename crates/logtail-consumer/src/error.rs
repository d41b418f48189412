//! Error types for the log consumer.

use thiserror::Error;

/// Error returned by a [`RecordStore`](crate::RecordStore) implementation
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by an [`Indexer`](crate::Indexer) implementation
pub type IndexError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the consumer.
///
/// `Decode` and per-record `Index` failures are handled inside a batch.
/// Everything else that escapes an iteration is loop-fatal and is handled
/// by the supervisor.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Record store read failed
    #[error("Store error: {0}")]
    Store(#[source] StoreError),

    /// Indexer call failed
    #[error("Index error: {0}")]
    Index(#[source] IndexError),

    /// Record payload could not be decoded for its kind
    #[error("Decode error for record {id}: {reason}")]
    Decode { id: u64, reason: String },

    /// Cursor load/save issues
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid consumer configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background runtime or thread could not be created
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for ConsumerError {
    fn from(err: serde_json::Error) -> Self {
        ConsumerError::Serialization(err.to_string())
    }
}
