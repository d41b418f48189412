//! Storage layer for logtail.
//!
//! Provides a RocksDB-backed append-only record log with:
//! - Strictly increasing record ids assigned on append
//! - Zero-padded id keys so lexicographic order is id order
//! - Lazy ascending iteration from any id (no bulk loading)
//! - Highest-id lookup via reverse iteration

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::RecordKey;
