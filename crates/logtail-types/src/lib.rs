//! # logtail-types
//!
//! Shared domain types for the logtail system.
//!
//! - [`Record`]: an entry in the append-only log
//! - [`Document`] / [`Transaction`]: decoded record payloads
//! - [`Settings`]: layered configuration

pub mod config;
pub mod error;
pub mod payload;
pub mod record;

pub use config::Settings;
pub use error::LogtailError;
pub use payload::{Document, Transaction, TxOp};
pub use record::{Record, RecordKind};
