//! Log-tailing consumer for logtail.
//!
//! Tails an append-only record log and drives an index from it, keeping a
//! durable cursor so indexing resumes where it left off after a restart.
//!
//! ## Key Components
//!
//! - [`RecordStore`] / [`Indexer`]: the two collaborators the consumer drives
//! - [`Cursor`]: durable next offset plus lag, stored in indexer metadata
//! - [`BatchStreamer`]: streams one bounded batch, honoring cancellation
//! - [`RecordProcessor`]: applies records by kind, skipping failed ones
//! - [`ProgressPublisher`]: persists the cursor and notifies listeners
//! - [`LogConsumer`] / [`ConsumerHandle`]: background start, supervised
//!   restart, and blocking stop
//!
//! ## Example
//!
//! ```ignore
//! use logtail_consumer::{ConsumerConfig, LogConsumer};
//!
//! let consumer = LogConsumer::new(storage, indexer, ConsumerConfig::default());
//! consumer.listeners().register("progress", |cursor| {
//!     tracing::info!(next_offset = cursor.next_offset, lag = cursor.lag, "progress");
//!     Ok(())
//! });
//!
//! let handle = consumer.start()?;
//! // ...
//! handle.stop();
//! ```

pub mod config;
mod consumer;
pub mod cursor;
pub mod error;
pub mod indexer;
pub mod lifecycle;
pub mod listeners;
pub mod processor;
pub mod publisher;
pub mod store;
pub mod streamer;
pub mod testing;

pub use config::ConsumerConfig;
pub use cursor::{compute_lag, Cursor, CURSOR_KEY};
pub use error::{ConsumerError, IndexError, StoreError};
pub use indexer::Indexer;
pub use lifecycle::{ConsumerHandle, LogConsumer};
pub use listeners::{Listener, ListenerRegistry};
pub use processor::{BatchStats, RecordProcessor};
pub use publisher::{is_falling_behind, ProgressPublisher};
pub use store::{RecordStore, RecordStream};
pub use streamer::{BatchStreamer, StreamOutcome};
