//! Durable consumer cursor.
//!
//! The cursor is the only consumer state that must survive restarts. It is
//! stored as JSON in the indexer's metadata under [`CURSOR_KEY`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConsumerError;
use crate::indexer::Indexer;

/// Metadata key the cursor is stored under
pub const CURSOR_KEY: &str = "logtail/consumer-state";

/// Position of the consumer in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Smallest record id not yet processed
    pub next_offset: u64,

    /// `highest_id - next_offset` at the end of the last batch; `<= 0` when caught up
    pub lag: i64,

    /// Timestamp of the last processed record
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_time: Option<DateTime<Utc>>,

    /// When this cursor was written
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Cursor {
    /// Cursor for a consumer that has never run.
    pub fn initial() -> Self {
        Self {
            next_offset: 0,
            lag: 0,
            last_time: None,
            updated_at: Utc::now(),
        }
    }

    /// Cursor positioned just past `farthest_id`.
    pub fn after(
        farthest_id: u64,
        farthest_time: Option<DateTime<Utc>>,
        highest_id: Option<u64>,
    ) -> Self {
        let next_offset = farthest_id + 1;
        Self {
            next_offset,
            lag: compute_lag(highest_id, next_offset),
            last_time: farthest_time,
            updated_at: Utc::now(),
        }
    }

    pub fn is_caught_up(&self) -> bool {
        self.lag <= 0
    }

    /// Read the stored cursor, if one exists.
    pub fn load(indexer: &dyn Indexer) -> Result<Option<Self>, ConsumerError> {
        match indexer.read_metadata(CURSOR_KEY).map_err(ConsumerError::Index)? {
            Some(value) => Ok(Some(Self::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Read the stored cursor, falling back to [`Cursor::initial`].
    pub fn load_or_initial(indexer: &dyn Indexer) -> Result<Self, ConsumerError> {
        Ok(Self::load(indexer)?.unwrap_or_else(Self::initial))
    }

    /// Overwrite the stored cursor.
    pub fn persist(&self, indexer: &dyn Indexer) -> Result<(), ConsumerError> {
        let value = serde_json::to_value(self)?;
        indexer
            .store_metadata(CURSOR_KEY, value)
            .map_err(ConsumerError::Index)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConsumerError> {
        serde_json::from_value(value)
            .map_err(|e| ConsumerError::Checkpoint(format!("invalid stored cursor: {}", e)))
    }
}

/// Lag between the log head and the next offset to read.
///
/// An empty log is treated as having highest id -1.
pub fn compute_lag(highest_id: Option<u64>, next_offset: u64) -> i64 {
    let highest = highest_id.map_or(-1, |id| id as i64);
    highest - next_offset as i64
}
