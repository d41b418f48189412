//! Progress publisher.
//!
//! After a non-empty batch: recompute lag, persist the cursor, then fan the
//! cursor out to listeners and subscribers.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cursor::Cursor;
use crate::error::ConsumerError;
use crate::indexer::Indexer;
use crate::listeners::ListenerRegistry;
use crate::processor::BatchStats;
use crate::store::RecordStore;

/// True when more than one full batch is still waiting behind the cursor.
pub fn is_falling_behind(lag: i64, batch_limit: usize) -> bool {
    lag > 0 && lag > batch_limit as i64
}

pub struct ProgressPublisher<'a> {
    pub store: &'a dyn RecordStore,
    pub indexer: &'a dyn Indexer,
    pub listeners: &'a ListenerRegistry,
    pub progress: &'a watch::Sender<Option<Cursor>>,
    pub batch_limit: usize,
}

impl ProgressPublisher<'_> {
    /// Publish the outcome of a batch.
    ///
    /// Returns None without side effects when the batch was empty. Store
    /// and persistence failures are returned; listener failures are not.
    pub fn publish(&self, stats: &BatchStats) -> Result<Option<Cursor>, ConsumerError> {
        let Some(farthest_id) = stats.farthest_id else {
            return Ok(None);
        };

        let highest_id = self.store.highest_id().map_err(ConsumerError::Store)?;
        let cursor = Cursor::after(farthest_id, stats.farthest_time, highest_id);
        cursor.persist(self.indexer)?;

        debug!(
            next_offset = cursor.next_offset,
            lag = cursor.lag,
            indexed = stats.indexed,
            failed = stats.failed,
            "Persisted cursor"
        );

        let failed = self.listeners.notify(&cursor);
        if failed > 0 {
            debug!(failed, "Some listeners failed");
        }
        self.progress.send_replace(Some(cursor.clone()));

        if is_falling_behind(cursor.lag, self.batch_limit) {
            warn!(
                lag = cursor.lag,
                batch_limit = self.batch_limit,
                "Log consumer is falling behind"
            );
        }

        Ok(Some(cursor))
    }
}
