//! Consumer loop.
//!
//! Each iteration reads the stored cursor, streams one batch through the
//! processor, publishes progress, then idles. Errors escaping an iteration
//! end the loop and are handled by the supervisor in [`crate::lifecycle`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConsumerConfig;
use crate::cursor::Cursor;
use crate::error::ConsumerError;
use crate::indexer::Indexer;
use crate::listeners::ListenerRegistry;
use crate::processor::{BatchStats, RecordProcessor};
use crate::publisher::ProgressPublisher;
use crate::store::RecordStore;
use crate::streamer::BatchStreamer;

pub(crate) struct ConsumerLoop {
    pub store: Arc<dyn RecordStore>,
    pub indexer: Arc<dyn Indexer>,
    pub config: ConsumerConfig,
    pub listeners: ListenerRegistry,
    pub progress: Arc<watch::Sender<Option<Cursor>>>,
}

impl ConsumerLoop {
    /// Run iterations until `token` is cancelled.
    pub async fn run(&self, token: &CancellationToken) -> Result<(), ConsumerError> {
        while !token.is_cancelled() {
            self.run_once(token)?;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.idle_interval()) => {}
            }
        }
        Ok(())
    }

    /// One iteration: read cursor, stream, publish.
    ///
    /// A batch cut short by cancellation is not published; its records are
    /// replayed from the stored cursor on the next start.
    pub fn run_once(&self, token: &CancellationToken) -> Result<BatchStats, ConsumerError> {
        let cursor = Cursor::load_or_initial(self.indexer.as_ref())?;

        let processor = RecordProcessor::new(self.indexer.as_ref());
        let mut stats = BatchStats::new();
        let outcome = BatchStreamer::new(self.store.as_ref(), self.config.batch_limit).stream(
            cursor.next_offset,
            token,
            |record| processor.process(record, &mut stats),
        )?;

        if outcome.interrupted {
            info!(
                next_offset = cursor.next_offset,
                attempted = stats.attempted,
                "Stopped mid-batch, cursor left unchanged"
            );
            return Ok(stats);
        }

        if !stats.is_empty() {
            debug!(
                start = cursor.next_offset,
                attempted = stats.attempted,
                indexed = stats.indexed,
                failed = stats.failed,
                "Processed batch"
            );
        }

        ProgressPublisher {
            store: self.store.as_ref(),
            indexer: self.indexer.as_ref(),
            listeners: &self.listeners,
            progress: &self.progress,
            batch_limit: self.config.batch_limit,
        }
        .publish(&stats)?;

        Ok(stats)
    }
}
