//! Record processor.
//!
//! Decodes a record by kind and applies it to the indexer. Failures are
//! contained to the record: they are logged and counted, and the batch
//! moves on.

use chrono::{DateTime, Utc};
use tracing::{trace, warn};

use logtail_types::{Record, RecordKind};

use crate::error::ConsumerError;
use crate::indexer::Indexer;

/// Outcome of processing one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    /// Records handed to the processor
    pub attempted: usize,
    /// Records applied to the indexer
    pub indexed: usize,
    /// Records skipped because they failed to decode or apply
    pub failed: usize,
    /// Id of the last attempted record
    pub farthest_id: Option<u64>,
    /// Timestamp of the last attempted record
    pub farthest_time: Option<DateTime<Utc>>,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no record was attempted.
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }

    fn reached(&mut self, record: &Record) {
        self.attempted += 1;
        self.farthest_id = Some(record.id);
        self.farthest_time = Some(record.timestamp);
    }
}

/// Applies records to an [`Indexer`].
pub struct RecordProcessor<'a> {
    indexer: &'a dyn Indexer,
}

impl<'a> RecordProcessor<'a> {
    pub fn new(indexer: &'a dyn Indexer) -> Self {
        Self { indexer }
    }

    /// Process one record, recording the outcome in `stats`.
    ///
    /// The record counts as reached whether or not it applied, so the
    /// cursor moves past records that fail.
    pub fn process(&self, record: &Record, stats: &mut BatchStats) {
        stats.reached(record);

        match self.apply(record) {
            Ok(()) => {
                stats.indexed += 1;
                trace!(id = record.id, kind = %record.kind, "Indexed record");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(
                    id = record.id,
                    kind = %record.kind,
                    key = ?record.key,
                    timestamp = %record.timestamp,
                    error = %e,
                    "Skipping record that failed to index"
                );
            }
        }
    }

    fn apply(&self, record: &Record) -> Result<(), ConsumerError> {
        match record.kind {
            RecordKind::Document => {
                let key = record.key.as_deref().ok_or_else(|| ConsumerError::Decode {
                    id: record.id,
                    reason: "document record has no key".to_string(),
                })?;
                let document = record.decode_document().map_err(|e| ConsumerError::Decode {
                    id: record.id,
                    reason: e.to_string(),
                })?;
                self.indexer
                    .index_document(key, &document)
                    .map_err(ConsumerError::Index)
            }
            RecordKind::Transaction => {
                let transaction =
                    record
                        .decode_transaction()
                        .map_err(|e| ConsumerError::Decode {
                            id: record.id,
                            reason: e.to_string(),
                        })?;
                self.indexer
                    .index_transaction(&transaction, record.timestamp, record.id)
                    .map_err(ConsumerError::Index)
            }
        }
    }
}
