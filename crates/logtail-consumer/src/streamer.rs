//! Batch streamer.
//!
//! Pulls one bounded, ascending slice of the log and hands records to a
//! callback one at a time, checking for cancellation between records.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use logtail_types::Record;

use crate::error::ConsumerError;
use crate::store::RecordStore;

/// How a stream call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Records delivered to the callback
    pub delivered: usize,
    /// True if cancellation cut the batch short
    pub interrupted: bool,
}

pub struct BatchStreamer<'a> {
    store: &'a dyn RecordStore,
    batch_limit: usize,
}

impl<'a> BatchStreamer<'a> {
    pub fn new(store: &'a dyn RecordStore, batch_limit: usize) -> Self {
        Self { store, batch_limit }
    }

    /// Deliver records with `id >= start_id` to `on_record` in ascending order.
    ///
    /// Stops without error when `token` is cancelled. A store failure, or a
    /// record that would move backwards in the log, is returned as an error.
    pub fn stream<F>(
        &self,
        start_id: u64,
        token: &CancellationToken,
        mut on_record: F,
    ) -> Result<StreamOutcome, ConsumerError>
    where
        F: FnMut(&Record),
    {
        let records = self
            .store
            .stream(start_id, self.batch_limit)
            .map_err(ConsumerError::Store)?;

        let mut outcome = StreamOutcome {
            delivered: 0,
            interrupted: false,
        };
        let mut expected = start_id;

        for item in records {
            if token.is_cancelled() {
                outcome.interrupted = true;
                debug!(start_id, delivered = outcome.delivered, "Batch interrupted by stop");
                break;
            }

            let record = item.map_err(ConsumerError::Store)?;
            if record.id < expected {
                return Err(ConsumerError::Store(
                    format!(
                        "store returned record {} out of order (expected >= {})",
                        record.id, expected
                    )
                    .into(),
                ));
            }
            expected = record.id + 1;

            on_record(&record);
            outcome.delivered += 1;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use logtail_types::Document;

    fn store_with(n: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..n {
            store.append_document(&format!("k{}", i), &Document::new().with_field("n", i));
        }
        store
    }

    #[test]
    fn test_streams_in_order_from_offset() {
        let store = store_with(10);
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        let outcome = BatchStreamer::new(&store, 4)
            .stream(3, &token, |r| seen.push(r.id))
            .unwrap();

        assert_eq!(seen, vec![3, 4, 5, 6]);
        assert_eq!(outcome.delivered, 4);
        assert!(!outcome.interrupted);
    }

    #[test]
    fn test_empty_batch_is_not_an_error() {
        let store = store_with(2);
        let token = CancellationToken::new();

        let outcome = BatchStreamer::new(&store, 10)
            .stream(2, &token, |_| panic!("no records expected"))
            .unwrap();

        assert_eq!(outcome.delivered, 0);
    }

    #[test]
    fn test_cancellation_stops_mid_batch() {
        let store = store_with(10);
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        let outcome = BatchStreamer::new(&store, 10)
            .stream(0, &token, |r| {
                seen.push(r.id);
                if r.id == 2 {
                    token.cancel();
                }
            })
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert!(outcome.interrupted);
    }

    #[test]
    fn test_store_failure_is_fatal() {
        let store = store_with(3);
        store.fail_stream_call(1);
        let token = CancellationToken::new();

        let err = BatchStreamer::new(&store, 10)
            .stream(0, &token, |_| {})
            .unwrap_err();
        assert!(matches!(err, ConsumerError::Store(_)));
    }
}
