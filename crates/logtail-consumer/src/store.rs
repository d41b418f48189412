//! Record store interface consumed by the batch streamer.

use logtail_storage::Storage;
use logtail_types::Record;

use crate::error::StoreError;

/// Lazily produced records in ascending id order
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Record, StoreError>> + 'a>;

/// Append-only log of records with strictly increasing ids.
///
/// Implementations must deliver records incrementally where the backing
/// store allows it; `limit` can be large.
pub trait RecordStore: Send + Sync {
    /// Records with `id >= start_id`, ascending by id, at most `limit` of them.
    fn stream(&self, start_id: u64, limit: usize) -> Result<RecordStream<'_>, StoreError>;

    /// Highest id currently in the log, or None when it is empty.
    fn highest_id(&self) -> Result<Option<u64>, StoreError>;
}

/// Secondary instances catch up with the primary before every read, so
/// records appended by another process become visible to the consumer.
impl RecordStore for Storage {
    fn stream(&self, start_id: u64, limit: usize) -> Result<RecordStream<'_>, StoreError> {
        self.catch_up()?;
        let records = self
            .iter_from(start_id)?
            .take(limit)
            .map(|item| item.map_err(StoreError::from));
        Ok(Box::new(records))
    }

    fn highest_id(&self) -> Result<Option<u64>, StoreError> {
        self.catch_up()?;
        Ok(Storage::highest_id(self)?)
    }
}
