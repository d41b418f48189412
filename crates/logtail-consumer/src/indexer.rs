//! Indexer interface driven by the record processor.

use chrono::{DateTime, Utc};

use logtail_search::SearchIndexer;
use logtail_types::{Document, Transaction};

use crate::error::IndexError;

/// Downstream index plus the key/value metadata store that holds the cursor.
///
/// Applying the same document or transaction twice must leave the index in
/// the same state as applying it once, since a crash mid-batch replays the
/// whole batch.
pub trait Indexer: Send + Sync {
    /// Index `document` under `key`.
    fn index_document(&self, key: &str, document: &Document) -> Result<(), IndexError>;

    /// Index a transaction with its commit time and log sequence.
    fn index_transaction(
        &self,
        transaction: &Transaction,
        commit_time: DateTime<Utc>,
        sequence: u64,
    ) -> Result<(), IndexError>;

    fn read_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, IndexError>;

    /// Durably store a metadata value, overwriting any previous one.
    fn store_metadata(&self, key: &str, value: serde_json::Value) -> Result<(), IndexError>;
}

impl Indexer for SearchIndexer {
    fn index_document(&self, key: &str, document: &Document) -> Result<(), IndexError> {
        Ok(SearchIndexer::index_document(self, key, document)?)
    }

    fn index_transaction(
        &self,
        transaction: &Transaction,
        commit_time: DateTime<Utc>,
        sequence: u64,
    ) -> Result<(), IndexError> {
        Ok(SearchIndexer::index_transaction(
            self,
            transaction,
            commit_time,
            sequence,
        )?)
    }

    fn read_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, IndexError> {
        Ok(SearchIndexer::read_metadata(self, key)?)
    }

    fn store_metadata(&self, key: &str, value: serde_json::Value) -> Result<(), IndexError> {
        SearchIndexer::store_metadata(self, key, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtail_search::{SearchIndex, SearchIndexConfig};
    use tempfile::TempDir;

    #[test]
    fn test_search_indexer_metadata_through_trait() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let search_indexer = SearchIndexer::new(&index).unwrap();
        let indexer: &dyn Indexer = &search_indexer;

        assert!(indexer.read_metadata("k").unwrap().is_none());
        indexer.store_metadata("k", serde_json::json!(3)).unwrap();
        assert_eq!(indexer.read_metadata("k").unwrap(), Some(serde_json::json!(3)));
    }
}
