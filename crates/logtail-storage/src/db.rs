//! RocksDB wrapper for the logtail record log.
//!
//! Provides:
//! - Database open with column family setup
//! - Serialized appends with strictly increasing ids
//! - Lazy ascending range iteration
//! - Highest-id lookup
//! - Secondary instances that follow a primary owned by another process

use chrono::{DateTime, Utc};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use logtail_types::{Document, Record, RecordKind, Transaction};

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_RECORDS};
use crate::error::StorageError;
use crate::keys::{decode_value, encode_value, RecordKey};

/// Main storage interface for the record log
pub struct Storage {
    db: DB,
    /// Next id to hand out
    next_id: AtomicU64,
    /// Serializes id assignment with the write so ids become visible in order
    append_lock: Mutex<()>,
    /// Opened with `open_secondary`; reads must catch up with the primary
    secondary: bool,
}

impl Storage {
    /// Open storage at the given path, creating if necessary.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening record log at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        // Universal compaction for append-only workload
        db_opts.set_compaction_style(rocksdb::DBCompactionStyle::Universal);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let next_id = Self::load_highest_id(&db)?.map_or(0, |id| id + 1);
        debug!(next_id, "Recovered record id counter");

        Ok(Self {
            db,
            next_id: AtomicU64::new(next_id),
            append_lock: Mutex::new(()),
            secondary: false,
        })
    }

    /// Open existing storage without taking the write lock.
    ///
    /// Used for inspection while another process owns the log. Appends fail.
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        debug!("Opening record log read-only at {:?}", path);

        let db = DB::open_cf_for_read_only(&Options::default(), path, ALL_CF_NAMES, false)?;
        let next_id = Self::load_highest_id(&db)?.map_or(0, |id| id + 1);

        Ok(Self {
            db,
            next_id: AtomicU64::new(next_id),
            append_lock: Mutex::new(()),
            secondary: false,
        })
    }

    /// Open a secondary instance following the primary at `primary_path`.
    ///
    /// The primary may be held by another process that keeps appending.
    /// `secondary_path` holds this instance's own info logs. New records
    /// become visible after [`Storage::catch_up`]. Appends fail.
    pub fn open_secondary(
        primary_path: &Path,
        secondary_path: &Path,
    ) -> Result<Self, StorageError> {
        info!(
            "Opening record log at {:?} as secondary in {:?}",
            primary_path, secondary_path
        );

        let mut db_opts = Options::default();
        // secondary instances must keep every table file open
        db_opts.set_max_open_files(-1);

        let db = DB::open_cf_as_secondary(&db_opts, primary_path, secondary_path, ALL_CF_NAMES)?;
        let next_id = Self::load_highest_id(&db)?.map_or(0, |id| id + 1);

        Ok(Self {
            db,
            next_id: AtomicU64::new(next_id),
            append_lock: Mutex::new(()),
            secondary: true,
        })
    }

    pub fn is_secondary(&self) -> bool {
        self.secondary
    }

    /// Replay the primary's latest writes into a secondary instance.
    ///
    /// No-op for primary and read-only instances.
    pub fn catch_up(&self) -> Result<(), StorageError> {
        if self.secondary {
            self.db.try_catch_up_with_primary()?;
        }
        Ok(())
    }

    fn records_cf(db: &DB) -> Result<&rocksdb::ColumnFamily, StorageError> {
        db.cf_handle(CF_RECORDS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_RECORDS.to_string()))
    }

    /// Find the highest stored id by iterating from the end
    fn load_highest_id(db: &DB) -> Result<Option<u64>, StorageError> {
        let cf = Self::records_cf(db)?;
        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            return Ok(Some(RecordKey::from_bytes(&key)?.id));
        }
        Ok(None)
    }

    /// Append a record and return its assigned id.
    ///
    /// Id assignment and the write happen under one lock, so a reader never
    /// observes id N+1 before id N.
    pub fn append(
        &self,
        kind: RecordKind,
        key: Option<&str>,
        timestamp: DateTime<Utc>,
        payload: &[u8],
    ) -> Result<u64, StorageError> {
        let cf = Self::records_cf(&self.db)?;

        let _guard = self
            .append_lock
            .lock()
            .map_err(|e| StorageError::Poisoned(e.to_string()))?;

        let id = self.next_id.load(Ordering::SeqCst);
        let mut record = Record::new(id, kind, timestamp, payload.to_vec());
        record.key = key.map(str::to_string);

        self.db
            .put_cf(cf, RecordKey::new(id).to_bytes(), encode_value(&record)?)?;
        self.next_id.store(id + 1, Ordering::SeqCst);

        debug!(id, kind = %kind, key = ?key, "Appended record");
        Ok(id)
    }

    /// Append a document record under `key`.
    pub fn append_document(&self, key: &str, document: &Document) -> Result<u64, StorageError> {
        let payload = document.to_bytes()?;
        self.append(RecordKind::Document, Some(key), Utc::now(), &payload)
    }

    /// Append a transaction record.
    pub fn append_transaction(&self, transaction: &Transaction) -> Result<u64, StorageError> {
        let payload = transaction.to_bytes()?;
        self.append(RecordKind::Transaction, None, Utc::now(), &payload)
    }

    /// Iterate records with `id >= start_id` in ascending id order.
    ///
    /// Records are decoded one at a time as the iterator advances.
    pub fn iter_from(
        &self,
        start_id: u64,
    ) -> Result<impl Iterator<Item = Result<Record, StorageError>> + '_, StorageError> {
        let cf = Self::records_cf(&self.db)?;
        let start_key = RecordKey::new(start_id).to_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start_key, Direction::Forward));

        Ok(iter.map(|item| {
            let (key, value) = item?;
            let id = RecordKey::from_bytes(&key)?.id;
            decode_value(id, &value)
        }))
    }

    /// Get records with `id >= start_id`, at most `limit` of them.
    pub fn get_records(&self, start_id: u64, limit: usize) -> Result<Vec<Record>, StorageError> {
        self.iter_from(start_id)?.take(limit).collect()
    }

    /// Highest id currently stored, or None for an empty log
    pub fn highest_id(&self) -> Result<Option<u64>, StorageError> {
        Self::load_highest_id(&self.db)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let cf = Self::records_cf(&self.db)?;
        let mut record_count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            record_count += 1;
        }

        Ok(StorageStats {
            record_count,
            highest_id: self.highest_id()?,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    fn get_disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

/// Statistics about the record log.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of records stored
    pub record_count: u64,
    /// Highest record id, if any
    pub highest_id: Option<u64>,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtail_types::TxOp;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    fn sample_document(i: usize) -> Document {
        Document::new()
            .with_field("title", format!("doc {}", i))
            .with_field("n", i)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_empty_log() {
        let (storage, _temp) = create_test_storage();
        assert_eq!(storage.highest_id().unwrap(), None);
        assert!(storage.get_records(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let (storage, _temp) = create_test_storage();

        let a = storage.append_document("a", &sample_document(0)).unwrap();
        let b = storage
            .append_transaction(&Transaction::new(vec![TxOp::Put { key: "a".into() }]))
            .unwrap();
        let c = storage.append_document("c", &sample_document(2)).unwrap();

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(storage.highest_id().unwrap(), Some(2));
    }

    #[test]
    fn test_appended_record_reads_back() {
        let (storage, _temp) = create_test_storage();
        let id = storage.append_document("doc-1", &sample_document(1)).unwrap();

        let records = storage.get_records(id, 1).unwrap();
        let record = &records[0];
        assert_eq!(record.id, id);
        assert_eq!(record.kind, RecordKind::Document);
        assert_eq!(record.key.as_deref(), Some("doc-1"));
        assert_eq!(record.decode_document().unwrap(), sample_document(1));
    }

    #[test]
    fn test_get_records_with_limit() {
        let (storage, _temp) = create_test_storage();
        for i in 0..5 {
            storage
                .append_document(&format!("k{}", i), &sample_document(i))
                .unwrap();
        }

        let records = storage.get_records(0, 3).unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_get_records_from_offset() {
        let (storage, _temp) = create_test_storage();
        for i in 0..5 {
            storage
                .append_document(&format!("k{}", i), &sample_document(i))
                .unwrap();
        }

        let records = storage.get_records(2, 10).unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(records[0].key.as_deref(), Some("k2"));

        assert!(storage.get_records(5, 10).unwrap().is_empty());
    }

    #[test]
    fn test_id_counter_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            for i in 0..3 {
                storage
                    .append_document(&format!("k{}", i), &sample_document(i))
                    .unwrap();
            }
            storage.flush().unwrap();
        }

        let storage = Storage::open(temp_dir.path()).unwrap();
        let id = storage.append_document("k3", &sample_document(3)).unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn test_read_only_sees_records() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            storage.append_document("a", &sample_document(0)).unwrap();
            storage.append_document("b", &sample_document(1)).unwrap();
            storage.flush().unwrap();
        }

        let storage = Storage::open_read_only(temp_dir.path()).unwrap();
        assert_eq!(storage.highest_id().unwrap(), Some(1));
        assert_eq!(storage.get_records(0, 10).unwrap().len(), 2);
        assert!(storage.append_document("c", &sample_document(2)).is_err());
    }

    #[test]
    fn test_secondary_follows_primary_after_catch_up() {
        let temp_dir = TempDir::new().unwrap();
        let primary_path = temp_dir.path().join("primary");
        let primary = Storage::open(&primary_path).unwrap();
        primary.append_document("a", &sample_document(0)).unwrap();
        primary.flush().unwrap();

        let secondary =
            Storage::open_secondary(&primary_path, &temp_dir.path().join("secondary")).unwrap();
        assert!(secondary.is_secondary());
        assert_eq!(secondary.highest_id().unwrap(), Some(0));

        primary.append_document("b", &sample_document(1)).unwrap();
        primary.append_document("c", &sample_document(2)).unwrap();
        secondary.catch_up().unwrap();

        assert_eq!(secondary.highest_id().unwrap(), Some(2));
        let keys: Vec<String> = secondary
            .get_records(1, 10)
            .unwrap()
            .into_iter()
            .filter_map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
        assert!(secondary.append_document("d", &sample_document(3)).is_err());
    }

    #[test]
    fn test_catch_up_is_noop_for_primary() {
        let (storage, _temp) = create_test_storage();
        assert!(!storage.is_secondary());
        storage.catch_up().unwrap();
    }

    #[test]
    fn test_concurrent_appends_are_gap_free() {
        let (storage, _temp) = create_test_storage();
        let storage = Arc::new(storage);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        storage
                            .append_document(&format!("t{}-{}", t, i), &sample_document(i))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: Vec<u64> = storage
            .get_records(0, 1000)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, (0..100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_stats() {
        let (storage, _temp) = create_test_storage();
        storage.append_document("a", &sample_document(0)).unwrap();
        storage.append_document("b", &sample_document(1)).unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.record_count, 2);
        assert_eq!(stats.highest_id, Some(1));
    }
}
