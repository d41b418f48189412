//! In-memory [`RecordStore`] and [`Indexer`] for tests.
//!
//! Both support fault injection so consumer behavior under store outages
//! and indexer rejections can be exercised without RocksDB or Tantivy.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use logtail_types::{Document, Record, RecordKind, Transaction, TxOp};

use crate::error::{IndexError, StoreError};
use crate::indexer::Indexer;
use crate::store::{RecordStream, RecordStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Vector-backed record log.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    stream_starts: Mutex<Vec<u64>>,
    failing_calls: Mutex<HashSet<usize>>,
    fail_highest_id: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record with the next id.
    pub fn append(&self, kind: RecordKind, key: Option<&str>, payload: Vec<u8>) -> u64 {
        let mut records = lock(&self.records);
        let id = records.len() as u64;
        let mut record = Record::new(id, kind, Utc::now(), payload);
        record.key = key.map(str::to_string);
        records.push(record);
        id
    }

    pub fn append_document(&self, key: &str, document: &Document) -> u64 {
        let payload = serde_json::to_vec(document).unwrap_or_default();
        self.append(RecordKind::Document, Some(key), payload)
    }

    pub fn append_transaction(&self, transaction: &Transaction) -> u64 {
        let payload = serde_json::to_vec(transaction).unwrap_or_default();
        self.append(RecordKind::Transaction, None, payload)
    }

    /// Make the `call`-th stream call (1-based) fail.
    pub fn fail_stream_call(&self, call: usize) {
        lock(&self.failing_calls).insert(call);
    }

    /// Make `highest_id` fail until reset.
    pub fn fail_highest_id(&self, fail: bool) {
        self.fail_highest_id.store(fail, Ordering::SeqCst);
    }

    /// Start offsets of every stream call so far, including failed ones.
    pub fn stream_starts(&self) -> Vec<u64> {
        lock(&self.stream_starts).clone()
    }

    pub fn stream_calls(&self) -> usize {
        lock(&self.stream_starts).len()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn stream(&self, start_id: u64, limit: usize) -> Result<RecordStream<'_>, StoreError> {
        let call = {
            let mut starts = lock(&self.stream_starts);
            starts.push(start_id);
            starts.len()
        };
        if lock(&self.failing_calls).contains(&call) {
            return Err(format!("injected store failure on stream call {}", call).into());
        }

        let batch: Vec<Record> = lock(&self.records)
            .iter()
            .filter(|r| r.id >= start_id)
            .take(limit)
            .cloned()
            .collect();
        Ok(Box::new(batch.into_iter().map(Ok)))
    }

    fn highest_id(&self) -> Result<Option<u64>, StoreError> {
        if self.fail_highest_id.load(Ordering::SeqCst) {
            return Err("injected highest_id failure".into());
        }
        Ok(lock(&self.records).last().map(|r| r.id))
    }
}

/// Map-backed indexer that counts calls.
#[derive(Default)]
pub struct MemoryIndexer {
    documents: Mutex<BTreeMap<String, Document>>,
    transactions: Mutex<BTreeMap<u64, (DateTime<Utc>, Transaction)>>,
    metadata: Mutex<BTreeMap<String, serde_json::Value>>,
    rejected_keys: Mutex<HashSet<String>>,
    index_calls: AtomicUsize,
    metadata_writes: AtomicUsize,
    fail_metadata_writes: AtomicBool,
    delay_ms: AtomicUsize,
}

impl MemoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any document or transaction touching `key`.
    pub fn reject_key(&self, key: &str) {
        lock(&self.rejected_keys).insert(key.to_string());
    }

    /// Make `store_metadata` fail until reset.
    pub fn fail_metadata_writes(&self, fail: bool) {
        self.fail_metadata_writes.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every index call.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Number of index_document + index_transaction calls, including rejected ones.
    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_writes(&self) -> usize {
        self.metadata_writes.load(Ordering::SeqCst)
    }

    pub fn document(&self, key: &str) -> Option<Document> {
        lock(&self.documents).get(key).cloned()
    }

    pub fn documents(&self) -> BTreeMap<String, Document> {
        lock(&self.documents).clone()
    }

    pub fn transaction(&self, sequence: u64) -> Option<(DateTime<Utc>, Transaction)> {
        lock(&self.transactions).get(&sequence).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        lock(&self.transactions).len()
    }

    pub fn metadata(&self, key: &str) -> Option<serde_json::Value> {
        lock(&self.metadata).get(key).cloned()
    }

    fn enter(&self) {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }
    }

    fn check_key(&self, key: &str) -> Result<(), IndexError> {
        if lock(&self.rejected_keys).contains(key) {
            return Err(format!("key {} rejected", key).into());
        }
        Ok(())
    }
}

impl Indexer for MemoryIndexer {
    fn index_document(&self, key: &str, document: &Document) -> Result<(), IndexError> {
        self.enter();
        self.check_key(key)?;
        lock(&self.documents).insert(key.to_string(), document.clone());
        Ok(())
    }

    fn index_transaction(
        &self,
        transaction: &Transaction,
        commit_time: DateTime<Utc>,
        sequence: u64,
    ) -> Result<(), IndexError> {
        self.enter();
        for op in &transaction.ops {
            self.check_key(op.key())?;
        }

        let mut documents = lock(&self.documents);
        for op in &transaction.ops {
            if let TxOp::Delete { key } = op {
                documents.remove(key);
            }
        }
        lock(&self.transactions).insert(sequence, (commit_time, transaction.clone()));
        Ok(())
    }

    fn read_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, IndexError> {
        Ok(self.metadata(key))
    }

    fn store_metadata(&self, key: &str, value: serde_json::Value) -> Result<(), IndexError> {
        if self.fail_metadata_writes.load(Ordering::SeqCst) {
            return Err("injected metadata write failure".into());
        }
        lock(&self.metadata).insert(key.to_string(), value);
        self.metadata_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_stream() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append_document(&format!("k{}", i), &Document::new());
        }

        let ids: Vec<u64> = store.stream(1, 2).unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.highest_id().unwrap(), Some(4));
        assert_eq!(store.stream_starts(), vec![1]);
    }

    #[test]
    fn test_memory_store_injected_failure() {
        let store = MemoryStore::new();
        store.fail_stream_call(2);

        assert!(store.stream(0, 10).is_ok());
        assert!(store.stream(0, 10).is_err());
        assert!(store.stream(0, 10).is_ok());
        assert_eq!(store.stream_calls(), 3);
    }

    #[test]
    fn test_memory_indexer_transaction_delete() {
        let indexer = MemoryIndexer::new();
        indexer.index_document("a", &Document::new()).unwrap();
        indexer
            .index_transaction(
                &Transaction::new(vec![TxOp::Delete { key: "a".into() }]),
                Utc::now(),
                1,
            )
            .unwrap();

        assert!(indexer.document("a").is_none());
        assert_eq!(indexer.transaction_count(), 1);
        assert_eq!(indexer.index_calls(), 2);
    }
}
