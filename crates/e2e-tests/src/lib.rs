//! End-to-end test infrastructure for logtail.
//!
//! Provides a shared TestHarness and helper functions for E2E tests that run
//! the consumer against a real RocksDB record log and Tantivy index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use logtail_consumer::{ConsumerConfig, ConsumerHandle, Cursor, LogConsumer, CURSOR_KEY};
use logtail_search::{SearchIndex, SearchIndexConfig, SearchIndexer, TantivySearcher};
use logtail_storage::Storage;
use logtail_types::{Document, RecordKind, Transaction};

/// Shared test harness for E2E tests.
///
/// Owns the record log. The index is reopened on demand because Tantivy
/// allows a single writer per directory, so each consumer run gets a fresh
/// indexer and drops it when stopped.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared record log
    pub storage: Arc<Storage>,
    /// Path of the record log owned by `storage`
    pub log_path: PathBuf,
    /// Path for index files
    pub index_path: PathBuf,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let log_path = temp_dir.path().join("log");
        let storage = Arc::new(Storage::open(&log_path).expect("Failed to open test storage"));
        let index_path = temp_dir.path().join("index");

        Self {
            _temp_dir: temp_dir,
            storage,
            log_path,
            index_path,
        }
    }

    pub fn open_index(&self) -> SearchIndex {
        SearchIndex::open_or_create(SearchIndexConfig::new(&self.index_path))
            .expect("Failed to open index")
    }

    /// Open a writer on the index. Drop it before opening another.
    pub fn open_indexer(&self) -> Arc<SearchIndexer> {
        Arc::new(SearchIndexer::new(&self.open_index()).expect("Failed to open indexer"))
    }

    pub fn searcher(&self) -> TantivySearcher {
        TantivySearcher::new(&self.open_index()).expect("Failed to open searcher")
    }

    /// Secondary instance of the log, as a separate tailing process would open it.
    pub fn open_follower(&self) -> Arc<Storage> {
        let follower_path = self._temp_dir.path().join("follower");
        Arc::new(
            Storage::open_secondary(&self.log_path, &follower_path)
                .expect("Failed to open follower"),
        )
    }

    /// Start a consumer with its own indexer.
    pub fn start_consumer(&self, config: ConsumerConfig) -> ConsumerHandle {
        self.start_consumer_on(self.storage.clone(), config)
    }

    /// Start a consumer reading `store` instead of the primary.
    pub fn start_consumer_on(&self, store: Arc<Storage>, config: ConsumerConfig) -> ConsumerHandle {
        LogConsumer::new(store, self.open_indexer(), config)
            .start()
            .expect("Failed to start consumer")
    }

    /// Cursor as committed in the index.
    pub fn committed_cursor(&self) -> Option<Cursor> {
        let payload = self
            .open_index()
            .committed_payload()
            .expect("Failed to read commit payload")?;
        let mut metadata: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&payload).ok()?;
        metadata
            .remove(CURSOR_KEY)
            .map(|value| Cursor::from_value(value).expect("Corrupt cursor"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer settings tuned for tests: short idle sleep and restart backoff.
pub fn fast_config(batch_limit: usize) -> ConsumerConfig {
    ConsumerConfig::default()
        .with_batch_limit(batch_limit)
        .with_idle_interval(Duration::from_millis(5))
        .with_restart_backoff(Duration::from_millis(100))
}

/// Fixed base time so record timestamps are predictable.
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_706_540_400_000).unwrap()
}

/// Append `count` documents keyed `{prefix}-{i}`, 100ms apart.
///
/// Returns the assigned record ids.
pub fn append_documents(
    storage: &Storage,
    prefix: &str,
    count: usize,
    base_text: &str,
) -> Vec<u64> {
    (0..count)
        .map(|i| {
            let document = Document::new()
                .with_field("title", format!("{} {}", prefix, i))
                .with_field("body", format!("{} (entry {})", base_text, i));
            let payload = document.to_bytes().expect("Failed to encode document");
            let timestamp = base_time() + chrono::Duration::milliseconds(i as i64 * 100);
            storage
                .append(
                    RecordKind::Document,
                    Some(&format!("{}-{}", prefix, i)),
                    timestamp,
                    &payload,
                )
                .expect("Failed to append document")
        })
        .collect()
}

pub fn append_transaction(storage: &Storage, transaction: &Transaction) -> u64 {
    storage
        .append_transaction(transaction)
        .expect("Failed to append transaction")
}

/// Block until the consumer publishes `offset`, or panic after `timeout`.
pub fn wait_for_offset(handle: &ConsumerHandle, offset: u64, timeout: Duration) {
    let progress = handle.subscribe();
    let deadline = Instant::now() + timeout;
    loop {
        let current = progress.borrow().as_ref().map(|c| c.next_offset);
        if current == Some(offset) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "consumer stuck at {:?}, expected {}",
            current,
            offset
        );
        std::thread::sleep(Duration::from_millis(10));
    }
}
