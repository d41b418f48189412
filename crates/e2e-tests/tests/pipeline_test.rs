//! End-to-end pipeline tests for logtail.
//!
//! Append records to RocksDB, let the consumer index them into Tantivy, and
//! verify the committed cursor and search results.

use std::time::Duration;

use pretty_assertions::assert_eq;

use e2e_tests::{
    append_documents, append_transaction, base_time, fast_config, wait_for_offset, TestHarness,
};
use logtail_search::{DocType, SearchOptions};
use logtail_types::{Transaction, TxOp};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Full pipeline: append, consume in several batches, search.
#[test]
fn test_full_pipeline_append_consume_search() {
    let harness = TestHarness::new();
    append_documents(
        &harness.storage,
        "rust",
        12,
        "Rust memory safety and borrow checker ensures safe concurrency",
    );
    append_documents(&harness.storage, "py", 8, "Python asyncio event loop scheduling");

    let handle = harness.start_consumer(fast_config(5));
    wait_for_offset(&handle, 20, TIMEOUT);
    handle.stop();
    drop(handle);

    let cursor = harness.committed_cursor().unwrap();
    assert_eq!(cursor.next_offset, 20);
    assert_eq!(cursor.lag, 0);
    // last record is py-7, 700ms after the base time
    assert_eq!(
        cursor.last_time,
        Some(base_time() + chrono::Duration::milliseconds(700))
    );

    let searcher = harness.searcher();
    assert_eq!(searcher.count(Some(DocType::Document)).unwrap(), 20);

    let hits = searcher
        .search("borrow checker", SearchOptions::new().with_limit(50))
        .unwrap();
    assert_eq!(hits.len(), 12);
    assert!(hits.iter().all(|hit| hit.doc_id.starts_with("rust-")));

    let hits = searcher.search("asyncio", SearchOptions::new()).unwrap();
    assert_eq!(hits.len(), 8);
}

/// Transactions are indexed by sequence and their deletes remove documents.
#[test]
fn test_transaction_deletes_documents() {
    let harness = TestHarness::new();
    append_documents(&harness.storage, "doc", 4, "quarterly report draft");
    let sequence = append_transaction(
        &harness.storage,
        &Transaction::new(vec![
            TxOp::Delete { key: "doc-1".into() },
            TxOp::Delete { key: "doc-2".into() },
            TxOp::Put { key: "doc-3".into() },
        ]),
    );
    assert_eq!(sequence, 4);

    let handle = harness.start_consumer(fast_config(100));
    wait_for_offset(&handle, 5, TIMEOUT);
    handle.stop();
    drop(handle);

    let searcher = harness.searcher();
    assert_eq!(searcher.count(Some(DocType::Document)).unwrap(), 2);
    assert_eq!(searcher.count(Some(DocType::Transaction)).unwrap(), 1);

    let hits = searcher
        .search(
            "quarterly",
            SearchOptions::new().with_doc_type(DocType::Document),
        )
        .unwrap();
    let mut ids: Vec<String> = hits.into_iter().map(|hit| hit.doc_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["doc-0".to_string(), "doc-3".to_string()]);
}

/// Records appended while the consumer idles are picked up.
#[test]
fn test_consumer_follows_live_appends() {
    let harness = TestHarness::new();

    let handle = harness.start_consumer(fast_config(10));
    for round in 0..3 {
        append_documents(&harness.storage, &format!("live{}", round), 5, "streaming append");
        wait_for_offset(&handle, 5 * (round as u64 + 1), TIMEOUT);
    }
    handle.stop();
    drop(handle);

    let searcher = harness.searcher();
    assert_eq!(searcher.count(None).unwrap(), 15);
    assert!(harness.committed_cursor().unwrap().is_caught_up());
}

/// A consumer on a secondary instance follows a primary that keeps appending.
#[test]
fn test_follower_tracks_growing_primary() {
    let harness = TestHarness::new();
    append_documents(&harness.storage, "seed", 3, "written before start");

    let handle = harness.start_consumer_on(harness.open_follower(), fast_config(10));
    wait_for_offset(&handle, 3, TIMEOUT);

    for round in 0..3u64 {
        append_documents(&harness.storage, &format!("grow{}", round), 4, "written while tailing");
        wait_for_offset(&handle, 3 + 4 * (round + 1), TIMEOUT);
    }
    handle.stop();
    drop(handle);

    let cursor = harness.committed_cursor().unwrap();
    assert_eq!(cursor.next_offset, 15);
    assert!(cursor.is_caught_up());

    let hits = harness
        .searcher()
        .search("tailing", SearchOptions::new().with_limit(50))
        .unwrap();
    assert_eq!(hits.len(), 12);
}
