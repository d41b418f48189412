//! Error path E2E tests for logtail.
//!
//! Records that cannot be decoded or indexed are skipped and the consumer
//! keeps going. No test should cause the consumer to stall.

use std::time::Duration;

use pretty_assertions::assert_eq;

use e2e_tests::{append_documents, base_time, fast_config, wait_for_offset, TestHarness};
use logtail_search::{DocType, SearchOptions};
use logtail_types::RecordKind;

const TIMEOUT: Duration = Duration::from_secs(10);

/// A document record with a body that is not a JSON object is skipped.
#[test]
fn test_undecodable_document_is_skipped() {
    let harness = TestHarness::new();
    append_documents(&harness.storage, "good", 3, "valid entry");
    harness
        .storage
        .append(RecordKind::Document, Some("bad"), base_time(), b"{truncated")
        .unwrap();
    append_documents(&harness.storage, "late", 2, "valid entry");

    let handle = harness.start_consumer(fast_config(100));
    wait_for_offset(&handle, 6, TIMEOUT);
    handle.stop();
    drop(handle);

    let searcher = harness.searcher();
    assert_eq!(searcher.count(Some(DocType::Document)).unwrap(), 5);
    assert_eq!(harness.committed_cursor().unwrap().next_offset, 6);
}

/// A document record without a key cannot be indexed and is skipped.
#[test]
fn test_document_without_key_is_skipped() {
    let harness = TestHarness::new();
    harness
        .storage
        .append(RecordKind::Document, None, base_time(), br#"{"title":"orphan"}"#)
        .unwrap();
    append_documents(&harness.storage, "doc", 1, "keyed");

    let handle = harness.start_consumer(fast_config(100));
    wait_for_offset(&handle, 2, TIMEOUT);
    handle.stop();
    drop(handle);

    let searcher = harness.searcher();
    assert!(searcher.search("orphan", SearchOptions::new()).unwrap().is_empty());
    assert_eq!(searcher.count(None).unwrap(), 1);
}

/// A malformed transaction is skipped without touching documents.
#[test]
fn test_malformed_transaction_is_skipped() {
    let harness = TestHarness::new();
    append_documents(&harness.storage, "doc", 2, "survivor");
    harness
        .storage
        .append(RecordKind::Transaction, None, base_time(), br#"{"ops":"doc-0"}"#)
        .unwrap();

    let handle = harness.start_consumer(fast_config(100));
    wait_for_offset(&handle, 3, TIMEOUT);
    handle.stop();
    drop(handle);

    let searcher = harness.searcher();
    assert_eq!(searcher.count(Some(DocType::Document)).unwrap(), 2);
    assert_eq!(searcher.count(Some(DocType::Transaction)).unwrap(), 0);
}
