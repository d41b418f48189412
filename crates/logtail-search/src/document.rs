//! Document mapping from log payloads to Tantivy documents.

use chrono::{DateTime, Utc};
use tantivy::doc;
use tantivy::TantivyDocument;

use logtail_types::{Document, Transaction};

use crate::schema::{DocType, SearchSchema};

/// Convert a log document to a Tantivy document.
///
/// Text field contains every string value in the object.
pub fn document_to_doc(schema: &SearchSchema, key: &str, document: &Document) -> TantivyDocument {
    let body = serde_json::to_string(&document.fields).unwrap_or_default();

    doc!(
        schema.doc_type => DocType::Document.as_str(),
        schema.doc_id => key,
        schema.text => document.text(),
        schema.body => body,
        schema.timestamp_ms => "",
        schema.sequence => ""
    )
}

/// Convert a transaction to a Tantivy document.
///
/// Text field contains the keys the transaction touches.
pub fn transaction_to_doc(
    schema: &SearchSchema,
    transaction: &Transaction,
    commit_time: DateTime<Utc>,
    sequence: u64,
) -> TantivyDocument {
    let keys: Vec<&str> = transaction.ops.iter().map(|op| op.key()).collect();
    let body = serde_json::to_string(transaction).unwrap_or_default();
    let sequence = sequence.to_string();

    doc!(
        schema.doc_type => DocType::Transaction.as_str(),
        schema.doc_id => sequence.clone(),
        schema.text => keys.join(" "),
        schema.body => body,
        schema.timestamp_ms => commit_time.timestamp_millis().to_string(),
        schema.sequence => sequence
    )
}
