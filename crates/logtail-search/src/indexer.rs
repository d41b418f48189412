//! Indexer for applying log records to the Tantivy index.
//!
//! The indexer wraps IndexWriter behind a Mutex. Documents are not visible
//! until a commit. Key/value metadata is serialized into the commit payload,
//! so every commit persists the metadata together with pending documents.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{IndexWriter, Term};
use tracing::{debug, info};

use logtail_types::{Document, Transaction, TxOp};

use crate::document::{document_to_doc, transaction_to_doc};
use crate::error::SearchError;
use crate::index::SearchIndex;
use crate::schema::{DocType, SearchSchema};

type Metadata = BTreeMap<String, serde_json::Value>;

/// Applies documents and transactions to the index and owns its metadata.
pub struct SearchIndexer {
    writer: Mutex<IndexWriter>,
    schema: SearchSchema,
    metadata: Mutex<Metadata>,
}

impl SearchIndexer {
    /// Create a new indexer from a SearchIndex, loading committed metadata.
    pub fn new(index: &SearchIndex) -> Result<Self, SearchError> {
        let writer = index.writer()?;
        let schema = index.schema().clone();

        let metadata = match index.committed_payload()? {
            Some(payload) if !payload.is_empty() => serde_json::from_str(&payload)?,
            _ => Metadata::new(),
        };
        debug!(keys = metadata.len(), "Loaded index metadata");

        Ok(Self {
            writer: Mutex::new(writer),
            schema,
            metadata: Mutex::new(metadata),
        })
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>, SearchError> {
        self.writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    fn lock_metadata(&self) -> Result<MutexGuard<'_, Metadata>, SearchError> {
        self.metadata
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    /// Query matching one (doc_type, doc_id) pair
    fn identity_query(&self, doc_type: DocType, doc_id: &str) -> Box<dyn Query> {
        let type_term = Term::from_field_text(self.schema.doc_type, doc_type.as_str());
        let id_term = Term::from_field_text(self.schema.doc_id, doc_id);
        Box::new(BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(TermQuery::new(type_term, IndexRecordOption::Basic)) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(id_term, IndexRecordOption::Basic)),
            ),
        ]))
    }

    /// Index a document under `key`.
    ///
    /// Any existing document with the same key is replaced, so applying the
    /// same document twice leaves a single copy.
    pub fn index_document(&self, key: &str, document: &Document) -> Result<(), SearchError> {
        let doc = document_to_doc(&self.schema, key, document);
        let writer = self.lock_writer()?;

        writer.delete_query(self.identity_query(DocType::Document, key))?;
        writer.add_document(doc)?;

        debug!(key, "Indexed document");
        Ok(())
    }

    /// Index a transaction committed at `commit_time` with log sequence `sequence`.
    ///
    /// Delete operations remove the referenced documents. Re-applying the
    /// same transaction replaces its previous entry.
    pub fn index_transaction(
        &self,
        transaction: &Transaction,
        commit_time: DateTime<Utc>,
        sequence: u64,
    ) -> Result<(), SearchError> {
        let doc = transaction_to_doc(&self.schema, transaction, commit_time, sequence);
        let writer = self.lock_writer()?;

        for op in &transaction.ops {
            if let TxOp::Delete { key } = op {
                writer.delete_query(self.identity_query(DocType::Document, key))?;
            }
        }

        writer.delete_query(self.identity_query(DocType::Transaction, &sequence.to_string()))?;
        writer.add_document(doc)?;

        debug!(sequence, ops = transaction.ops.len(), "Indexed transaction");
        Ok(())
    }

    /// Read a metadata value from the last committed (or pending) state.
    pub fn read_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, SearchError> {
        Ok(self.lock_metadata()?.get(key).cloned())
    }

    /// Store a metadata value and commit it together with pending documents.
    pub fn store_metadata(&self, key: &str, value: serde_json::Value) -> Result<u64, SearchError> {
        let mut writer = self.lock_writer()?;
        let mut metadata = self.lock_metadata()?;

        let mut next = metadata.clone();
        next.insert(key.to_string(), value);

        let opstamp = commit_with_payload(&mut writer, &next)?;
        *metadata = next;

        debug!(key, opstamp, "Stored metadata");
        Ok(opstamp)
    }

    /// Commit pending changes, carrying the current metadata forward.
    pub fn commit(&self) -> Result<u64, SearchError> {
        let mut writer = self.lock_writer()?;
        let metadata = self.lock_metadata()?;
        let opstamp = commit_with_payload(&mut writer, &metadata)?;
        info!(opstamp, "Committed index changes");
        Ok(opstamp)
    }
}

fn commit_with_payload(writer: &mut IndexWriter, metadata: &Metadata) -> Result<u64, SearchError> {
    let payload = serde_json::to_string(metadata)?;
    let mut prepared = writer.prepare_commit()?;
    prepared.set_payload(&payload);
    Ok(prepared.commit()?)
}
