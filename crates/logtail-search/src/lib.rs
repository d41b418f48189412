//! # logtail-search
//!
//! Tantivy-backed index driven by the logtail consumer.
//!
//! ## Features
//! - Embedded Tantivy index with MmapDirectory for persistence
//! - Schema covering documents (by key) and transactions (by sequence)
//! - Idempotent upserts: re-applying a record leaves one copy in the index
//! - Key/value metadata carried in the commit payload, so metadata and the
//!   documents it describes become durable in the same commit
//! - BM25 search over document text

pub mod document;
pub mod error;
pub mod index;
pub mod indexer;
pub mod schema;
pub mod searcher;

pub use document::{document_to_doc, transaction_to_doc};
pub use error::SearchError;
pub use index::{open_or_create_index, SearchIndex, SearchIndexConfig};
pub use indexer::SearchIndexer;
pub use schema::{build_logtail_schema, DocType, SearchSchema};
pub use searcher::{SearchHit, SearchOptions, TantivySearcher};
