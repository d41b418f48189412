//! Search implementation using BM25 scoring.
//!
//! Provides keyword search over indexed documents and transactions.

use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{IndexReader, TantivyDocument, Term};
use tracing::debug;

use crate::error::SearchError;
use crate::index::SearchIndex;
use crate::schema::{DocType, SearchSchema};

/// A search result with relevance score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Document key, or sequence for transactions
    pub doc_id: String,
    pub doc_type: DocType,
    /// BM25 relevance score
    pub score: f32,
    /// Commit time in milliseconds (transactions only)
    pub timestamp_ms: Option<i64>,
    /// Stored JSON payload
    pub body: Option<String>,
}

/// Search options for filtering and limiting results.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Filter by document type (None = all types)
    pub doc_type: Option<DocType>,
    /// Maximum results to return
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            doc_type: None,
            limit: 10,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }
}

/// Read-side view of the index.
pub struct TantivySearcher {
    reader: IndexReader,
    schema: SearchSchema,
    query_parser: QueryParser,
}

impl TantivySearcher {
    pub fn new(index: &SearchIndex) -> Result<Self, SearchError> {
        let reader = index.reader()?;
        let schema = index.schema().clone();
        let query_parser = QueryParser::for_index(index.index(), vec![schema.text]);

        Ok(Self {
            reader,
            schema,
            query_parser,
        })
    }

    /// Reload the reader to see recent commits.
    pub fn reload(&self) -> Result<(), SearchError> {
        self.reader.reload()?;
        debug!("Reloaded search reader");
        Ok(())
    }

    fn type_filter(&self, doc_type: DocType) -> Box<dyn Query> {
        let term = Term::from_field_text(self.schema.doc_type, doc_type.as_str());
        Box::new(TermQuery::new(term, IndexRecordOption::Basic))
    }

    /// Search with a query string. Empty queries return no hits.
    pub fn search(
        &self,
        query_str: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query_str.trim().is_empty() || options.limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let text_query = self.query_parser.parse_query(query_str)?;

        let query: Box<dyn Query> = match options.doc_type {
            Some(doc_type) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, text_query),
                (Occur::Must, self.type_filter(doc_type)),
            ])),
            None => text_query,
        };

        let top_docs = searcher.search(&query, &TopDocs::with_limit(options.limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let text = |field: tantivy::schema::Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };

            let Some(doc_type) = text(self.schema.doc_type).and_then(|s| DocType::parse(&s)) else {
                continue;
            };

            hits.push(SearchHit {
                doc_id: text(self.schema.doc_id).unwrap_or_default(),
                doc_type,
                score,
                timestamp_ms: text(self.schema.timestamp_ms).and_then(|s| s.parse().ok()),
                body: text(self.schema.body),
            });
        }

        debug!(query = query_str, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Count indexed entries, optionally restricted to one type.
    pub fn count(&self, doc_type: Option<DocType>) -> Result<usize, SearchError> {
        let searcher = self.reader.searcher();
        let count = match doc_type {
            Some(doc_type) => searcher.search(&self.type_filter(doc_type), &Count)?,
            None => searcher.search(&AllQuery, &Count)?,
        };
        Ok(count)
    }

    /// Number of live documents in the index
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}
