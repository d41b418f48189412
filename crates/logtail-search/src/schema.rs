//! Tantivy schema definition for the logtail index.
//!
//! Indexes two document types:
//! - Documents: full text of the JSON object, keyed by document key
//! - Transactions: touched keys, keyed by log sequence

use tantivy::schema::{Field, Schema, STORED, STRING, TEXT};

use crate::SearchError;

/// Document types stored in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    Document,
    Transaction,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Document => "document",
            DocType::Transaction => "transaction",
        }
    }

    /// Parse from string, returning None for unknown types.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(DocType::Document),
            "transaction" => Some(DocType::Transaction),
            _ => None,
        }
    }
}

impl std::str::FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown doc type: {}", s))
    }
}

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct SearchSchema {
    schema: Schema,
    /// Document type: "document" or "transaction" (STRING | STORED)
    pub doc_type: Field,
    /// Primary key: document key, or sequence for transactions (STRING | STORED)
    pub doc_id: Field,
    /// Searchable text (TEXT)
    pub text: Field,
    /// Original JSON payload (STORED)
    pub body: Field,
    /// Record timestamp / commit time in milliseconds (STRING | STORED)
    pub timestamp_ms: Field,
    /// Log sequence of the transaction (STRING | STORED), empty for documents
    pub sequence: Field,
}

impl SearchSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a SearchSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            doc_type: field("doc_type")?,
            doc_id: field("doc_id")?,
            text: field("text")?,
            body: field("body")?,
            timestamp_ms: field("timestamp_ms")?,
            sequence: field("sequence")?,
            schema,
        })
    }
}

/// Build the logtail index schema.
pub fn build_logtail_schema() -> SearchSchema {
    let mut schema_builder = Schema::builder();

    let doc_type = schema_builder.add_text_field("doc_type", STRING | STORED);
    let doc_id = schema_builder.add_text_field("doc_id", STRING | STORED);
    let text = schema_builder.add_text_field("text", TEXT);
    let body = schema_builder.add_text_field("body", STORED);
    let timestamp_ms = schema_builder.add_text_field("timestamp_ms", STRING | STORED);
    let sequence = schema_builder.add_text_field("sequence", STRING | STORED);

    let schema = schema_builder.build();

    SearchSchema {
        schema,
        doc_type,
        doc_id,
        text,
        body,
        timestamp_ms,
        sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_schema() {
        let schema = build_logtail_schema();
        assert!(schema.schema.get_field("doc_type").is_ok());
        assert!(schema.schema.get_field("doc_id").is_ok());
        assert!(schema.schema.get_field("body").is_ok());
        assert!(schema.schema.get_field("sequence").is_ok());
    }

    #[test]
    fn test_doc_type_conversion() {
        assert_eq!(DocType::Document.as_str(), "document");
        assert_eq!(DocType::parse("transaction"), Some(DocType::Transaction));
        assert_eq!(DocType::parse("grip"), None);
        assert!("invalid".parse::<DocType>().is_err());
    }

    #[test]
    fn test_from_schema() {
        let original = build_logtail_schema();
        let rebuilt = SearchSchema::from_schema(original.schema().clone()).unwrap();
        assert_eq!(rebuilt.doc_type, original.doc_type);
        assert_eq!(rebuilt.doc_id, original.doc_id);
        assert_eq!(rebuilt.sequence, original.sequence);
    }

    #[test]
    fn test_from_schema_missing_field() {
        let mut builder = Schema::builder();
        builder.add_text_field("doc_type", STRING);
        let err = SearchSchema::from_schema(builder.build()).unwrap_err();
        assert!(err.to_string().contains("doc_id"));
    }
}
