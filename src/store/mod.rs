//! Document store access.
//!
//! [`DocumentStore`] is the read-side seam every source goes through. A store
//! is handed in ready to use; how it authenticates is not our concern.
//! [`LocalStore`] reads a filesystem export, [`MemoryStore`] holds documents
//! in process. [`StoreLayout`] describes where things live.

mod layout;
mod local;
mod memory;

pub use layout::{PassFieldNames, StoreLayout};
pub use local::LocalStore;
pub use memory::MemoryStore;

use serde_json::Value;

use crate::error::Result;
use crate::fields::timestamp_millis;

/// A single stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Lazy, finite, single-pass sequence of query results.
///
/// Items are produced as the underlying source is read; an `Err` item means
/// the read itself broke and the stream should be abandoned.
pub type DocumentStream = Box<dyn Iterator<Item = Result<Document>> + Send>;

/// Server-side query predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the given value exactly.
    Eq { field: String, value: Value },
    /// Field is a number and `>= min`.
    NumberAtLeast { field: String, min: f64 },
    /// Field is a structured timestamp at or after `min_ms`.
    TimestampAtLeast { field: String, min_ms: i64 },
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. }
            | Filter::NumberAtLeast { field, .. }
            | Filter::TimestampAtLeast { field, .. } => field,
        }
    }

    /// Whether `doc` satisfies this predicate. Documents missing the field,
    /// or holding a value of another type, never match.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => doc.data.get(field) == Some(value),
            Filter::NumberAtLeast { field, min } => doc
                .data
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *min),
            Filter::TimestampAtLeast { field, min_ms } => doc
                .data
                .get(field)
                .filter(|v| !v.is_number())
                .and_then(timestamp_millis)
                .is_some_and(|ts| ts >= *min_ms),
        }
    }
}

/// Read access to collections of documents.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of the collection at `path`. A missing collection is empty.
    async fn list_documents(&self, path: &str) -> Result<Vec<Document>>;

    /// Opens a lazy stream over `collection` restricted by `filters`.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<DocumentStream>;
}
