use std::collections::{HashMap, HashSet};

use super::{Document, DocumentStream, DocumentStore, Filter};
use crate::error::{Result, StabilityError};

/// In-process document store.
///
/// Reads can be made to fail per collection path, and queries can be made to
/// fail whenever they filter on a given field, which is how a real store
/// behaves when the composite index for that filter is missing.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Document>>,
    failing_paths: HashSet<String>,
    unindexed_fields: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `documents` to the collection at `path`.
    pub fn with_documents(mut self, path: &str, documents: Vec<Document>) -> Self {
        self.collections
            .entry(path.to_string())
            .or_default()
            .extend(documents);
        self
    }

    /// Every read or query of `path` fails.
    pub fn failing_path(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    /// Queries that filter on `field` fail.
    pub fn unindexed_field(mut self, field: &str) -> Self {
        self.unindexed_fields.insert(field.to_string());
        self
    }

    fn check_path(&self, path: &str) -> Result<()> {
        if self.failing_paths.contains(path) {
            return Err(StabilityError::store(format!("read of '{path}' failed")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, path: &str) -> Result<Vec<Document>> {
        self.check_path(path)?;
        Ok(self.collections.get(path).cloned().unwrap_or_default())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<DocumentStream> {
        self.check_path(collection)?;
        if let Some(f) = filters
            .iter()
            .find(|f| self.unindexed_fields.contains(f.field()))
        {
            return Err(StabilityError::store(format!(
                "query on '{collection}' requires an index on '{}'",
                f.field()
            )));
        }

        let docs = self.collections.get(collection).cloned().unwrap_or_default();
        let filters = filters.to_vec();

        Ok(Box::new(
            docs.into_iter()
                .filter(move |d| filters.iter().all(|f| f.matches(d)))
                .map(Ok),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, city: &str) -> Document {
        Document {
            id: id.into(),
            data: json!({"cityId": city, "startTs": 1}),
        }
    }

    #[tokio::test]
    async fn test_query_filters_documents() {
        let store = MemoryStore::new().with_documents("p", vec![doc("1", "a"), doc("2", "b")]);
        let ids: Vec<String> = store
            .query("p", &[Filter::eq("cityId", "b")])
            .await
            .unwrap()
            .map(|d| d.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn test_unindexed_field_rejects_query() {
        let store = MemoryStore::new()
            .with_documents("p", vec![doc("1", "a")])
            .unindexed_field("startTs");
        let filter = Filter::NumberAtLeast {
            field: "startTs".into(),
            min: 0.0,
        };

        assert!(store.query("p", &[filter]).await.is_err());
        assert!(store.query("p", &[Filter::eq("cityId", "a")]).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_path() {
        let store = MemoryStore::new().failing_path("p");
        assert!(store.list_documents("p").await.is_err());
        assert!(store.list_documents("q").await.unwrap().is_empty());
    }
}
