//! Abstract metadata store trait.
//!
//! The metadata store is a document database: one collection per entity
//! type, each document a flat JSON object.  Documents are addressed by the
//! value of a single string field (`blog_id`, `slug`, `user_id`,
//! `username`).  The trait uses manually desugared async methods (pinned
//! boxed futures) so it stays object-safe behind `Arc<dyn MetadataStore>`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A stored document: a flat JSON object.
pub type Document = serde_json::Map<String, Value>;

/// The document collections the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Posts,
    Users,
}

impl Collection {
    /// Collection name as persisted.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Posts => "blog",
            Collection::Users => "user",
        }
    }

    pub const ALL: [Collection; 2] = [Collection::Posts, Collection::Users];
}

/// Whether `document` has `field` equal to the string `value`.
pub fn field_matches(document: &Document, field: &str, value: &str) -> bool {
    matches!(document.get(field), Some(Value::String(s)) if s == value)
}

/// Serialize a typed record into a document.
pub fn to_document<T: Serialize>(record: &T) -> anyhow::Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object document, got {other}"),
    }
}

/// Deserialize a document into a typed record.
pub fn from_document<T: DeserializeOwned>(document: Document) -> anyhow::Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

// ── Trait ───────────────────────────────────────────────────────────

/// Async document store contract.
pub trait MetadataStore: Send + Sync + 'static {
    /// Every document in `collection`, in insertion order.
    fn find_all(
        &self,
        collection: Collection,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Document>>> + Send + '_>>;

    /// The first document whose `field` equals `value`.
    fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Document>>> + Send + '_>>;

    /// Insert a new document.
    fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Apply `patch` as a top-level field merge to the first document whose
    /// `field` equals `value`.  Fields not in `patch` are untouched.
    /// Returns whether a document matched.
    fn merge_update(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        patch: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;

    /// Delete the first document whose `field` equals `value`.
    /// Returns whether a document was deleted.
    fn delete(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;

    /// Cheap liveness check used by `/health`.
    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rec {
        id: String,
        n: u32,
    }

    #[test]
    fn test_document_round_trip() {
        let rec = Rec {
            id: "a".into(),
            n: 3,
        };
        let doc = to_document(&rec).unwrap();
        assert_eq!(doc["id"], json!("a"));
        assert_eq!(from_document::<Rec>(doc).unwrap(), rec);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(to_document(&5u32).is_err());
    }

    #[test]
    fn test_field_matches_strings_only() {
        let doc = json!({"id": "7", "n": 7}).as_object().cloned().unwrap();
        assert!(field_matches(&doc, "id", "7"));
        assert!(!field_matches(&doc, "n", "7"));
        assert!(!field_matches(&doc, "missing", "7"));
    }
}
