//! In-memory metadata store.
//!
//! Stores all documents in memory with no persistence. Useful for testing
//! and ephemeral deployments. Uses `RwLock<HashMap>` for thread-safe access;
//! locks are never held across an await point.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::store::{field_matches, Collection, Document, MetadataStore};
use crate::patch::merge_into;

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn find_all(
        &self,
        collection: Collection,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Document>>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.collections.read().expect("rwlock poisoned");
            Ok(inner.get(&collection).cloned().unwrap_or_default())
        })
    }

    fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Document>>> + Send + '_>> {
        let field = field.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let inner = self.collections.read().expect("rwlock poisoned");
            Ok(inner
                .get(&collection)
                .and_then(|docs| docs.iter().find(|d| field_matches(d, &field, &value)))
                .cloned())
        })
    }

    fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.collections.write().expect("rwlock poisoned");
            inner.entry(collection).or_default().push(document);
            Ok(())
        })
    }

    fn merge_update(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        patch: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let field = field.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut inner = self.collections.write().expect("rwlock poisoned");
            let target = inner
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|d| field_matches(d, &field, &value)));
            match target {
                Some(doc) => {
                    merge_into(doc, patch);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let field = field.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut inner = self.collections.write().expect("rwlock poisoned");
            let Some(docs) = inner.get_mut(&collection) else {
                return Ok(false);
            };
            match docs.iter().position(|d| field_matches(d, &field, &value)) {
                Some(idx) => {
                    docs.remove(idx);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }
}
