//! Store doubles for exercising partial failures in service flows.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::metadata::memory::MemoryMetadataStore;
use crate::metadata::store::{Collection, Document, MetadataStore};
use crate::storage::backend::MediaStore;
use crate::storage::memory::MemoryMediaStore;

/// In-memory media store that counts calls and can be told to fail.
#[derive(Default)]
pub struct FlakyMedia {
    pub inner: MemoryMediaStore,
    pub fail_put: AtomicBool,
    pub fail_remove: AtomicBool,
    pub calls: AtomicUsize,
}

impl FlakyMedia {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MediaStore for FlakyMedia {
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Box::pin(async { anyhow::bail!("injected put failure") });
        }
        self.inner.put(key, data)
    }

    fn remove(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Box::pin(async { anyhow::bail!("injected remove failure") });
        }
        self.inner.remove(key)
    }

    fn exists(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        self.inner.exists(key)
    }

    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        self.inner.list(prefix)
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.inner.ping()
    }
}

/// In-memory metadata store that counts write attempts and whose inserts
/// and deletes can be told to fail.
#[derive(Default)]
pub struct FlakyMetadata {
    pub inner: MemoryMetadataStore,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyMetadata {
    /// Inserts, merges and deletes attempted so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MetadataStore for FlakyMetadata {
    fn find_all(
        &self,
        collection: Collection,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Document>>> + Send + '_>> {
        self.inner.find_all(collection)
    }

    fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Document>>> + Send + '_>> {
        self.inner.find_one(collection, field, value)
    }

    fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Box::pin(async { anyhow::bail!("injected insert failure") });
        }
        self.inner.insert(collection, document)
    }

    fn merge_update(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
        patch: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.merge_update(collection, field, value, patch)
    }

    fn delete(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Box::pin(async { anyhow::bail!("injected delete failure") });
        }
        self.inner.delete(collection, field, value)
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.inner.ping()
    }
}
