//! In-memory media backend.
//!
//! Objects live in a `BTreeMap` behind a `tokio::sync::RwLock`, so listing
//! by prefix comes back sorted.  Nothing is persisted.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use super::backend::MediaStore;

#[derive(Default)]
pub struct MemoryMediaStore {
    objects: tokio::sync::RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl MediaStore for MemoryMediaStore {
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let size = data.len() as u64;
            self.objects.write().await.insert(key, data);
            Ok(size)
        })
    }

    fn remove(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.objects.write().await.remove(&key);
            Ok(())
        })
    }

    fn exists(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.objects.read().await.contains_key(&key)) })
    }

    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, _)| k.clone())
                .collect())
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_remove() {
        let store = MemoryMediaStore::new();
        assert_eq!(store.put("blog/1.png", Bytes::from_static(b"abc")).await.unwrap(), 3);
        assert!(store.exists("blog/1.png").await.unwrap());
        store.remove("blog/1.png").await.unwrap();
        store.remove("blog/1.png").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_prefix_only() {
        let store = MemoryMediaStore::new();
        for key in ["blog/2.png", "blog/1.png", "profile/1.png", "blogx/9.png"] {
            store.put(key, Bytes::new()).await.unwrap();
        }
        assert_eq!(
            store.list("blog/").await.unwrap(),
            vec!["blog/1.png".to_string(), "blog/2.png".to_string()]
        );
        assert_eq!(store.len().await, 4);
    }
}
