//! Local filesystem media backend.
//!
//! Objects are stored as files under `<root>/<bucket>/<key>`, so the
//! `blog/` and `profile/` prefixes become subdirectories.
//!
//! All writes follow crash-only design: write to temp file, fsync, rename.

use bytes::Bytes;
use std::future::Future;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use super::backend::MediaStore;

const TMP_DIR: &str = ".tmp";

/// Stores media on the local filesystem.
pub struct LocalMediaStore {
    /// Bucket directory; every key resolves beneath it.
    base: PathBuf,
    /// Scratch directory for atomic writes.
    tmp: PathBuf,
}

impl LocalMediaStore {
    /// Create a store rooted at `root/bucket`, creating directories as needed.
    pub fn new(root: impl Into<PathBuf>, bucket: &str) -> anyhow::Result<Self> {
        let root = root.into();
        let base = root.join(bucket);
        let tmp = root.join(TMP_DIR);
        std::fs::create_dir_all(&base)?;
        std::fs::create_dir_all(&tmp)?;
        Ok(Self { base, tmp })
    }

    /// Resolve a key to a file path, rejecting anything that could escape
    /// the bucket directory.
    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() {
            anyhow::bail!("empty media key");
        }
        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                anyhow::bail!("Path traversal detected in media key: {key}");
            }
        }
        Ok(self.base.join(key))
    }

    fn temp_path(&self) -> PathBuf {
        self.tmp.join(format!("tmp-{}", uuid::Uuid::new_v4()))
    }

    /// Collect every file under `dir` as a key relative to the bucket.
    fn walk(&self, dir: &Path, keys: &mut Vec<String>) -> anyhow::Result<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                self.walk(&path, keys)?;
            } else if let Ok(rel) = path.strip_prefix(&self.base) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl MediaStore for LocalMediaStore {
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let final_path = self.resolve(&key)?;
            if let Some(parent) = final_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            // Crash-only: temp-fsync-rename pattern.
            let tmp_path = self.temp_path();
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &final_path)?;

            Ok(data.len() as u64)
        })
    }

    fn remove(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn exists(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            Ok(path.is_file())
        })
    }

    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let mut keys = Vec::new();
            self.walk(&self.base, &mut keys)?;
            keys.retain(|k| k.starts_with(&prefix));
            keys.sort();
            Ok(keys)
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.base.is_dir() {
                anyhow::bail!("media directory {} is missing", self.base.display());
            }
            Ok(())
        })
    }
}
