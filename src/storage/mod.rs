//! Media storage backends.
//!
//! The [`backend::MediaStore`] trait abstracts over where media bytes
//! live.  Implementations: in-memory, local disk, and an S3-compatible
//! gateway (AWS S3 or MinIO).

pub mod backend;
pub mod local;
pub mod memory;
pub mod s3;

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;
use crate::storage::backend::MediaStore;

/// Open the media backend selected by `config.backend`.
pub async fn open(config: &StorageConfig) -> anyhow::Result<Arc<dyn MediaStore>> {
    let store: Arc<dyn MediaStore> = match config.backend.as_str() {
        "memory" => {
            info!("In-memory media store initialized");
            Arc::new(memory::MemoryMediaStore::new())
        }
        "s3" => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.backend is 's3' but storage.s3 config section is missing")
            })?;
            Arc::new(s3::S3MediaStore::new(config.bucket.clone(), s3).await?)
        }
        _ => {
            let root = &config.local.root_dir;
            let store = local::LocalMediaStore::new(root, &config.bucket)?;
            info!(
                "Local media store initialized at {}/{}",
                root, config.bucket
            );
            Arc::new(store)
        }
    };
    Ok(store)
}
