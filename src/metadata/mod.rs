//! Metadata storage layer.
//!
//! The metadata store holds the post and user documents.  The
//! [`store::MetadataStore`] trait defines the interface;
//! [`sqlite::SqliteMetadataStore`] is the default implementation and
//! [`memory::MemoryMetadataStore`] serves tests and ephemeral runs.

pub mod memory;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use tracing::info;

use crate::config::MetadataConfig;
use crate::metadata::store::MetadataStore;

/// Open the metadata store selected by `config.engine`.
///
/// Any engine other than `memory` opens SQLite, creating the parent
/// directory of the database file if needed.
pub fn open(config: &MetadataConfig) -> anyhow::Result<Arc<dyn MetadataStore>> {
    match config.engine.as_str() {
        "memory" => {
            info!("In-memory metadata store initialized");
            Ok(Arc::new(memory::MemoryMetadataStore::new()))
        }
        _ => {
            let path = &config.sqlite.path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = sqlite::SqliteMetadataStore::new(path)?;
            info!("SQLite metadata store initialized at {}", path);
            Ok(Arc::new(store))
        }
    }
}
