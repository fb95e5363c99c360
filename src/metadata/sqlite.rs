//! SQLite-backed metadata store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  Documents are stored as JSON text in a single
//! `documents` table keyed by collection; lookups use the JSON1
//! `json_extract` function.  All async trait methods are thin wrappers
//! around synchronous rusqlite calls executed under a `Mutex`, which also
//! makes each merge-update atomic with respect to other writers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::store::{Collection, Document, MetadataStore};
use crate::patch::merge_into;

/// Current schema version. Bumped when migrations are added.
const SCHEMA_VERSION: i64 = 1;

/// Metadata store backed by a single SQLite database file.
pub struct SqliteMetadataStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        store.init_db()?;
        Ok(store)
    }

    /// Apply recommended SQLite pragmas for performance and safety.
    fn apply_pragmas(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create the required tables and indexes if they do not already exist.
    /// Idempotent, so it is safe to call on every startup.
    fn init_db(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version    INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection
                ON documents(collection);
            ",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![SCHEMA_VERSION, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Locate the first matching row, returning its id and parsed body.
    fn find_row(
        conn: &Connection,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> anyhow::Result<Option<(i64, Document)>> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, body FROM documents
                 WHERE collection = ?1 AND json_extract(body, ?2) = ?3
                 ORDER BY id LIMIT 1",
                params![collection.name(), json_path(field), value],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((id, body)) => Ok(Some((id, parse_body(&body)?))),
            None => Ok(None),
        }
    }
}

/// JSON path for a top-level field.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn parse_body(body: &str) -> anyhow::Result<Document> {
    Ok(serde_json::from_str(body)?)
}

// ── MetadataStore implementation ───────────────────────────────────

impl MetadataStore for SqliteMetadataStore {
    fn find_all(
        &self,
        collection: Collection,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Document>>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            let mut stmt =
                conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")?;
            let bodies = stmt
                .query_map(params![collection.name()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            bodies.iter().map(|b| parse_body(b)).collect()
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
            let conn = self.conn.lock().expect("mutex poisoned");
            Ok(Self::find_row(&conn, collection, &field, &value)?.map(|(_, doc)| doc))
        })
    }

    fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            let body = serde_json::to_string(&document)?;
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection.name(), body],
            )?;
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
            let mut conn = self.conn.lock().expect("mutex poisoned");
            let tx = conn.transaction()?;
            let Some((id, mut document)) = Self::find_row(&tx, collection, &field, &value)? else {
                return Ok(false);
            };
            merge_into(&mut document, patch);
            tx.execute(
                "UPDATE documents SET body = ?1 WHERE id = ?2",
                params![serde_json::to_string(&document)?, id],
            )?;
            tx.commit()?;
            Ok(true)
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
            let conn = self.conn.lock().expect("mutex poisoned");
            let deleted = conn.execute(
                "DELETE FROM documents WHERE id = (
                     SELECT id FROM documents
                     WHERE collection = ?1 AND json_extract(body, ?2) = ?3
                     ORDER BY id LIMIT 1
                 )",
                params![collection.name(), json_path(&field), value],
            )?;
            Ok(deleted > 0)
        })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}
