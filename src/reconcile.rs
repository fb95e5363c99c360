//! Garbage collection of media objects no document references.
//!
//! Partial failures in the create, replace and delete flows can leave
//! objects behind.  A pass lists every media prefix, then collects the
//! keys documents still point at (live and pending), and removes the
//! remaining objects once they are older than the grace period.  The age
//! comes from the nanosecond timestamp in the key; keys without one are
//! never touched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metadata::store::MetadataStore;
use crate::metrics::{record_media_op, RECONCILE_REMOVED_TOTAL};
use crate::service::{find_all, text_field, MediaSlot};
use crate::storage::backend::{key_timestamp, MediaStore};

/// Counts from one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Objects found under the media prefixes.
    pub scanned: usize,
    /// Objects still referenced by a document.
    pub referenced: usize,
    /// Unreferenced objects younger than the grace period.
    pub too_young: usize,
    /// Unreferenced objects removed (or that would be, on a dry run).
    pub removed: Vec<String>,
}

pub struct Reconciler {
    metadata: Arc<dyn MetadataStore>,
    media: Arc<dyn MediaStore>,
    grace: chrono::Duration,
}

impl Reconciler {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        media: Arc<dyn MediaStore>,
        grace_seconds: u64,
    ) -> Self {
        Self {
            metadata,
            media,
            grace: chrono::Duration::seconds(grace_seconds as i64),
        }
    }

    /// Run one pass. With `dry_run` nothing is removed.
    pub async fn run_once(&self, dry_run: bool) -> anyhow::Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let now = Utc::now();

        for slot in MediaSlot::ALL {
            // List before reading documents so a reference written in
            // between is still seen.
            let keys = self.media.list(slot.kind.prefix()).await?;

            let mut referenced = HashSet::new();
            for document in find_all(self.metadata.as_ref(), slot.collection).await? {
                for field in [slot.media_field, slot.pending_field] {
                    let basename = text_field(&document, field);
                    if !basename.is_empty() {
                        referenced.insert(slot.kind.key(basename));
                    }
                }
            }

            for key in keys {
                report.scanned += 1;
                if referenced.contains(&key) {
                    report.referenced += 1;
                    continue;
                }
                let Some(created) = key_timestamp(&key) else {
                    debug!(key = %key, "skipping media object without a timestamp key");
                    continue;
                };
                if now - created < self.grace {
                    report.too_young += 1;
                    continue;
                }

                if !dry_run {
                    let result = self.media.remove(&key).await;
                    record_media_op("remove", &result);
                    result?;
                    counter!(RECONCILE_REMOVED_TOTAL).increment(1);
                }
                report.removed.push(key);
            }
        }

        info!(
            scanned = report.scanned,
            referenced = report.referenced,
            too_young = report.too_young,
            removed = report.removed.len(),
            dry_run,
            "reconcile pass complete"
        );
        Ok(report)
    }

    /// Run a pass every `interval` until the task is dropped.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once(false).await {
                warn!("reconcile pass failed: {e:#}");
            }
        }
    }
}
