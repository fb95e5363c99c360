//! Abstract media store trait and media key conventions.
//!
//! Every media backend implements [`MediaStore`].  Objects are addressed by
//! a full key `<prefix><basename>` inside one bucket; documents only keep
//! the basename (`<nanos><ext>`), and [`MediaKind`] maps between the two.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Async media storage contract.
pub trait MediaStore: Send + Sync + 'static {
    /// Write `data` at `key`, returning the number of bytes stored.
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>>;

    /// Remove the object at `key`.  Removing an absent object succeeds.
    fn remove(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Whether an object exists at `key`.
    fn exists(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;

    /// Every key starting with `prefix`, sorted.
    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>>;

    /// Readiness probe.
    fn ping(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

// ── Key layout ──────────────────────────────────────────────────────

/// What a media object is attached to; decides its key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Thumbnail,
    Profile,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Thumbnail, MediaKind::Profile];

    pub fn prefix(self) -> &'static str {
        match self {
            MediaKind::Thumbnail => "blog/",
            MediaKind::Profile => "profile/",
        }
    }

    /// Full object key for a stored basename.
    pub fn key(self, basename: &str) -> String {
        format!("{}{}", self.prefix(), basename)
    }
}

static LAST_NANOS: AtomicU64 = AtomicU64::new(0);

/// Nanoseconds since the epoch, strictly increasing within the process.
pub fn next_timestamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut prev = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_NANOS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// A fresh basename `<nanos><extension>`.
pub fn new_basename(extension: &str) -> String {
    format!("{}{}", next_timestamp(), extension)
}

/// Creation time encoded in a key or basename, if it has one.
pub fn key_timestamp(key: &str) -> Option<DateTime<Utc>> {
    let basename = key.rsplit('/').next().unwrap_or(key);
    let digits = basename.split('.').next()?;
    let nanos: i64 = digits.parse().ok()?;
    Some(DateTime::from_timestamp_nanos(nanos))
}

// ── Upload allow-lists ──────────────────────────────────────────────

/// Accepted file types for an upload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowList {
    Image,
    /// PDF uploads. No route accepts document uploads yet.
    Document,
}

impl AllowList {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            AllowList::Image => &["jpeg", "jpg", "gif", "png", "svg", "webp"],
            AllowList::Document => &["pdf"],
        }
    }

    fn label(self) -> &'static str {
        match self {
            AllowList::Image => "image",
            AllowList::Document => "document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("file {filename:?} is not an accepted {kind} type ({allowed})")]
pub struct UnsupportedMedia {
    pub filename: String,
    pub kind: &'static str,
    pub allowed: String,
}

/// Check `filename` against `allow` and return its extension including the
/// leading dot, in the case it was given.
pub fn validate_extension(filename: &str, allow: AllowList) -> Result<String, UnsupportedMedia> {
    let extension = filename
        .rfind('.')
        .map(|idx| &filename[idx..])
        .filter(|ext| ext.len() > 1 && !ext.contains('/'));
    match extension {
        Some(ext)
            if allow
                .extensions()
                .iter()
                .any(|ok| ext[1..].eq_ignore_ascii_case(ok)) =>
        {
            Ok(ext.to_string())
        }
        _ => Err(UnsupportedMedia {
            filename: filename.to_string(),
            kind: allow.label(),
            allowed: allow.extensions().join(", "),
        }),
    }
}
