//! Entity lifecycles that span the metadata and media stores.
//!
//! The stores share no transaction, so every multi-step flow is ordered to
//! leave a recoverable state when it stops part way:
//!
//! * create: media first, then the document. A failed insert leaves an
//!   unreferenced object for the reconciler.
//! * replace: the new object is written and recorded in the entity's
//!   pending field before the old object is removed; the final merge swaps
//!   the reference and clears the pending field.
//! * delete: media first, then the document. A failed media removal keeps
//!   the document intact.

pub mod content;
pub mod identity;

#[cfg(test)]
pub(crate) mod testing;

pub use content::ContentService;
pub use identity::IdentityService;

use bytes::Bytes;
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::Identity;
use crate::errors::ApiError;
use crate::metadata::store::{Collection, Document, MetadataStore};
use crate::metrics::{record_document_op, record_media_op, MEDIA_BYTES_WRITTEN_TOTAL};
use crate::model::fields;
use crate::patch::MergeDocument;
use crate::storage::backend::{new_basename, validate_extension, AllowList, MediaKind, MediaStore};

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// Outcome of a successful media replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaReplaced {
    /// Basename now referenced by the document.
    pub basename: String,
    /// Bytes written.
    pub size: u64,
}

/// Where an entity type keeps its media reference.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MediaSlot {
    pub entity: &'static str,
    pub collection: Collection,
    pub id_field: &'static str,
    pub media_field: &'static str,
    pub pending_field: &'static str,
    pub kind: MediaKind,
}

impl MediaSlot {
    pub(crate) const THUMBNAIL: MediaSlot = MediaSlot {
        entity: "blog",
        collection: Collection::Posts,
        id_field: fields::BLOG_ID,
        media_field: fields::IMAGE_URL,
        pending_field: fields::PENDING_IMAGE_URL,
        kind: MediaKind::Thumbnail,
    };

    pub(crate) const PROFILE: MediaSlot = MediaSlot {
        entity: "user",
        collection: Collection::Users,
        id_field: fields::USER_ID,
        media_field: fields::PROFILE_PICTURE_URL,
        pending_field: fields::PENDING_PROFILE_PICTURE_URL,
        kind: MediaKind::Profile,
    };

    /// Every slot the reconciler scans.
    pub(crate) const ALL: [MediaSlot; 2] = [MediaSlot::THUMBNAIL, MediaSlot::PROFILE];

    fn not_found(&self, key: &str) -> ApiError {
        ApiError::NotFound {
            entity: self.entity,
            key: key.to_string(),
        }
    }
}

/// String value of `field`, or `""` when absent.
pub(crate) fn text_field<'a>(document: &'a Document, field: &str) -> &'a str {
    document.get(field).and_then(|v| v.as_str()).unwrap_or("")
}

// ── Instrumented store calls ────────────────────────────────────────

pub(crate) async fn find_all(
    store: &dyn MetadataStore,
    collection: Collection,
) -> anyhow::Result<Vec<Document>> {
    let result = store.find_all(collection).await;
    record_document_op("find_all", collection.name(), &result);
    result
}

pub(crate) async fn find_one(
    store: &dyn MetadataStore,
    collection: Collection,
    field: &str,
    value: &str,
) -> anyhow::Result<Option<Document>> {
    let result = store.find_one(collection, field, value).await;
    record_document_op("find_one", collection.name(), &result);
    result
}

pub(crate) async fn insert(
    store: &dyn MetadataStore,
    collection: Collection,
    document: Document,
) -> anyhow::Result<()> {
    let result = store.insert(collection, document).await;
    record_document_op("insert", collection.name(), &result);
    result
}

pub(crate) async fn merge_update(
    store: &dyn MetadataStore,
    collection: Collection,
    field: &str,
    value: &str,
    patch: MergeDocument,
) -> anyhow::Result<bool> {
    let result = store
        .merge_update(collection, field, value, patch.into_document())
        .await;
    record_document_op("merge_update", collection.name(), &result);
    result
}

pub(crate) async fn delete(
    store: &dyn MetadataStore,
    collection: Collection,
    field: &str,
    value: &str,
) -> anyhow::Result<bool> {
    let result = store.delete(collection, field, value).await;
    record_document_op("delete", collection.name(), &result);
    result
}

/// Validate and write an uploaded image, returning its basename and size.
/// A disallowed extension fails before the media store is touched.
pub(crate) async fn store_image(
    media: &dyn MediaStore,
    kind: MediaKind,
    upload: Upload,
) -> Result<(String, u64), ApiError> {
    let extension = validate_extension(&upload.filename, AllowList::Image)
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let basename = new_basename(&extension);
    let key = kind.key(&basename);

    let result = media.put(&key, upload.data).await;
    record_media_op("put", &result);
    let size = result?;
    counter!(MEDIA_BYTES_WRITTEN_TOTAL).increment(size);
    debug!(key = %key, size, "media stored");
    Ok((basename, size))
}

/// Remove a referenced object. An empty basename means nothing is attached
/// and the media store is not called.
pub(crate) async fn remove_media(
    media: &dyn MediaStore,
    kind: MediaKind,
    basename: &str,
) -> anyhow::Result<()> {
    if basename.is_empty() {
        return Ok(());
    }
    let key = kind.key(basename);
    let result = media.remove(&key).await;
    record_media_op("remove", &result);
    result?;
    debug!(key = %key, "media removed");
    Ok(())
}

// ── Shared flows ────────────────────────────────────────────────────

/// Swap the media attached to the entity `id` for `upload`.
pub(crate) async fn replace_media(
    metadata: &dyn MetadataStore,
    media: &dyn MediaStore,
    slot: MediaSlot,
    id: &str,
    upload: Upload,
    actor: &Identity,
) -> Result<MediaReplaced, ApiError> {
    let (basename, size) = store_image(media, slot.kind, upload).await?;

    let Some(current) = find_one(metadata, slot.collection, slot.id_field, id).await? else {
        warn!(
            key = %slot.kind.key(&basename),
            "{} {id} vanished during media replace; object left for reconciliation",
            slot.entity
        );
        return Err(slot.not_found(id));
    };
    let old = text_field(&current, slot.media_field).to_string();

    let mut intent = MergeDocument::new();
    intent.set(slot.pending_field, &basename);
    if !merge_update(metadata, slot.collection, slot.id_field, id, intent).await? {
        return Err(slot.not_found(id));
    }

    remove_media(media, slot.kind, &old).await?;

    let mut commit = MergeDocument::new();
    commit
        .set(slot.media_field, &basename)
        .set(slot.pending_field, "")
        .stamp(&actor.user_id, Utc::now());
    if !merge_update(metadata, slot.collection, slot.id_field, id, commit).await? {
        return Err(slot.not_found(id));
    }

    Ok(MediaReplaced { basename, size })
}

/// Delete the entity `id` together with its attached media.
pub(crate) async fn delete_with_media(
    metadata: &dyn MetadataStore,
    media: &dyn MediaStore,
    slot: MediaSlot,
    id: &str,
) -> Result<(), ApiError> {
    let Some(current) = find_one(metadata, slot.collection, slot.id_field, id).await? else {
        return Err(slot.not_found(id));
    };

    remove_media(media, slot.kind, text_field(&current, slot.media_field)).await?;

    if !delete(metadata, slot.collection, slot.id_field, id).await? {
        return Err(slot.not_found(id));
    }
    Ok(())
}
