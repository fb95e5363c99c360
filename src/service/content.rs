//! Blog post lifecycle.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{
    delete_with_media, find_all, find_one, insert, merge_update, replace_media, store_image,
    text_field, MediaReplaced, MediaSlot, Upload,
};
use crate::auth::Identity;
use crate::errors::ApiError;
use crate::metadata::store::{from_document, to_document, Collection, MetadataStore};
use crate::model::{fields, slugify, BlogPost, PublishState};
use crate::patch::{MergeDocument, Patch};
use crate::storage::backend::{MediaKind, MediaStore};

/// Text fields of a new post (the thumbnail arrives separately).
/// Every field may be empty; an empty title yields an empty slug.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub image_alt: String,
}

/// Sparse edit of a post. The slug is only changed when sent explicitly.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PostEdit {
    #[schema(value_type = Option<String>)]
    pub title: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub body: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub image_alt: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub slug: Patch<String>,
}

#[derive(Clone)]
pub struct ContentService {
    metadata: Arc<dyn MetadataStore>,
    media: Arc<dyn MediaStore>,
}

impl ContentService {
    pub fn new(metadata: Arc<dyn MetadataStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { metadata, media }
    }

    /// Every post, in insertion order.
    pub async fn list(&self) -> Result<Vec<BlogPost>, ApiError> {
        let documents = find_all(self.metadata.as_ref(), Collection::Posts).await?;
        let posts = documents
            .into_iter()
            .map(from_document)
            .collect::<anyhow::Result<Vec<BlogPost>>>()?;
        Ok(posts)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<BlogPost, ApiError> {
        match find_one(self.metadata.as_ref(), Collection::Posts, fields::SLUG, slug).await? {
            Some(document) => Ok(from_document(document)?),
            None => Err(ApiError::NotFound {
                entity: "blog",
                key: slug.to_string(),
            }),
        }
    }

    /// Store the thumbnail, then insert the post as a draft.
    pub async fn create(
        &self,
        input: NewPost,
        thumbnail: Upload,
        actor: &Identity,
    ) -> Result<BlogPost, ApiError> {
        let (image_url, _) =
            store_image(self.media.as_ref(), MediaKind::Thumbnail, thumbnail).await?;

        let now = Utc::now();
        let post = BlogPost {
            blog_id: uuid::Uuid::new_v4().to_string(),
            slug: slugify(&input.title),
            title: input.title,
            body: input.body,
            image_url,
            image_alt: input.image_alt,
            published: PublishState::Draft,
            created_at: now,
            updated_at: now,
            updated_by: actor.user_id.clone(),
            pending_image_url: String::new(),
        };

        if let Err(err) = insert(self.metadata.as_ref(), Collection::Posts, to_document(&post)?).await
        {
            warn!(
                key = %MediaKind::Thumbnail.key(&post.image_url),
                "post insert failed after thumbnail upload; object left for reconciliation"
            );
            return Err(err.into());
        }

        info!(blog_id = %post.blog_id, slug = %post.slug, "post created");
        Ok(post)
    }

    /// Apply a sparse edit. Unsent and empty fields are left as stored.
    pub async fn edit(&self, id: &str, edit: PostEdit, actor: &Identity) -> Result<(), ApiError> {
        let mut merge = MergeDocument::new();
        merge
            .apply(fields::TITLE, edit.title)
            .apply(fields::BODY, edit.body)
            .apply(fields::IMAGE_ALT, edit.image_alt)
            .apply(fields::SLUG, edit.slug)
            .stamp(&actor.user_id, Utc::now());

        let matched = merge_update(
            self.metadata.as_ref(),
            Collection::Posts,
            fields::BLOG_ID,
            id,
            merge,
        )
        .await?;
        if !matched {
            return Err(ApiError::NotFound {
                entity: "blog",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    /// Remove the thumbnail, then the post.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        delete_with_media(
            self.metadata.as_ref(),
            self.media.as_ref(),
            MediaSlot::THUMBNAIL,
            id,
        )
        .await?;
        info!(blog_id = %id, "post deleted");
        Ok(())
    }

    pub async fn replace_thumbnail(
        &self,
        id: &str,
        thumbnail: Upload,
        actor: &Identity,
    ) -> Result<MediaReplaced, ApiError> {
        let replaced = replace_media(
            self.metadata.as_ref(),
            self.media.as_ref(),
            MediaSlot::THUMBNAIL,
            id,
            thumbnail,
            actor,
        )
        .await?;
        info!(blog_id = %id, image_url = %replaced.basename, "thumbnail replaced");
        Ok(replaced)
    }

    /// Flip between draft and published, returning the new state.
    pub async fn toggle_publish(
        &self,
        id: &str,
        actor: &Identity,
    ) -> Result<PublishState, ApiError> {
        let not_found = || ApiError::NotFound {
            entity: "blog",
            key: id.to_string(),
        };
        let current = find_one(self.metadata.as_ref(), Collection::Posts, fields::BLOG_ID, id)
            .await?
            .ok_or_else(not_found)?;
        let next = PublishState::parse(text_field(&current, fields::PUBLISHED)).toggled();

        let mut merge = MergeDocument::new();
        merge
            .set(fields::PUBLISHED, next)
            .stamp(&actor.user_id, Utc::now());
        if !merge_update(
            self.metadata.as_ref(),
            Collection::Posts,
            fields::BLOG_ID,
            id,
            merge,
        )
        .await?
        {
            return Err(not_found());
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{FlakyMedia, FlakyMetadata};
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    struct Fixture {
        metadata: Arc<FlakyMetadata>,
        media: Arc<FlakyMedia>,
        service: ContentService,
    }

    fn fixture() -> Fixture {
        let metadata = Arc::new(FlakyMetadata::default());
        let media = Arc::new(FlakyMedia::default());
        let service = ContentService::new(metadata.clone(), media.clone());
        Fixture {
            metadata,
            media,
            service,
        }
    }

    fn actor() -> Identity {
        Identity {
            user_id: "author-1".into(),
            username: "author".into(),
        }
    }

    fn upload(name: &str) -> Upload {
        Upload {
            filename: name.into(),
            data: Bytes::from_static(b"image-bytes"),
        }
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.into(),
            body: "Body".into(),
            image_alt: "alt".into(),
        }
    }

    #[tokio::test]
    async fn test_create_stores_draft_with_thumbnail() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Hello, World!"), upload("cover.PNG"), &actor())
            .await
            .unwrap();

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.published, PublishState::Draft);
        assert_eq!(post.updated_by, "author-1");
        assert!(post.image_url.ends_with(".PNG"));
        assert!(f
            .media
            .exists(&MediaKind::Thumbnail.key(&post.image_url))
            .await
            .unwrap());

        let fetched = f.service.get_by_slug("hello-world").await.unwrap();
        assert_eq!(fetched, post);
    }

    #[tokio::test]
    async fn test_create_rejects_non_image_without_touching_stores() {
        let f = fixture();
        let err = f
            .service
            .create(new_post("CV"), upload("resume.txt"), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert_eq!(f.media.calls(), 0);
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_empty_title_has_empty_slug() {
        let f = fixture();
        let post = f
            .service
            .create(new_post(""), upload("a.png"), &actor())
            .await
            .unwrap();
        assert_eq!(post.title, "");
        assert_eq!(post.slug, "");
        assert_eq!(f.service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_put_failure_skips_insert() {
        let f = fixture();
        f.media.fail_put.store(true, Ordering::SeqCst);
        let err = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(f.metadata.writes(), 0);
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_thumbnail_put_failure_keeps_everything() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();
        let old_key = MediaKind::Thumbnail.key(&post.image_url);
        let writes_before = f.metadata.writes();
        f.media.fail_put.store(true, Ordering::SeqCst);

        let err = f
            .service
            .replace_thumbnail(&post.blog_id, upload("b.png"), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        assert!(f.media.exists(&old_key).await.unwrap());
        assert_eq!(f.media.inner.len().await, 1);
        assert_eq!(f.metadata.writes(), writes_before);
        let after = f.service.get_by_slug("title").await.unwrap();
        assert_eq!(after.image_url, post.image_url);
        assert_eq!(after.pending_image_url, "");
        assert_eq!(after.updated_at, post.updated_at);
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_orphan_object() {
        let f = fixture();
        f.metadata.fail_insert.store(true, Ordering::SeqCst);
        let err = f
            .service
            .create(new_post("Orphan"), upload("a.png"), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(f.media.list("blog/").await.unwrap().len(), 1);
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_body_only_keeps_other_fields() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();

        let edit: PostEdit = serde_json::from_value(serde_json::json!({
            "body": "Rewritten",
            "title": ""
        }))
        .unwrap();
        f.service.edit(&post.blog_id, edit, &actor()).await.unwrap();

        let after = f.service.get_by_slug("title").await.unwrap();
        assert_eq!(after.body, "Rewritten");
        assert_eq!(after.title, "Title");
        assert_eq!(after.image_url, post.image_url);
        assert_eq!(after.image_alt, "alt");
    }

    #[tokio::test]
    async fn test_edit_null_clears_field() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();
        let edit: PostEdit =
            serde_json::from_value(serde_json::json!({"image_alt": null})).unwrap();
        f.service.edit(&post.blog_id, edit, &actor()).await.unwrap();
        assert_eq!(f.service.get_by_slug("title").await.unwrap().image_alt, "");
    }

    #[tokio::test]
    async fn test_edit_missing_post() {
        let f = fixture();
        let err = f
            .service
            .edit("nope", PostEdit::default(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_disjoint_edits_both_survive() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();

        let title_edit = PostEdit {
            title: Patch::Set("New Title".into()),
            ..PostEdit::default()
        };
        let body_edit = PostEdit {
            body: Patch::Set("New Body".into()),
            ..PostEdit::default()
        };
        let a = f.service.clone();
        let b = f.service.clone();
        let id_a = post.blog_id.clone();
        let id_b = post.blog_id.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.edit(&id_a, title_edit, &actor()).await }),
            tokio::spawn(async move { b.edit(&id_b, body_edit, &actor()).await }),
        );
        ra.unwrap().unwrap();
        rb.unwrap().unwrap();

        let after = f.service.get_by_slug("title").await.unwrap();
        assert_eq!(after.title, "New Title");
        assert_eq!(after.body, "New Body");
    }

    #[tokio::test]
    async fn test_replace_thumbnail_swaps_objects() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();
        let old_key = MediaKind::Thumbnail.key(&post.image_url);

        let replaced = f
            .service
            .replace_thumbnail(&post.blog_id, upload("b.webp"), &actor())
            .await
            .unwrap();
        let new_key = MediaKind::Thumbnail.key(&replaced.basename);

        assert!(!f.media.exists(&old_key).await.unwrap());
        assert!(f.media.exists(&new_key).await.unwrap());
        let after = f.service.get_by_slug("title").await.unwrap();
        assert_eq!(after.image_url, replaced.basename);
        assert_eq!(after.pending_image_url, "");
        assert_eq!(replaced.size, 11);
    }

    #[tokio::test]
    async fn test_replace_thumbnail_remove_failure_keeps_old_reference() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();
        f.media.fail_remove.store(true, Ordering::SeqCst);

        let err = f
            .service
            .replace_thumbnail(&post.blog_id, upload("b.png"), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        let after = f.service.get_by_slug("title").await.unwrap();
        assert_eq!(after.image_url, post.image_url);
        assert!(!after.pending_image_url.is_empty());
        assert!(f
            .media
            .exists(&MediaKind::Thumbnail.key(&after.pending_image_url))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_replace_thumbnail_missing_post_orphans_upload() {
        let f = fixture();
        let err = f
            .service
            .replace_thumbnail("ghost", upload("b.png"), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
        assert_eq!(f.media.list("blog/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_thumbnail_and_post() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();
        f.service.delete(&post.blog_id).await.unwrap();
        assert!(f.media.inner.is_empty().await);
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_thumbnail_skips_media_store() {
        let f = fixture();
        let now = Utc::now();
        let post = BlogPost {
            blog_id: "bare".into(),
            title: "Bare".into(),
            body: String::new(),
            image_url: String::new(),
            image_alt: String::new(),
            slug: "bare".into(),
            published: PublishState::Draft,
            created_at: now,
            updated_at: now,
            updated_by: String::new(),
            pending_image_url: String::new(),
        };
        f.metadata
            .insert(Collection::Posts, to_document(&post).unwrap())
            .await
            .unwrap();

        f.service.delete("bare").await.unwrap();
        assert_eq!(f.media.calls(), 0);
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_media_failure_keeps_post() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();
        f.media.fail_remove.store(true, Ordering::SeqCst);
        assert!(f.service.delete(&post.blog_id).await.is_err());
        assert_eq!(f.service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_publish_round_trip() {
        let f = fixture();
        let post = f
            .service
            .create(new_post("Title"), upload("a.png"), &actor())
            .await
            .unwrap();

        let editor = Identity {
            user_id: "editor-9".into(),
            username: "editor".into(),
        };
        assert_eq!(
            f.service.toggle_publish(&post.blog_id, &editor).await.unwrap(),
            PublishState::Published
        );
        let published = f.service.get_by_slug("title").await.unwrap();
        assert_eq!(published.published, PublishState::Published);
        assert_eq!(published.updated_by, "editor-9");

        assert_eq!(
            f.service.toggle_publish(&post.blog_id, &editor).await.unwrap(),
            PublishState::Draft
        );
    }

    #[tokio::test]
    async fn test_get_missing_slug() {
        let f = fixture();
        assert!(matches!(
            f.service.get_by_slug("missing").await.unwrap_err(),
            ApiError::NotFound { .. }
        ));
    }
}
