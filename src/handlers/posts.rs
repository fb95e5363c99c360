//! Blog post endpoints.

use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use serde_json::json;

use super::{json_body, Form};
use crate::auth::Identity;
use crate::envelope::{respond, Envelope};
use crate::errors::ApiError;
use crate::model::{fields, PublicPost};
use crate::service::content::{NewPost, PostEdit};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/blog",
    tag = "Blog",
    operation_id = "ListPosts",
    responses(
        (status = 200, description = "All posts"),
        (status = 500, description = "Internal error")
    )
)]
pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let posts: Vec<PublicPost> = state
        .content
        .list()
        .await?
        .into_iter()
        .map(PublicPost::from)
        .collect();
    Ok(respond(StatusCode::OK, Envelope::data(posts)))
}

#[utoipa::path(
    get,
    path = "/blog/{slug}",
    tag = "Blog",
    operation_id = "GetPostBySlug",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "The post"),
        (status = 404, description = "No post with this slug")
    )
)]
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let post = PublicPost::from(state.content.get_by_slug(&slug).await?);
    Ok(respond(StatusCode::OK, Envelope::data(post)))
}

#[utoipa::path(
    post,
    path = "/blog",
    tag = "Blog",
    operation_id = "CreatePost",
    responses(
        (status = 201, description = "Post created as a draft"),
        (status = 400, description = "Missing fields or unsupported image type"),
        (status = 401, description = "Not authorized")
    )
)]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart).await?;
    let thumbnail = form.file(fields::IMAGE_URL)?;
    let input = NewPost {
        title: form.text(fields::TITLE),
        body: form.text(fields::BODY),
        image_alt: form.text(fields::IMAGE_ALT),
    };

    let post = PublicPost::from(state.content.create(input, thumbnail, &actor).await?);
    Ok(respond(
        StatusCode::CREATED,
        Envelope::data(post).with_message("new blog added successfully"),
    ))
}

#[utoipa::path(
    patch,
    path = "/blog/{id}",
    tag = "Blog",
    operation_id = "EditPost",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post edited"),
        (status = 400, description = "Malformed body"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn edit_post(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    Path(id): Path<String>,
    payload: Result<Json<PostEdit>, JsonRejection>,
) -> Result<Response, ApiError> {
    let edit = json_body(payload)?;
    state.content.edit(&id, edit, &actor).await?;
    Ok(respond(
        StatusCode::OK,
        Envelope::message("blog edited successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/blog/{id}",
    tag = "Blog",
    operation_id = "DeletePost",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post and thumbnail deleted"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.content.delete(&id).await?;
    Ok(respond(
        StatusCode::OK,
        Envelope::message("blog deleted successfully"),
    ))
}

#[utoipa::path(
    patch,
    path = "/blog/updatethumbnail/{id}",
    tag = "Blog",
    operation_id = "ReplaceThumbnail",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 201, description = "Thumbnail replaced"),
        (status = 400, description = "Missing file or unsupported image type"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_thumbnail(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart).await?;
    let thumbnail = form.file(fields::IMAGE_URL)?;

    let replaced = state
        .content
        .replace_thumbnail(&id, thumbnail, &actor)
        .await?;
    Ok(respond(
        StatusCode::CREATED,
        Envelope::data(json!({ "image_url": replaced.basename })).with_message(format!(
            "Successfully uploaded new thumbnail of size {}",
            replaced.size
        )),
    ))
}

#[utoipa::path(
    patch,
    path = "/blog/publish/{id}",
    tag = "Blog",
    operation_id = "TogglePublish",
    params(("id" = String, Path, description = "Post id")),
    responses(
        (status = 201, description = "Publish flag toggled"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn toggle_publish(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let published = state.content.toggle_publish(&id, &actor).await?;
    Ok(respond(
        StatusCode::CREATED,
        Envelope::data(json!({ "published": published }))
            .with_message("blog published/back to draft successfully"),
    ))
}
