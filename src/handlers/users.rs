//! Login and user account endpoints.

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
use crate::service::identity::{Credentials, NewUser, UserEdit};
use crate::AppState;

/// Multipart field carrying a new profile image.
const PROFILE_IMAGE_FIELD: &str = "profile_image";

#[utoipa::path(
    post,
    path = "/login",
    tag = "Users",
    operation_id = "Login",
    responses(
        (status = 200, description = "Token issued, or `status: failed` on bad credentials"),
        (status = 400, description = "Malformed body")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let credentials = json_body(payload)?;
    let login = state.identity.login(credentials).await?;
    Ok(respond(StatusCode::OK, Envelope::data(login)))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    operation_id = "ListUsers",
    responses(
        (status = 200, description = "All users, without passwords"),
        (status = 401, description = "Not authorized")
    )
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let users = state.identity.list().await?;
    Ok(respond(StatusCode::OK, Envelope::data(users)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    operation_id = "GetUser",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user, without password"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let user = state.identity.get(&id).await?;
    Ok(respond(StatusCode::OK, Envelope::data(user)))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    operation_id = "CreateUser",
    responses(
        (status = 201, description = "User created"),
        (status = 200, description = "`status: failed` when the username is taken"),
        (status = 400, description = "Malformed or invalid body")
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Response, ApiError> {
    let input = json_body(payload)?;
    let user = state.identity.create(input, &actor).await?;
    Ok(respond(
        StatusCode::CREATED,
        Envelope::data(user).with_message("new user added successfully"),
    ))
}

#[utoipa::path(
    patch,
    path = "/users/edit/{id}",
    tag = "Users",
    operation_id = "EditUser",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 201, description = "User edited"),
        (status = 400, description = "Malformed body or cleared credential"),
        (status = 404, description = "User not found")
    )
)]
pub async fn edit_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    Path(id): Path<String>,
    payload: Result<Json<UserEdit>, JsonRejection>,
) -> Result<Response, ApiError> {
    let edit = json_body(payload)?;
    state.identity.edit(&id, edit, &actor).await?;
    Ok(respond(
        StatusCode::CREATED,
        Envelope::message("user edited successfully"),
    ))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    operation_id = "DeleteUser",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User and profile image deleted"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.identity.delete(&id).await?;
    Ok(respond(
        StatusCode::OK,
        Envelope::message("user deleted successfully"),
    ))
}

#[utoipa::path(
    patch,
    path = "/users/updateprofile",
    tag = "Users",
    operation_id = "ReplaceProfileImage",
    responses(
        (status = 201, description = "Profile image replaced"),
        (status = 400, description = "Missing file or unsupported image type"),
        (status = 404, description = "Caller's account no longer exists")
    )
)]
pub async fn update_profile_image(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = Form::read(multipart).await?;
    let image = form.file(PROFILE_IMAGE_FIELD)?;

    let replaced = state.identity.replace_profile_image(image, &actor).await?;
    Ok(respond(
        StatusCode::CREATED,
        Envelope::data(json!({ "profile_picture_url": replaced.basename })).with_message(
            format!(
                "Successfully uploaded new profile image of size {}",
                replaced.size
            ),
        ),
    ))
}
