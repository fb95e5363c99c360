//! Axum router construction.
//!
//! The [`app`] function wires every endpoint to its handler, installs the
//! middleware stack, and returns a ready-to-serve [`axum::Router`].
//!
//! Authentication is a router-wide middleware: requests that are not on
//! the public list must carry a valid bearer token, and the verified
//! [`Identity`] is placed in the request extensions for handlers.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;
use utoipa::OpenApi;

use crate::auth::Identity;
use crate::errors::{generate_request_id, ApiError};
use crate::handlers::{posts, users};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Folio API",
        version = "0.1.0",
        description = "Blog posts and user accounts with attached media"
    ),
    paths(
        health_check,
        crate::handlers::users::login,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::edit_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::update_profile_image,
        crate::handlers::posts::list_posts,
        crate::handlers::posts::get_post,
        crate::handlers::posts::create_post,
        crate::handlers::posts::edit_post,
        crate::handlers::posts::delete_post,
        crate::handlers::posts::update_thumbnail,
        crate::handlers::posts::toggle_publish,
    ),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Users", description = "Login and user accounts"),
        (name = "Blog", description = "Blog posts and thumbnails"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with every route and the middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .route("/login", post(users::login))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/updateprofile", patch(users::update_profile_image))
        .route("/users/edit/:id", patch(users::edit_user))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        .route("/blog", get(posts::list_posts).post(posts::create_post))
        .route("/blog/updatethumbnail/:id", patch(posts::update_thumbnail))
        .route("/blog/publish/:id", patch(posts::toggle_publish))
        // GET addresses a post by slug; PATCH and DELETE by id.
        .route(
            "/blog/:id",
            get(posts::get_post)
                .patch(posts::edit_post)
                .delete(posts::delete_post),
        );

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    let body_limit = state.config.server.max_upload_size;

    router
        .with_state(state.clone())
        // Layer ordering: the last layer added is the outermost.
        // auth_middleware is innermost (after routing, closest to handlers).
        .layer(middleware::from_fn_with_state(state, auth_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        // CORS is outermost so preflight requests never reach auth.
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::AUTHORIZATION, header::CONTENT_TYPE])
}

// -- Request id middleware ----------------------------------------------------

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Echo the caller's `x-request-id` or mint one, and set it on the response.
async fn request_id_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&generate_request_id())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        });

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

// -- Auth middleware ----------------------------------------------------------

/// Paths that bypass authentication for every method.
const AUTH_SKIP_PATHS: &[&str] = &["/health", "/metrics", "/openapi.json"];

/// Whether a request may proceed without a token.
fn is_public(method: &Method, path: &str) -> bool {
    if AUTH_SKIP_PATHS.contains(&path) || method == Method::OPTIONS {
        return true;
    }
    if method == Method::POST && path == "/login" {
        return true;
    }
    method == Method::GET && (path == "/blog" || path.starts_with("/blog/"))
}

/// Bearer-token authentication middleware.
///
/// On success the caller's [`Identity`] is inserted into the request
/// extensions. On failure the request ends here with 401.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if is_public(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let identity: Identity = state.auth.authenticate(header).map_err(|e| {
        debug!("rejected {} {}: {e}", req.method(), req.uri().path());
        e
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

// -- Health and docs ----------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Service and stores are reachable"),
        (status = 503, description = "A store failed its ping")
    )
)]
async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    if !state.config.observability.health_check {
        return (StatusCode::OK, Json(json!({"status": "ok"}))).into_response();
    }

    let describe = |result: anyhow::Result<()>| match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("{e:#}"),
    };
    let metadata = describe(state.metadata.ping().await);
    let media = describe(state.media.ping().await);
    let healthy = metadata == "ok" && media == "ok";

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let label = if healthy { "ok" } else { "degraded" };
    let body = json!({
        "status": label,
        "checks": { "metadata": metadata, "media": media },
    });
    (status, Json(body)).into_response()
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------
