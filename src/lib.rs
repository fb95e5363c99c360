//! Folio library: a blog and user content service.
//!
//! Structured documents live in a [`metadata`] store and binary media in a
//! [`storage`] backend; [`service`] keeps the two consistent, [`auth`]
//! gates mutating routes, and [`server`] exposes everything over HTTP.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod model;
pub mod patch;
pub mod reconcile;
pub mod server;
pub mod service;
pub mod storage;

use crate::auth::AuthGate;
use crate::config::Config;
use crate::metadata::store::MetadataStore;
use crate::service::{ContentService, IdentityService};
use crate::storage::backend::MediaStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Document store for posts and users.
    pub metadata: Arc<dyn MetadataStore>,
    /// Media backend for thumbnails and profile images.
    pub media: Arc<dyn MediaStore>,
    /// Bearer-token issuer and verifier.
    pub auth: Arc<AuthGate>,
    pub content: ContentService,
    pub identity: IdentityService,
}

impl AppState {
    /// Wire the services around already-constructed stores.
    pub fn new(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let auth = Arc::new(AuthGate::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl_seconds,
        ));
        let content = ContentService::new(metadata.clone(), media.clone());
        let identity = IdentityService::new(metadata.clone(), media.clone(), auth.clone());
        Self {
            config,
            metadata,
            media,
            auth,
            content,
            identity,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level` when set; `logging.format = "json"`
/// switches to one JSON object per line.
pub fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}
