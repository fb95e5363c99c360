//! API error types.
//!
//! Every variant maps to an HTTP status code and renders the shared
//! [`Envelope`](crate::envelope::Envelope).  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(ApiError::NotFound { .. })`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::AuthError;
use crate::envelope::{respond, Envelope};

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes)
}

/// Errors surfaced to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input or a disallowed upload; nothing was mutated.
    #[error("{message}")]
    Validation { message: String },

    /// The bearer token was missing, malformed, mis-signed or expired.
    #[error("Not authorized")]
    Unauthorized(#[from] AuthError),

    /// The addressed document does not exist.
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    /// A business-rule refusal reported with HTTP 200 and `status: failed`
    /// (wrong credentials, username already taken).
    #[error("{message}")]
    Rejected { message: String },

    /// A store call failed. The underlying error text is exposed.
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Rejected { .. } => StatusCode::OK,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<garde::Report> for ApiError {
    fn from(report: garde::Report) -> Self {
        ApiError::validation(report.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Unauthorized(reason) => {
                let mut envelope = Envelope::failed(self.to_string());
                envelope.error = Some(reason.to_string());
                respond(status, envelope)
            }
            ApiError::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                respond(status, Envelope::failed(format!("{err:#}")))
            }
            _ => respond(status, Envelope::failed(self.to_string())),
        }
    }
}
