//! Uniform JSON response envelope.
//!
//! Every endpoint answers with `{"status": "success"|"failed", "message"?, "data"?}`.
//! Status codes are chosen per endpoint by the handlers; see
//! [`crate::errors::ApiError`] for the failure side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Outcome marker carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

/// The response body shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize = serde_json::Value> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Extra diagnostic text, only emitted on authentication failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    /// A success envelope carrying `data`.
    pub fn data(data: T) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    /// Attach a message to this envelope.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope {
    /// A success envelope with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    /// A failure envelope with only a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }
}

/// Render `envelope` with `status` as a JSON response.
pub fn respond<T: Serialize>(status: StatusCode, envelope: Envelope<T>) -> Response {
    (status, Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_envelope_omits_data() {
        let json = serde_json::to_value(Envelope::message("done")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success", "message": "done"}));
    }

    #[test]
    fn test_failed_envelope() {
        let json = serde_json::to_value(Envelope::failed("nope")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "nope");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_data_envelope_with_message() {
        let env = Envelope::data(vec![1, 2, 3]).with_message("three");
        let json = serde_json::to_value(env).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["message"], "three");
    }
}
