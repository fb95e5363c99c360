//! HTTP handlers.
//!
//! Handlers only parse requests and shape responses; the flows live in
//! [`crate::service`].  Request bodies are extracted as `Result`s so that
//! malformed input still answers with the JSON envelope.

pub mod posts;
pub mod users;

use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::errors::ApiError;
use crate::service::Upload;

/// Unwrap a JSON body or report why it could not be bound.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation(format!("can't bind struct: {}", rejection.body_text())))
}

/// A fully buffered `multipart/form-data` body.
#[derive(Debug, Default)]
pub(crate) struct Form {
    texts: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl Form {
    /// Read every part. Parts with a filename are files, the rest text.
    pub(crate) async fn read(
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Self, ApiError> {
        let mut multipart = multipart.map_err(|rejection| {
            ApiError::validation(format!("expected a multipart form: {}", rejection.body_text()))
        })?;

        let mut form = Form::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await.map_err(|e| {
                        ApiError::validation(format!("failed to read file `{name}`: {e}"))
                    })?;
                    form.files.insert(name, Upload { filename, data });
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        ApiError::validation(format!("failed to read field `{name}`: {e}"))
                    })?;
                    form.texts.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Text field value; absent fields read as empty.
    pub(crate) fn text(&mut self, name: &str) -> String {
        self.texts.remove(name).unwrap_or_default()
    }

    pub(crate) fn file(&mut self, name: &str) -> Result<Upload, ApiError> {
        self.files
            .remove(name)
            .ok_or_else(|| ApiError::validation(format!("missing file field `{name}`")))
    }
}
