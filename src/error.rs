use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

/// Failures surfaced to callers.
///
/// The `Display` text is the public message placed in the response body.
/// Underlying causes are kept as `source` and only ever logged.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Database connection string not found.")]
    Configuration,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Bad Request: Invalid JSON in body")]
    BadRequest(#[source] serde_json::Error),
    /// The body could not be buffered, usually because it exceeds the limit.
    #[error("Bad Request: Invalid JSON in body")]
    UnreadableBody(#[source] BytesRejection),
    #[error("Failed to retrieve data from database.")]
    Retrieval(#[source] StorageError),
    #[error("Failed to save data to database.")]
    Save(#[source] StorageError),
}

impl SyncError {
    pub fn status(&self) -> StatusCode {
        match self {
            SyncError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SyncError::BadRequest(_) | SyncError::UnreadableBody(_) => StatusCode::BAD_REQUEST,
            SyncError::Configuration | SyncError::Retrieval(_) | SyncError::Save(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
