use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::brain::BrainError;

/// Which relay operation failed; decides the `detail` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ProcessPage,
    FindAction,
    FilterActions,
}

impl Operation {
    pub fn error_prefix(self) -> &'static str {
        match self {
            Operation::ProcessPage => "Error processing page",
            Operation::FindAction => "Error finding action",
            Operation::FilterActions => "Error filtering actions",
        }
    }
}

/// The only failure the extension ever sees: HTTP 500 with a `detail` message.
#[derive(Error, Debug)]
#[error("{}: {source}", .operation.error_prefix())]
pub struct ApiError {
    pub operation: Operation,
    #[source]
    pub source: BrainError,
}

impl ApiError {
    pub fn new(operation: Operation, source: BrainError) -> Self {
        Self { operation, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(operation = ?self.operation, error = %self.source, "relay operation failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}
