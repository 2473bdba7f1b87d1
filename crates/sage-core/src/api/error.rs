//! Errors returned by the HTTP handlers, rendered as `{"detail": ...}`

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::agents::UnknownAgent;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Agent not found: {0}")]
    AgentNotFound(#[from] UnknownAgent),
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidBody(_) | ApiError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
