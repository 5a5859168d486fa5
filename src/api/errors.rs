use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::errors::WriteError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error(transparent)]
    Write(WriteError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<WriteError> for ApiError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::UnknownChannel(id) => Self::UnknownChannel(id),
            other => Self::Write(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownChannel(_) => StatusCode::NOT_FOUND,
            ApiError::Write(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
