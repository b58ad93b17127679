//! Error responses for the HTTP API

use crate::error::ChurnError;
use crate::inference::PredictError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Body is not a JSON document
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Body is JSON but does not describe a valid customer
    #[error("Invalid field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PredictError> for ServerError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ServerError::Validation {
                field: e.field,
                message: e.reason,
            },
            PredictError::Internal(e) => e.into(),
        }
    }
}

impl From<ChurnError> for ServerError {
    fn from(err: ChurnError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": true, "message": msg })),
            ServerError::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": true, "message": message, "field": field }),
            ),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": true, "message": msg })),
            ServerError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": true, "message": "Method not allowed" }),
            ),
            ServerError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": true, "message": "An internal error occurred" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
