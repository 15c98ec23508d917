//! services/api/src/web/response.rs
//!
//! The JSON envelopes every endpoint answers with, and the HTTP error type
//! that turns port and validation failures into them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use doubtstack_core::{PortError, ValidationErrors};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

//=========================================================================================
// Success Envelopes
//=========================================================================================

/// `{"status":"success","data":...}` or `{"status":"success","message":...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type JsonEnvelope<T> = Json<Envelope<T>>;

pub fn ok<T: Serialize>(data: T) -> JsonEnvelope<T> {
    Json(Envelope {
        status: "success",
        message: None,
        data: Some(data),
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, JsonEnvelope<T>) {
    (StatusCode::CREATED, ok(data))
}

pub fn message(text: impl Into<String>) -> JsonEnvelope<()> {
    Json(Envelope {
        status: "success",
        message: Some(text.into()),
        data: None,
    })
}

//=========================================================================================
// Error Envelope
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldErrorBody {
    pub field: String,
    pub message: String,
}

/// The body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "error")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldErrorBody>>,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Validation(_) | HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Conflict(_) => StatusCode::CONFLICT,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_authenticated() -> Self {
        HttpError::Unauthorized("Not authorized to access this route".to_string())
    }
}

impl From<PortError> for HttpError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => HttpError::NotFound(msg),
            PortError::Conflict(msg) => HttpError::Conflict(msg),
            PortError::Invalid(msg) => HttpError::BadRequest(msg),
            PortError::Forbidden(msg) => HttpError::Forbidden(msg),
            PortError::Unauthorized => HttpError::not_authenticated(),
            PortError::Unexpected(msg) => HttpError::Internal(msg),
        }
    }
}

impl From<ValidationErrors> for HttpError {
    fn from(errors: ValidationErrors) -> Self {
        HttpError::Validation(errors)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            HttpError::Validation(errors) => ErrorBody {
                status: "error".to_string(),
                message: None,
                errors: Some(
                    errors
                        .0
                        .into_iter()
                        .map(|e| FieldErrorBody {
                            field: e.field,
                            message: e.message,
                        })
                        .collect(),
                ),
            },
            HttpError::Internal(detail) => {
                error!("Request failed: {}", detail);
                ErrorBody {
                    status: "error".to_string(),
                    message: Some("Internal server error".to_string()),
                    errors: None,
                }
            }
            HttpError::BadRequest(msg)
            | HttpError::Unauthorized(msg)
            | HttpError::Forbidden(msg)
            | HttpError::NotFound(msg)
            | HttpError::Conflict(msg) => ErrorBody {
                status: "error".to_string(),
                message: Some(msg),
                errors: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_status_codes() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortError::Conflict("x".into()), StatusCode::CONFLICT),
            (PortError::Invalid("x".into()), StatusCode::BAD_REQUEST),
            (PortError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (PortError::Unauthorized, StatusCode::UNAUTHORIZED),
            (PortError::Unexpected("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (port, expected) in cases {
            assert_eq!(HttpError::from(port).status(), expected);
        }
    }

    #[test]
    fn envelopes_skip_empty_fields() {
        let body = serde_json::to_value(&ok(5).0).unwrap();
        assert_eq!(body, serde_json::json!({"status": "success", "data": 5}));

        let body = serde_json::to_value(&message("done").0).unwrap();
        assert_eq!(body, serde_json::json!({"status": "success", "message": "done"}));
    }
}
