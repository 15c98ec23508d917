//! services/api/src/web/extract.rs
//!
//! Extractors whose rejections render as the standard error envelope.

use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    Json,
};
use doubtstack_core::User;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::web::response::HttpError;

/// JSON request body; malformed payloads become a 400 envelope.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// A JSON body, or a `multipart/form-data` body whose text fields are read
/// as the same object. File parts are skipped, as are empty values.
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));
        if !is_multipart {
            let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
            return Ok(Self(value));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;
        let mut fields = Map::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| HttpError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let text = field
                .text()
                .await
                .map_err(|e| HttpError::BadRequest(format!("Failed to read multipart data: {}", e)))?;
            if !text.is_empty() {
                fields.insert(name, Value::String(text));
            }
        }

        serde_json::from_value(Value::Object(fields))
            .map(Self)
            .map_err(|e| HttpError::BadRequest(format!("Invalid form data: {}", e)))
    }
}

/// Query string; unparseable values become a 400 envelope.
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// The single `{id}` segment of a route, parsed as a UUID.
pub struct PathId(pub Uuid);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;
        Uuid::parse_str(&raw)
            .map(PathId)
            .map_err(|_| HttpError::BadRequest("Invalid ID format".to_string()))
    }
}

/// The authenticated user, placed in the request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(HttpError::not_authenticated)
    }
}
