//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use doubtstack_core::PortError;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::web::{extract::CurrentUser, response::HttpError, state::AppState};

pub const SESSION_COOKIE: &str = "session";

/// Reads the session token from `Authorization: Bearer` or, failing that, the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
}

/// Middleware that validates the session token and loads the user behind it.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// Missing, unknown or expired sessions and deactivated accounts get a 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = session_token(req.headers()).ok_or_else(HttpError::not_authenticated)?;

    let user_id = state
        .db
        .validate_auth_session(&token)
        .await
        .map_err(|e| {
            debug!("Rejected auth session: {:?}", e);
            HttpError::not_authenticated()
        })?;

    let user = match state.db.get_user_by_id(user_id).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            warn!(user_id = %user_id, "Session belongs to a missing user");
            return Err(HttpError::not_authenticated());
        }
        Err(e) => return Err(e.into()),
    };

    if !user.is_active {
        return Err(HttpError::Unauthorized(
            "User account is deactivated".to_string(),
        ));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn similarly_named_cookies_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid=abc; session="));
        assert_eq!(session_token(&headers), None);
    }
}
