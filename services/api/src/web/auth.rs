//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: registration, login, logout, the current user
//! and password changes.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use doubtstack_core::{
    domain::NewUser,
    validation::{self, RegistrationInput},
    PortError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    extract::{CurrentUser, JsonBody},
    middleware::{session_token, SESSION_COOKIE},
    response::{created, message, ok, HttpError, HttpResult},
    state::AppState,
    views::UserView,
};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[schema(example = "student")]
    pub role: Option<String>,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub semester: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthView {
    pub user: UserView,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelopeView {
    pub user: UserView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenView {
    pub token: String,
}

//=========================================================================================
// Password and Session Helpers
//=========================================================================================

pub fn hash_password(password: &str) -> HttpResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HttpError::Internal(format!("Failed to hash password: {:?}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> HttpResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| HttpError::Internal(format!("Failed to parse password hash: {:?}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Creates a new auth session and returns its token with the matching cookie.
async fn issue_session(state: &AppState, user_id: Uuid) -> HttpResult<(String, String)> {
    let token = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    state
        .db
        .create_auth_session(&token, user_id, Utc::now() + ttl)
        .await?;

    let cookie = format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.num_seconds()
    );
    Ok((token, cookie))
}

fn invalid_credentials() -> HttpError {
    HttpError::Unauthorized("Invalid email or password".to_string())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthView),
        (status = 400, description = "Invalid request", body = crate::web::response::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::web::response::ErrorBody)
    ),
    tag = "Auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> HttpResult<impl IntoResponse> {
    let registration = validation::validate_registration(RegistrationInput {
        name: req.name,
        email: req.email,
        password: req.password,
        role: req.role,
        branch: req.branch,
        department: req.department,
        semester: req.semester,
    })?;

    let hashed_password = hash_password(&registration.password)?;
    let user = state
        .db
        .create_user(NewUser {
            name: registration.name,
            email: registration.email,
            hashed_password,
            role: registration.role,
            branch: registration.branch,
            department: registration.department,
            semester: registration.semester,
        })
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                HttpError::Conflict("User already exists with this email".to_string())
            }
            other => other.into(),
        })?;

    let (token, cookie) = issue_session(&state, user.id).await?;
    info!(user_id = %user.id, role = user.role.as_str(), "User registered");

    Ok((
        [(header::SET_COOKIE, cookie)],
        created(AuthView {
            user: UserView::from(&user),
            token,
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthView),
        (status = 400, description = "Invalid request", body = crate::web::response::ErrorBody),
        (status = 401, description = "Invalid credentials", body = crate::web::response::ErrorBody)
    ),
    tag = "Auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> HttpResult<impl IntoResponse> {
    let email = validation::validate_login(&req.email, &req.password)?;

    let credentials = state
        .db
        .get_user_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid_credentials(),
            other => other.into(),
        })?;

    if !verify_password(&req.password, &credentials.hashed_password)? {
        return Err(invalid_credentials());
    }

    let user = state.db.get_user_by_id(credentials.user_id).await?;
    if !user.is_active {
        return Err(HttpError::Unauthorized(
            "User account is deactivated".to_string(),
        ));
    }

    let (token, cookie) = issue_session(&state, user.id).await?;
    info!(user_id = %user.id, "User logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        ok(AuthView {
            user: UserView::from(&user),
            token,
        }),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful")
    ),
    tag = "Auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HttpResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        state.db.delete_auth_session(&token).await.map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            HttpError::from(e)
        })?;
    }

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        message("Logged out successfully"),
    ))
}

/// GET /auth/me - The authenticated user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserEnvelopeView),
        (status = 401, description = "Not authenticated", body = crate::web::response::ErrorBody)
    ),
    tag = "Auth"
)]
pub async fn me_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ok(UserEnvelopeView {
        user: UserView::from(&user),
    })
}

/// PUT /auth/updatepassword - Change the password and get a fresh token
#[utoipa::path(
    put,
    path = "/api/auth/updatepassword",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = TokenView),
        (status = 400, description = "New password too short", body = crate::web::response::ErrorBody),
        (status = 401, description = "Current password is incorrect", body = crate::web::response::ErrorBody)
    ),
    tag = "Auth"
)]
pub async fn update_password_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<UpdatePasswordRequest>,
) -> HttpResult<impl IntoResponse> {
    validation::validate_new_password(&req.new_password)?;

    let credentials = state.db.get_credentials(user.id).await?;
    if !verify_password(&req.current_password, &credentials.hashed_password)? {
        return Err(HttpError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let hashed = hash_password(&req.new_password)?;
    state.db.update_password(user.id, &hashed).await?;

    let (token, cookie) = issue_session(&state, user.id).await?;
    info!(user_id = %user.id, "Password updated");

    Ok(([(header::SET_COOKIE, cookie)], ok(TokenView { token })))
}
