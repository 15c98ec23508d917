//! services/api/src/web/router.rs
//!
//! Assembles every route of the API into one axum `Router`.

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::web::{
    answers, auth, doubts, leaderboard, middleware::require_auth, notifications, rest, state::AppState,
    tags, users, ws_handler::ws_handler,
};

/// Builds the application router: public and protected routes, the JSON 404
/// fallback, request tracing and CORS for the configured client origin.
pub fn build_router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let client_origin = state.config.client_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "CLIENT_URL '{}' is not a valid origin: {}",
            state.config.client_url, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(client_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(rest::health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/users/{id}", get(users::get_user_handler))
        .route("/api/users/{id}/doubts", get(users::user_doubts_handler))
        .route("/api/users/{id}/answers", get(users::user_answers_handler))
        .route("/api/doubts", get(doubts::list_doubts_handler))
        .route("/api/doubts/{id}", get(doubts::get_doubt_handler))
        .route("/api/tags", get(tags::list_tags_handler))
        .route("/api/tags/suggest", get(tags::suggest_tags_handler))
        .route("/api/leaderboard", get(leaderboard::leaderboard_handler))
        .route("/api/leaderboard/stats", get(leaderboard::stats_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/auth/updatepassword", put(auth::update_password_handler))
        .route("/api/users/{id}", put(users::update_user_handler))
        .route("/api/doubts", post(doubts::create_doubt_handler))
        .route(
            "/api/doubts/{id}",
            put(doubts::update_doubt_handler).delete(doubts::delete_doubt_handler),
        )
        .route("/api/doubts/{id}/resolve", put(doubts::resolve_doubt_handler))
        .route("/api/doubts/{id}/vote", post(doubts::vote_doubt_handler))
        .route("/api/doubts/{id}/follow", post(doubts::follow_doubt_handler))
        .route("/api/answers/doubts/{id}", post(answers::create_answer_handler))
        .route(
            "/api/answers/{id}",
            put(answers::update_answer_handler).delete(answers::delete_answer_handler),
        )
        .route("/api/answers/{id}/vote", post(answers::vote_answer_handler))
        .route("/api/answers/{id}/accept", post(answers::accept_answer_handler))
        .route("/api/answers/{id}/verify", post(answers::verify_answer_handler))
        .route("/api/tags", post(tags::create_tag_handler))
        .route("/api/notifications", get(notifications::list_notifications_handler))
        .route("/api/notifications/read-all", put(notifications::mark_all_read_handler))
        .route("/api/notifications/{id}/read", put(notifications::mark_read_handler))
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(notifications::delete_notification_handler),
        )
        .route("/ws", get(ws_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(rest::not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
