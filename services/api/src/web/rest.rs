//! services/api/src/web/rest.rs
//!
//! Contains the health and fallback handlers and the master definition for
//! the OpenAPI specification.

use axum::{response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::web::{
    answers, auth, doubts, leaderboard, notifications,
    response::{ErrorBody, FieldErrorBody, HttpError},
    tags, users, views, ws_handler,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::update_password_handler,
        users::get_user_handler,
        users::update_user_handler,
        users::user_doubts_handler,
        users::user_answers_handler,
        doubts::list_doubts_handler,
        doubts::get_doubt_handler,
        doubts::create_doubt_handler,
        doubts::update_doubt_handler,
        doubts::delete_doubt_handler,
        doubts::resolve_doubt_handler,
        doubts::vote_doubt_handler,
        doubts::follow_doubt_handler,
        answers::create_answer_handler,
        answers::update_answer_handler,
        answers::delete_answer_handler,
        answers::vote_answer_handler,
        answers::accept_answer_handler,
        answers::verify_answer_handler,
        tags::list_tags_handler,
        tags::suggest_tags_handler,
        tags::create_tag_handler,
        notifications::list_notifications_handler,
        notifications::mark_read_handler,
        notifications::mark_all_read_handler,
        notifications::delete_notification_handler,
        leaderboard::leaderboard_handler,
        leaderboard::stats_handler,
        ws_handler::ws_handler,
    ),
    components(
        schemas(
            HealthView,
            ErrorBody,
            FieldErrorBody,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UpdatePasswordRequest,
            auth::AuthView,
            auth::UserEnvelopeView,
            auth::TokenView,
            users::UpdateProfileRequest,
            doubts::CreateDoubtRequest,
            doubts::UpdateDoubtRequest,
            doubts::VoteRequest,
            doubts::TagsField,
            doubts::FlagField,
            answers::CreateAnswerRequest,
            answers::UpdateAnswerRequest,
            tags::CreateTagRequest,
            tags::TagListView,
            tags::SuggestionsView,
            tags::TagEnvelopeView,
            views::UserView,
            views::AuthorView,
            views::DoubtView,
            views::DoubtListView,
            views::DoubtDetailView,
            views::AnswerView,
            views::UserAnswerListView,
            views::NotificationView,
            views::NotificationListView,
            views::LeaderboardView,
            views::StatsSummaryView,
        )
    ),
    tags(
        (name = "DoubtStack API", description = "Campus Q&A: doubts, answers, reputation and notifications.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health and Fallback
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthView {
    #[schema(value_type = String, example = "success")]
    status: &'static str,
    #[schema(value_type = String)]
    message: &'static str,
    timestamp: DateTime<Utc>,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "The API is up", body = HealthView)
    ),
    tag = "Health"
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthView {
        status: "success",
        message: "DoubtStack API is running",
        timestamp: Utc::now(),
    })
}

pub async fn not_found_handler() -> HttpError {
    HttpError::NotFound("Route not found".to_string())
}
