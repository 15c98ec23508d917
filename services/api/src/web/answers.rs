//! services/api/src/web/answers.rs
//!
//! Posting, editing and deleting answers, plus votes, acceptance and faculty
//! verification. The side effects live in `Activity`.

use axum::{extract::State, response::IntoResponse};
use doubtstack_core::{domain::Answer, validation};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    doubts::VoteRequest,
    extract::{CurrentUser, JsonBody, JsonOrForm, PathId},
    response::{created, message, ok, HttpError, HttpResult},
    state::AppState,
    views::{AnswerEnvelopeView, AnswerView, VoteTallyView},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnswerRequest {
    pub content: Option<String>,
    /// Set when replying to another answer on the same doubt.
    pub parent_answer_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAnswerRequest {
    pub content: Option<String>,
}

async fn answer_envelope(state: &AppState, answer: &Answer) -> HttpResult<AnswerEnvelopeView> {
    let authors = state.authors([answer.author_id]).await?;
    Ok(AnswerEnvelopeView {
        answer: AnswerView::new(answer, &authors),
    })
}

/// POST /answers/doubts/{doubtId} - Answer a doubt or reply to an answer
///
/// Takes JSON or `multipart/form-data`; attachment parts in a form are ignored.
#[utoipa::path(
    post,
    path = "/api/answers/doubts/{doubtId}",
    params(("doubtId" = uuid::Uuid, Path, description = "Doubt id")),
    request_body(
        content((CreateAnswerRequest = "application/json"), (CreateAnswerRequest = "multipart/form-data"))
    ),
    responses(
        (status = 201, description = "Answer posted", body = AnswerEnvelopeView),
        (status = 400, description = "Invalid content or parent answer", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Answers"
)]
pub async fn create_answer_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(doubt_id): PathId,
    JsonOrForm(req): JsonOrForm<CreateAnswerRequest>,
) -> HttpResult<impl IntoResponse> {
    let content = validation::validate_answer_content(req.content)?;
    let answer = state
        .activity
        .post_answer(&user, doubt_id, content, req.parent_answer_id)
        .await?;
    Ok(created(answer_envelope(&state, &answer).await?))
}

/// PUT /answers/{id} - Edit an answer (the author or an admin)
#[utoipa::path(
    put,
    path = "/api/answers/{id}",
    params(("id" = uuid::Uuid, Path, description = "Answer id")),
    request_body = UpdateAnswerRequest,
    responses(
        (status = 200, description = "Answer updated", body = AnswerEnvelopeView),
        (status = 403, description = "Not the author", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such answer", body = crate::web::response::ErrorBody)
    ),
    tag = "Answers"
)]
pub async fn update_answer_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(answer_id): PathId,
    JsonBody(req): JsonBody<UpdateAnswerRequest>,
) -> HttpResult<impl IntoResponse> {
    let answer = state.db.get_answer(answer_id).await?;
    if answer.author_id != user.id && !user.is_admin() {
        return Err(HttpError::Forbidden(
            "Not authorized to update this answer".to_string(),
        ));
    }

    let content = validation::validate_answer_content(req.content)?;
    let answer = state.db.edit_answer(answer_id, &content).await?;
    info!(answer_id = %answer.id, actor_id = %user.id, edits = answer.edit_history.len(), "Answer edited");

    Ok(ok(answer_envelope(&state, &answer).await?))
}

/// DELETE /answers/{id} - Delete an answer and its replies
#[utoipa::path(
    delete,
    path = "/api/answers/{id}",
    params(("id" = uuid::Uuid, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Answer deleted"),
        (status = 403, description = "Not the author", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such answer", body = crate::web::response::ErrorBody)
    ),
    tag = "Answers"
)]
pub async fn delete_answer_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(answer_id): PathId,
) -> HttpResult<impl IntoResponse> {
    state.activity.delete_answer(&user, answer_id).await?;
    Ok(message("Answer deleted successfully"))
}

/// POST /answers/{id}/vote - Up- or downvote an answer
#[utoipa::path(
    post,
    path = "/api/answers/{id}/vote",
    params(("id" = uuid::Uuid, Path, description = "Answer id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "The new tally", body = VoteTallyView),
        (status = 400, description = "Invalid vote type", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such answer", body = crate::web::response::ErrorBody)
    ),
    tag = "Answers"
)]
pub async fn vote_answer_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(answer_id): PathId,
    JsonBody(req): JsonBody<VoteRequest>,
) -> HttpResult<impl IntoResponse> {
    let kind = validation::validate_vote(req.vote_type.as_deref())?;
    let tally = state.activity.vote_answer(&user, answer_id, kind).await?;
    Ok(ok(VoteTallyView::from(tally)))
}

/// POST /answers/{id}/accept - Accept an answer as the best one (the doubt author only)
#[utoipa::path(
    post,
    path = "/api/answers/{id}/accept",
    params(("id" = uuid::Uuid, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Answer accepted", body = AnswerEnvelopeView),
        (status = 403, description = "Not the doubt author", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such answer", body = crate::web::response::ErrorBody)
    ),
    tag = "Answers"
)]
pub async fn accept_answer_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(answer_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let answer = state.activity.accept_answer(&user, answer_id).await?;
    Ok(ok(answer_envelope(&state, &answer).await?))
}

/// POST /answers/{id}/verify - Toggle faculty verification (faculty and admins)
#[utoipa::path(
    post,
    path = "/api/answers/{id}/verify",
    params(("id" = uuid::Uuid, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Verification toggled", body = AnswerEnvelopeView),
        (status = 403, description = "Role may not verify", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such answer", body = crate::web::response::ErrorBody)
    ),
    tag = "Answers"
)]
pub async fn verify_answer_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(answer_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let answer = state.activity.verify_answer(&user, answer_id).await?;
    Ok(ok(answer_envelope(&state, &answer).await?))
}
