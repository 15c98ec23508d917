//! services/api/src/web/users.rs
//!
//! Public profiles, profile updates and a user's posting history.

use axum::{extract::State, response::IntoResponse};
use doubtstack_core::{
    domain::{DoubtFilter, ProfileUpdate},
    validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::{
    auth::UserEnvelopeView,
    extract::{CurrentUser, JsonBody, PathId, QueryParams},
    response::{ok, HttpError, HttpResult},
    state::AppState,
    views::{DoubtListView, DoubtRefView, DoubtView, PaginationView, UserAnswerListView, UserAnswerView, UserView},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub profile_photo: Option<String>,
}

/// GET /users/{id} - A user's public profile
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = uuid::Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "The profile", body = UserEnvelopeView),
        (status = 400, description = "Malformed id", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such user", body = crate::web::response::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    PathId(user_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let user = state.db.get_user_by_id(user_id).await?;
    Ok(ok(UserEnvelopeView {
        user: UserView::from(&user),
    }))
}

/// PUT /users/{id} - Update a profile (the owner or an admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = uuid::Uuid, Path, description = "User id")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "The updated profile", body = UserEnvelopeView),
        (status = 400, description = "Invalid fields", body = crate::web::response::ErrorBody),
        (status = 403, description = "Not the owner", body = crate::web::response::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(actor): CurrentUser,
    PathId(user_id): PathId,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> HttpResult<impl IntoResponse> {
    if actor.id != user_id && !actor.is_admin() {
        return Err(HttpError::Forbidden(
            "Not authorized to update this profile".to_string(),
        ));
    }

    let update = validation::validate_profile_update(ProfileUpdate {
        name: req.name,
        bio: req.bio,
        branch: req.branch,
        semester: req.semester,
        profile_photo: req.profile_photo,
    })?;
    let user = state.db.update_profile(user_id, update).await?;
    info!(user_id = %user.id, actor_id = %actor.id, "Profile updated");

    Ok(ok(UserEnvelopeView {
        user: UserView::from(&user),
    }))
}

/// GET /users/{id}/doubts - Doubts the user asked, newest first
#[utoipa::path(
    get,
    path = "/api/users/{id}/doubts",
    params(("id" = uuid::Uuid, Path, description = "User id"), PageQuery),
    responses(
        (status = 200, description = "A page of doubts", body = DoubtListView),
        (status = 400, description = "Malformed id or paging", body = crate::web::response::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn user_doubts_handler(
    State(state): State<Arc<AppState>>,
    PathId(user_id): PathId,
    QueryParams(query): QueryParams<PageQuery>,
) -> HttpResult<impl IntoResponse> {
    let page = validation::page_request(query.page, query.limit, 10)?;
    let filter = DoubtFilter {
        author_id: Some(user_id),
        ..DoubtFilter::default()
    };
    let doubts = state.db.list_doubts(&filter, page).await?;
    let authors = state.authors([user_id]).await?;

    Ok(ok(DoubtListView {
        pagination: PaginationView::from(&doubts),
        doubts: doubts
            .items
            .iter()
            .map(|d| DoubtView::new(d, &authors))
            .collect(),
    }))
}

/// GET /users/{id}/answers - Answers the user wrote, newest first
#[utoipa::path(
    get,
    path = "/api/users/{id}/answers",
    params(("id" = uuid::Uuid, Path, description = "User id"), PageQuery),
    responses(
        (status = 200, description = "A page of answers with their doubt titles", body = UserAnswerListView),
        (status = 400, description = "Malformed id or paging", body = crate::web::response::ErrorBody)
    ),
    tag = "Users"
)]
pub async fn user_answers_handler(
    State(state): State<Arc<AppState>>,
    PathId(user_id): PathId,
    QueryParams(query): QueryParams<PageQuery>,
) -> HttpResult<impl IntoResponse> {
    let page = validation::page_request(query.page, query.limit, 10)?;
    let answers = state.db.list_answers_by_author(user_id, page).await?;
    let authors = state.authors([user_id]).await?;

    let mut doubt_ids: Vec<Uuid> = answers.items.iter().map(|a| a.doubt_id).collect();
    doubt_ids.sort_unstable();
    doubt_ids.dedup();
    let titles: HashMap<Uuid, String> = state
        .db
        .get_doubts_by_ids(&doubt_ids)
        .await?
        .into_iter()
        .map(|d| (d.id, d.title))
        .collect();

    Ok(ok(UserAnswerListView {
        pagination: PaginationView::from(&answers),
        answers: answers
            .items
            .iter()
            .map(|a| {
                let doubt = titles.get(&a.doubt_id).map(|title| DoubtRefView {
                    id: a.doubt_id,
                    title: title.clone(),
                });
                UserAnswerView::new(a, &authors, doubt)
            })
            .collect(),
    }))
}
