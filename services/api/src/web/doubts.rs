//! services/api/src/web/doubts.rs
//!
//! Doubt listing, detail, authoring, resolution, votes and follows.

use axum::{extract::State, response::IntoResponse};
use doubtstack_core::{
    domain::{build_answer_threads, Doubt, DoubtFilter, DoubtSort, DoubtUpdate, User},
    validation::{self, DoubtInput, ValidationErrors},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::web::{
    extract::{CurrentUser, JsonBody, PathId, QueryParams},
    response::{created, message, ok, HttpError, HttpResult},
    state::AppState,
    views::{
        AnswerView, DoubtDetailView, DoubtEnvelopeView, DoubtListView, DoubtView, FollowView,
        PaginationView, VoteTallyView,
    },
};

//=========================================================================================
// Request Types
//=========================================================================================

/// Tags arrive either as a JSON array or as one comma-separated string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TagsField {
    List(Vec<String>),
    Csv(String),
}

impl TagsField {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TagsField::List(tags) => tags,
            TagsField::Csv(raw) => validation::split_tags(&raw),
        }
    }
}

/// A boolean that form submissions may send as `"true"` or `"on"`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FlagField {
    Bool(bool),
    Text(String),
}

impl FlagField {
    pub fn is_set(&self) -> bool {
        match self {
            FlagField::Bool(value) => *value,
            FlagField::Text(raw) => validation::is_truthy(raw),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DoubtListQuery {
    pub subject: Option<String>,
    pub department: Option<String>,
    /// Comma-separated; a doubt matches when it carries any of them.
    pub tags: Option<String>,
    pub is_resolved: Option<String>,
    pub is_urgent: Option<String>,
    pub search: Option<String>,
    /// `-createdAt` (default), `createdAt`, `-views`, `-answerCount` or `-voteScore`.
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl DoubtListQuery {
    fn into_filter(self) -> Result<DoubtFilter, ValidationErrors> {
        let sort = match self.sort.as_deref() {
            None | Some("") => DoubtSort::default(),
            Some(raw) => raw.parse::<DoubtSort>().map_err(|_| {
                ValidationErrors::single("sort", "Unsupported sort order")
            })?,
        };
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Ok(DoubtFilter {
            subject: non_empty(self.subject),
            department: non_empty(self.department),
            author_id: None,
            tags: self
                .tags
                .as_deref()
                .map(validation::split_tags)
                .unwrap_or_default(),
            is_resolved: self.is_resolved.as_deref().map(validation::is_truthy),
            is_urgent: self.is_urgent.as_deref().map(validation::is_truthy),
            search: non_empty(self.search).map(|s| s.trim().to_string()),
            sort,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoubtRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub tags: Option<TagsField>,
    pub is_urgent: Option<FlagField>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoubtRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub tags: Option<TagsField>,
    pub is_urgent: Option<FlagField>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[schema(example = "upvote")]
    pub vote_type: Option<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn ensure_author_or_admin(user: &User, doubt: &Doubt, action: &str) -> HttpResult<()> {
    if doubt.author_id == user.id || user.is_admin() {
        Ok(())
    } else {
        Err(HttpError::Forbidden(format!(
            "Not authorized to {} this doubt",
            action
        )))
    }
}

async fn doubt_envelope(state: &AppState, doubt: &Doubt) -> HttpResult<DoubtEnvelopeView> {
    let authors = state.authors([doubt.author_id]).await?;
    Ok(DoubtEnvelopeView {
        doubt: DoubtView::new(doubt, &authors),
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /doubts - Filtered, sorted and paginated doubts
#[utoipa::path(
    get,
    path = "/api/doubts",
    params(DoubtListQuery),
    responses(
        (status = 200, description = "A page of doubts", body = DoubtListView),
        (status = 400, description = "Invalid filters or paging", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn list_doubts_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<DoubtListQuery>,
) -> HttpResult<impl IntoResponse> {
    let page = validation::page_request(query.page, query.limit, 10)?;
    let filter = query.into_filter()?;

    let doubts = state.db.list_doubts(&filter, page).await?;
    let authors = state
        .authors(doubts.items.iter().map(|d| d.author_id))
        .await?;

    Ok(ok(DoubtListView {
        pagination: PaginationView::from(&doubts),
        doubts: doubts
            .items
            .iter()
            .map(|d| DoubtView::new(d, &authors))
            .collect(),
    }))
}

/// GET /doubts/{id} - One doubt with its threaded answers; counts a view
#[utoipa::path(
    get,
    path = "/api/doubts/{id}",
    params(("id" = uuid::Uuid, Path, description = "Doubt id")),
    responses(
        (status = 200, description = "The doubt and its answers", body = DoubtDetailView),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn get_doubt_handler(
    State(state): State<Arc<AppState>>,
    PathId(doubt_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let doubt = state.db.increment_doubt_views(doubt_id).await?;
    let answers = state.db.list_answers_for_doubt(doubt_id).await?;

    let authors = state
        .authors(
            std::iter::once(doubt.author_id).chain(answers.iter().map(|a| a.author_id)),
        )
        .await?;
    let threads = build_answer_threads(answers);

    Ok(ok(DoubtDetailView {
        doubt: DoubtView::new(&doubt, &authors),
        answers: threads
            .iter()
            .map(|thread| AnswerView::thread(thread, &authors))
            .collect(),
    }))
}

/// POST /doubts - Ask a new doubt
#[utoipa::path(
    post,
    path = "/api/doubts",
    request_body = CreateDoubtRequest,
    responses(
        (status = 201, description = "Doubt created", body = DoubtEnvelopeView),
        (status = 400, description = "Invalid fields", body = crate::web::response::ErrorBody),
        (status = 401, description = "Not authenticated", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn create_doubt_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CreateDoubtRequest>,
) -> HttpResult<impl IntoResponse> {
    let draft = validation::validate_new_doubt(DoubtInput {
        title: req.title,
        description: req.description,
        subject: req.subject,
        tags: req.tags.map(TagsField::into_vec).unwrap_or_default(),
        is_urgent: req.is_urgent.as_ref().is_some_and(FlagField::is_set),
    })?;

    let doubt = state.activity.post_doubt(&user, draft).await?;
    Ok(created(doubt_envelope(&state, &doubt).await?))
}

/// PUT /doubts/{id} - Edit a doubt (the author or an admin)
#[utoipa::path(
    put,
    path = "/api/doubts/{id}",
    params(("id" = uuid::Uuid, Path, description = "Doubt id")),
    request_body = UpdateDoubtRequest,
    responses(
        (status = 200, description = "Doubt updated", body = DoubtEnvelopeView),
        (status = 403, description = "Not the author", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn update_doubt_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(doubt_id): PathId,
    JsonBody(req): JsonBody<UpdateDoubtRequest>,
) -> HttpResult<impl IntoResponse> {
    let doubt = state.db.get_doubt(doubt_id).await?;
    ensure_author_or_admin(&user, &doubt, "update")?;

    let update = validation::validate_doubt_update(DoubtUpdate {
        title: req.title,
        description: req.description,
        tags: req.tags.map(TagsField::into_vec),
        subject: req.subject,
        is_urgent: req.is_urgent.as_ref().map(FlagField::is_set),
    })?;
    let doubt = state.db.update_doubt(doubt_id, update).await?;
    info!(doubt_id = %doubt.id, actor_id = %user.id, "Doubt updated");

    Ok(ok(doubt_envelope(&state, &doubt).await?))
}

/// DELETE /doubts/{id} - Delete a doubt and all of its answers
#[utoipa::path(
    delete,
    path = "/api/doubts/{id}",
    params(("id" = uuid::Uuid, Path, description = "Doubt id")),
    responses(
        (status = 200, description = "Doubt deleted"),
        (status = 403, description = "Not the author", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn delete_doubt_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(doubt_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let doubt = state.db.get_doubt(doubt_id).await?;
    ensure_author_or_admin(&user, &doubt, "delete")?;

    state.db.delete_doubt(doubt_id).await?;
    info!(doubt_id = %doubt_id, actor_id = %user.id, "Doubt deleted");
    Ok(message("Doubt deleted successfully"))
}

/// PUT /doubts/{id}/resolve - Mark a doubt resolved (the author only)
#[utoipa::path(
    put,
    path = "/api/doubts/{id}/resolve",
    params(("id" = uuid::Uuid, Path, description = "Doubt id")),
    responses(
        (status = 200, description = "Doubt resolved", body = DoubtEnvelopeView),
        (status = 403, description = "Not the author", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn resolve_doubt_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(doubt_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let doubt = state.db.get_doubt(doubt_id).await?;
    if doubt.author_id != user.id {
        return Err(HttpError::Forbidden(
            "Only the doubt author can mark it as resolved".to_string(),
        ));
    }

    let doubt = state.db.mark_doubt_resolved(doubt_id, None).await?;
    info!(doubt_id = %doubt.id, "Doubt resolved");
    Ok(ok(doubt_envelope(&state, &doubt).await?))
}

/// POST /doubts/{id}/vote - Up- or downvote a doubt
#[utoipa::path(
    post,
    path = "/api/doubts/{id}/vote",
    params(("id" = uuid::Uuid, Path, description = "Doubt id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "The new tally", body = VoteTallyView),
        (status = 400, description = "Invalid vote type", body = crate::web::response::ErrorBody),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn vote_doubt_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(doubt_id): PathId,
    JsonBody(req): JsonBody<VoteRequest>,
) -> HttpResult<impl IntoResponse> {
    let kind = validation::validate_vote(req.vote_type.as_deref())?;
    let tally = state.activity.vote_doubt(&user, doubt_id, kind).await?;
    Ok(ok(VoteTallyView::from(tally)))
}

/// POST /doubts/{id}/follow - Toggle following a doubt
#[utoipa::path(
    post,
    path = "/api/doubts/{id}/follow",
    params(("id" = uuid::Uuid, Path, description = "Doubt id")),
    responses(
        (status = 200, description = "The new follow state", body = FollowView),
        (status = 404, description = "No such doubt", body = crate::web::response::ErrorBody)
    ),
    tag = "Doubts"
)]
pub async fn follow_doubt_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(doubt_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let follow = state.db.toggle_follow(doubt_id, user.id).await?;
    Ok(ok(FollowView {
        is_following: follow.is_following,
        follower_count: follow.follower_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_parses_loose_flags_and_tags() {
        let query = DoubtListQuery {
            tags: Some("rust, async ,".into()),
            is_resolved: Some("false".into()),
            is_urgent: Some("on".into()),
            search: Some("  ".into()),
            sort: Some("-views".into()),
            ..DoubtListQuery::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.tags, vec!["rust", "async"]);
        assert_eq!(filter.is_resolved, Some(false));
        assert_eq!(filter.is_urgent, Some(true));
        assert_eq!(filter.search, None);
        assert_eq!(filter.sort, DoubtSort::MostViewed);
    }

    #[test]
    fn unknown_sort_is_rejected() {
        let query = DoubtListQuery {
            sort: Some("title".into()),
            ..DoubtListQuery::default()
        };
        let errors = query.into_filter().unwrap_err();
        assert_eq!(errors.0[0].field, "sort");
    }

    #[test]
    fn tags_and_flags_accept_both_shapes() {
        let body: CreateDoubtRequest =
            serde_json::from_str(r#"{"tags":"a, b","isUrgent":"true"}"#).unwrap();
        assert_eq!(body.tags.unwrap().into_vec(), vec!["a", "b"]);
        assert!(body.is_urgent.unwrap().is_set());

        let body: CreateDoubtRequest =
            serde_json::from_str(r#"{"tags":["x"],"isUrgent":false}"#).unwrap();
        assert_eq!(body.tags.unwrap().into_vec(), vec!["x"]);
        assert!(!body.is_urgent.unwrap().is_set());
    }
}
