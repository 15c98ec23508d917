//! services/api/src/web/tags.rs
//!
//! Tag browsing, autocomplete and admin-only tag creation.

use axum::{extract::State, response::IntoResponse};
use doubtstack_core::{
    domain::{TagCategory, TagFilter},
    validation::{self, TagInput, ValidationErrors},
    PortError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::web::{
    extract::{CurrentUser, JsonBody, QueryParams},
    response::{created, ok, HttpError, HttpResult},
    state::AppState,
    views::TagView,
};

const DEFAULT_TAG_LIMIT: i64 = 50;
const SUGGESTION_LIMIT: i64 = 10;
const MIN_SUGGEST_QUERY: usize = 2;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TagListQuery {
    /// Case-insensitive substring of the tag name.
    pub search: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestQuery {
    /// Prefix typed so far; shorter than two characters yields nothing.
    pub query: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(example = "technology")]
    pub category: Option<String>,
    #[serde(default)]
    pub related_tags: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagListView {
    pub tags: Vec<TagView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionsView {
    pub suggestions: Vec<TagView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagEnvelopeView {
    pub tag: TagView,
}

/// GET /tags - Tags, most used first
#[utoipa::path(
    get,
    path = "/api/tags",
    params(TagListQuery),
    responses(
        (status = 200, description = "Matching tags", body = TagListView),
        (status = 400, description = "Invalid category or limit", body = crate::web::response::ErrorBody)
    ),
    tag = "Tags"
)]
pub async fn list_tags_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<TagListQuery>,
) -> HttpResult<impl IntoResponse> {
    let limit = validation::page_request(None, query.limit, DEFAULT_TAG_LIMIT)?.limit;
    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        None => None,
        Some(raw) => Some(
            raw.parse::<TagCategory>()
                .map_err(|_| ValidationErrors::single("category", "Invalid tag category"))?,
        ),
    };

    let filter = TagFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        category,
        limit,
    };
    let tags = state.db.list_tags(&filter).await?;
    Ok(ok(TagListView {
        tags: tags.iter().map(TagView::from).collect(),
    }))
}

/// GET /tags/suggest - Autocomplete by name prefix
#[utoipa::path(
    get,
    path = "/api/tags/suggest",
    params(SuggestQuery),
    responses(
        (status = 200, description = "Up to ten suggestions", body = SuggestionsView)
    ),
    tag = "Tags"
)]
pub async fn suggest_tags_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<SuggestQuery>,
) -> HttpResult<impl IntoResponse> {
    let prefix = query.query.unwrap_or_default();
    let prefix = prefix.trim();
    if prefix.chars().count() < MIN_SUGGEST_QUERY {
        return Ok(ok(SuggestionsView {
            suggestions: Vec::new(),
        }));
    }

    let tags = state.db.suggest_tags(prefix, SUGGESTION_LIMIT).await?;
    Ok(ok(SuggestionsView {
        suggestions: tags.iter().map(TagView::from).collect(),
    }))
}

/// POST /tags - Create a tag (admins only)
#[utoipa::path(
    post,
    path = "/api/tags",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagEnvelopeView),
        (status = 400, description = "Invalid fields", body = crate::web::response::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::web::response::ErrorBody),
        (status = 409, description = "Tag already exists", body = crate::web::response::ErrorBody)
    ),
    tag = "Tags"
)]
pub async fn create_tag_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CreateTagRequest>,
) -> HttpResult<impl IntoResponse> {
    if !user.is_admin() {
        return Err(HttpError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            user.role
        )));
    }

    let new_tag = validation::validate_new_tag(TagInput {
        name: req.name,
        description: req.description,
        category: req.category,
        related_tags: req.related_tags,
    })?;
    let tag = state.db.create_tag(new_tag).await.map_err(|e| match e {
        PortError::Conflict(_) => HttpError::Conflict("Tag already exists".to_string()),
        other => other.into(),
    })?;
    info!(tag = %tag.name, actor_id = %user.id, "Tag created");

    Ok(created(TagEnvelopeView {
        tag: TagView::from(&tag),
    }))
}
