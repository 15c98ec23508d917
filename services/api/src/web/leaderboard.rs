//! services/api/src/web/leaderboard.rs
//!
//! Rankings and platform-wide statistics.

use axum::{extract::State, response::IntoResponse};
use chrono::Utc;
use doubtstack_core::{
    domain::{LeaderboardPeriod, PlatformStats, FACULTY_VERIFIED_BADGE},
    validation::{self, ValidationErrors},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::web::{
    extract::QueryParams,
    response::{ok, HttpResult},
    state::AppState,
    views::{AnswererView, LeaderboardView, RankedUserView, StatsSummaryView},
};

const DEFAULT_LEADERBOARD_LIMIT: i64 = 20;
const FACULTY_VERIFIED_LIMIT: i64 = 10;
const STATS_TOP_N: i64 = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// `all` (default), `weekly` or `monthly`; only narrows the top answerers.
    pub period: Option<String>,
    pub limit: Option<i64>,
}

/// GET /leaderboard - Top users, contributors, answerers and verified faculty picks
#[utoipa::path(
    get,
    path = "/api/leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "The leaderboard", body = LeaderboardView),
        (status = 400, description = "Invalid period or limit", body = crate::web::response::ErrorBody)
    ),
    tag = "Leaderboard"
)]
pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<LeaderboardQuery>,
) -> HttpResult<impl IntoResponse> {
    let limit = validation::page_request(None, query.limit, DEFAULT_LEADERBOARD_LIMIT)?.limit;
    let period = match query.period.as_deref() {
        None | Some("") => LeaderboardPeriod::default(),
        Some(raw) => raw
            .parse::<LeaderboardPeriod>()
            .map_err(|_| ValidationErrors::single("period", "Period must be all, weekly or monthly"))?,
    };

    let top_users = state.db.top_users_by_reputation(limit).await?;
    let top_contributors = state.db.top_contributors(limit).await?;
    let top_answerers = state
        .db
        .top_answerers(period.since(Utc::now()), limit)
        .await?;
    let faculty_verified = state
        .db
        .badge_holders(FACULTY_VERIFIED_BADGE, FACULTY_VERIFIED_LIMIT)
        .await?;

    Ok(ok(LeaderboardView {
        top_users: top_users.iter().map(RankedUserView::from).collect(),
        top_contributors: top_contributors.iter().map(RankedUserView::from).collect(),
        top_answerers: top_answerers.iter().map(AnswererView::from).collect(),
        faculty_verified: faculty_verified.iter().map(RankedUserView::from).collect(),
    }))
}

/// GET /leaderboard/stats - Platform totals, resolution rate, popular tags and departments
#[utoipa::path(
    get,
    path = "/api/leaderboard/stats",
    responses(
        (status = 200, description = "Platform statistics", body = StatsSummaryView)
    ),
    tag = "Leaderboard"
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> HttpResult<impl IntoResponse> {
    let total_users = state.db.count_active_users().await?;
    let (total_doubts, resolved_doubts) = state.db.count_doubts().await?;
    let total_answers = state.db.count_answers().await?;
    let popular_tags = state.db.popular_tags(STATS_TOP_N).await?;
    let active_departments = state.db.active_departments(STATS_TOP_N).await?;

    let stats = PlatformStats {
        total_users,
        total_doubts,
        resolved_doubts,
        total_answers,
        popular_tags,
        active_departments,
    };
    Ok(ok(StatsSummaryView::from(&stats)))
}
