//! services/api/src/web/notifications.rs
//!
//! The authenticated user's stored notifications.

use axum::{extract::State, response::IntoResponse};
use doubtstack_core::{domain::Notification, validation, PortError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::web::{
    extract::{CurrentUser, PathId, QueryParams},
    response::{message, ok, HttpError, HttpResult},
    state::AppState,
    views::{
        AnswerRefView, DoubtRefView, NotificationEnvelopeView, NotificationListView,
        NotificationView, PaginationView, SenderView,
    },
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// `true` for read notifications only, anything else for unread only.
    pub is_read: Option<String>,
}

/// Joins sender, doubt title and answer content onto each notification.
/// Doubts or answers deleted since the notification was sent come back absent.
async fn hydrate(state: &AppState, notifications: &[Notification]) -> HttpResult<Vec<NotificationView>> {
    let senders = state
        .authors(notifications.iter().map(|n| n.sender_id))
        .await?;

    let mut doubt_ids: Vec<Uuid> = notifications.iter().filter_map(|n| n.doubt_id).collect();
    doubt_ids.sort_unstable();
    doubt_ids.dedup();
    let mut answer_ids: Vec<Uuid> = notifications.iter().filter_map(|n| n.answer_id).collect();
    answer_ids.sort_unstable();
    answer_ids.dedup();

    let doubts: HashMap<Uuid, DoubtRefView> = state
        .db
        .get_doubts_by_ids(&doubt_ids)
        .await?
        .into_iter()
        .map(|d| (d.id, DoubtRefView { id: d.id, title: d.title }))
        .collect();
    let answers: HashMap<Uuid, AnswerRefView> = state
        .db
        .get_answers_by_ids(&answer_ids)
        .await?
        .into_iter()
        .map(|a| {
            (
                a.id,
                AnswerRefView {
                    id: a.id,
                    content: Some(a.content),
                },
            )
        })
        .collect();

    Ok(notifications
        .iter()
        .map(|n| {
            NotificationView::new(
                n,
                senders.get(&n.sender_id).map(SenderView::from),
                n.doubt_id.and_then(|id| doubts.get(&id).cloned()),
                n.answer_id.and_then(|id| answers.get(&id).cloned()),
            )
        })
        .collect())
}

/// GET /notifications - The current user's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "A page of notifications", body = NotificationListView),
        (status = 401, description = "Not authenticated", body = crate::web::response::ErrorBody)
    ),
    tag = "Notifications"
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<NotificationQuery>,
) -> HttpResult<impl IntoResponse> {
    let page = validation::page_request(query.page, query.limit, 10)?;
    let is_read = query.is_read.as_deref().map(|v| v == "true");

    let notifications = state.db.list_notifications(user.id, is_read, page).await?;
    let views = hydrate(&state, &notifications.items).await?;

    Ok(ok(NotificationListView {
        pagination: PaginationView::from(&notifications),
        notifications: views,
    }))
}

/// PUT /notifications/{id}/read - Mark one notification read
#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id" = uuid::Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationEnvelopeView),
        (status = 404, description = "Not found or not yours", body = crate::web::response::ErrorBody)
    ),
    tag = "Notifications"
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(notification_id): PathId,
) -> HttpResult<impl IntoResponse> {
    let notification = state
        .db
        .mark_notification_read(notification_id, user.id)
        .await
        .map_err(not_found)?;
    let mut views = hydrate(&state, std::slice::from_ref(&notification)).await?;
    let view = views
        .pop()
        .ok_or_else(|| HttpError::Internal("Notification vanished while rendering".to_string()))?;

    Ok(ok(NotificationEnvelopeView { notification: view }))
}

/// PUT /notifications/read-all - Mark every unread notification read
#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "How many notifications changed")
    ),
    tag = "Notifications"
)]
pub async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> HttpResult<impl IntoResponse> {
    let changed = state.db.mark_all_notifications_read(user.id).await?;
    Ok(message(format!("Marked {} notifications as read", changed)))
}

/// DELETE /notifications/{id} - Delete one of the current user's notifications
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = uuid::Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "Not found or not yours", body = crate::web::response::ErrorBody)
    ),
    tag = "Notifications"
)]
pub async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    PathId(notification_id): PathId,
) -> HttpResult<impl IntoResponse> {
    state
        .db
        .delete_notification(notification_id, user.id)
        .await
        .map_err(not_found)?;
    Ok(message("Notification deleted successfully"))
}

fn not_found(err: PortError) -> HttpError {
    match err {
        PortError::NotFound(_) => HttpError::NotFound("Notification not found".to_string()),
        other => other.into(),
    }
}
