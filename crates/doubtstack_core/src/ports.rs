//! crates/doubtstack_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or sockets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Answer, AnswererRank, CountEntry, Doubt, DoubtFilter, DoubtUpdate, FollowState,
    LiveNotification, NewAnswer, NewDoubt, NewNotification, NewTag, NewUser, Notification, Page,
    PageRequest, ProfileUpdate, Tag, TagFilter, User, UserCredentials, VoteKind, VoteOutcome,
};
use crate::reputation::ReputationAction;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    /// Users in the same order as `ids`; unknown ids are skipped.
    async fn get_users_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<User>>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_credentials(&self, user_id: Uuid) -> PortResult<UserCredentials>;

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User>;

    /// Applies the action's points (clamped at zero) and bumps its stat counter.
    async fn apply_reputation(&self, user_id: Uuid, action: ReputationAction) -> PortResult<User>;

    /// Adds the badge unless the user already holds one with that name.
    /// Returns whether it was added.
    async fn award_badge(&self, user_id: Uuid, name: &str, icon: &str) -> PortResult<bool>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user of a live session; expired sessions are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Doubts ---
    async fn create_doubt(&self, doubt: NewDoubt) -> PortResult<Doubt>;

    async fn get_doubt(&self, doubt_id: Uuid) -> PortResult<Doubt>;

    /// Doubts in the same order as `ids`; unknown ids are skipped.
    async fn get_doubts_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<Doubt>>;

    async fn list_doubts(&self, filter: &DoubtFilter, page: PageRequest) -> PortResult<Page<Doubt>>;

    async fn update_doubt(&self, doubt_id: Uuid, update: DoubtUpdate) -> PortResult<Doubt>;

    /// Deletes the doubt and every answer posted on it.
    async fn delete_doubt(&self, doubt_id: Uuid) -> PortResult<()>;

    async fn increment_doubt_views(&self, doubt_id: Uuid) -> PortResult<Doubt>;

    async fn adjust_answer_count(&self, doubt_id: Uuid, delta: i64) -> PortResult<()>;

    /// Sets `is_resolved`, `resolved_at` and optionally the accepted answer.
    async fn mark_doubt_resolved(
        &self,
        doubt_id: Uuid,
        accepted_answer_id: Option<Uuid>,
    ) -> PortResult<Doubt>;

    /// Drops the accepted answer and marks the doubt unresolved.
    async fn clear_accepted_answer(&self, doubt_id: Uuid) -> PortResult<()>;

    async fn vote_doubt(&self, doubt_id: Uuid, voter: Uuid, kind: VoteKind) -> PortResult<VoteOutcome>;

    async fn toggle_follow(&self, doubt_id: Uuid, user_id: Uuid) -> PortResult<FollowState>;

    // --- Answers ---
    async fn create_answer(&self, answer: NewAnswer) -> PortResult<Answer>;

    async fn get_answer(&self, answer_id: Uuid) -> PortResult<Answer>;

    /// Answers in the same order as `ids`; unknown ids are skipped.
    async fn get_answers_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<Answer>>;

    async fn list_answers_for_doubt(&self, doubt_id: Uuid) -> PortResult<Vec<Answer>>;

    /// Newest first.
    async fn list_answers_by_author(&self, author_id: Uuid, page: PageRequest) -> PortResult<Page<Answer>>;

    /// Replaces the content, pushing the old content onto the edit history.
    async fn edit_answer(&self, answer_id: Uuid, content: &str) -> PortResult<Answer>;

    /// Deletes the answer and its whole reply subtree. Returns how many answers were removed.
    async fn delete_answer(&self, answer_id: Uuid) -> PortResult<i64>;

    async fn set_answer_accepted(&self, answer_id: Uuid, accepted: bool) -> PortResult<()>;

    /// `Some(verifier)` marks the answer verified, `None` clears the verification.
    async fn set_answer_verification(&self, answer_id: Uuid, verified_by: Option<Uuid>) -> PortResult<Answer>;

    async fn vote_answer(&self, answer_id: Uuid, voter: Uuid, kind: VoteKind) -> PortResult<VoteOutcome>;

    // --- Tags ---
    /// Increments the usage count of `name`, creating the tag if needed.
    async fn increment_tag_usage(&self, name: &str) -> PortResult<()>;

    async fn list_tags(&self, filter: &TagFilter) -> PortResult<Vec<Tag>>;

    /// Case-insensitive prefix match, most used first.
    async fn suggest_tags(&self, prefix: &str, limit: i64) -> PortResult<Vec<Tag>>;

    /// Fails with `Conflict` when a tag with that name exists.
    async fn create_tag(&self, tag: NewTag) -> PortResult<Tag>;

    // --- Notifications ---
    async fn create_notification(&self, notification: NewNotification) -> PortResult<Notification>;

    /// Newest first.
    async fn list_notifications(
        &self,
        recipient: Uuid,
        is_read: Option<bool>,
        page: PageRequest,
    ) -> PortResult<Page<Notification>>;

    /// Only the recipient may mark it; anything else is `NotFound`.
    async fn mark_notification_read(&self, notification_id: Uuid, recipient: Uuid) -> PortResult<Notification>;

    /// Returns the number of notifications that changed.
    async fn mark_all_notifications_read(&self, recipient: Uuid) -> PortResult<u64>;

    async fn delete_notification(&self, notification_id: Uuid, recipient: Uuid) -> PortResult<()>;

    // --- Leaderboard & Statistics ---
    async fn top_users_by_reputation(&self, limit: i64) -> PortResult<Vec<User>>;

    async fn top_contributors(&self, limit: i64) -> PortResult<Vec<User>>;

    async fn top_answerers(&self, since: Option<DateTime<Utc>>, limit: i64) -> PortResult<Vec<AnswererRank>>;

    async fn badge_holders(&self, badge: &str, limit: i64) -> PortResult<Vec<User>>;

    async fn count_active_users(&self) -> PortResult<i64>;

    /// Returns `(total, resolved)`.
    async fn count_doubts(&self) -> PortResult<(i64, i64)>;

    async fn count_answers(&self) -> PortResult<i64>;

    async fn popular_tags(&self, limit: i64) -> PortResult<Vec<CountEntry>>;

    async fn active_departments(&self, limit: i64) -> PortResult<Vec<CountEntry>>;
}

/// Best-effort live delivery of notifications to connected users.
pub trait NotificationPublisher: Send + Sync {
    /// Returns true when at least one live connection accepted the payload.
    fn publish(&self, recipient: Uuid, notification: &LiveNotification) -> bool;
}
