//! services/api/src/web/views.rs
//!
//! JSON representations of the domain types. Field names are camelCase to
//! match what the browser client expects.

use chrono::{DateTime, Utc};
use doubtstack_core::domain::{
    Answer, AnswerThread, AnswererRank, Badge, CountEntry, Doubt, DoubtRef, EditRecord,
    LiveNotification, Notification, Page, PlatformStats, SenderSummary, Tag, User, UserStats,
};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub questions_asked: i32,
    pub answers_given: i32,
    pub best_answers: i32,
    pub helpful_votes: i32,
}

impl From<&UserStats> for StatsView {
    fn from(stats: &UserStats) -> Self {
        Self {
            questions_asked: stats.questions_asked,
            answers_given: stats.answers_given,
            best_answers: stats.best_answers,
            helpful_votes: stats.helpful_votes,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BadgeView {
    pub name: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
}

impl From<&Badge> for BadgeView {
    fn from(badge: &Badge) -> Self {
        Self {
            name: badge.name.clone(),
            icon: badge.icon.clone(),
            earned_at: badge.earned_at,
        }
    }
}

/// A full user profile. The password hash never reaches this type.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[schema(value_type = String, example = "student")]
    pub role: &'static str,
    pub profile_photo: String,
    pub branch: Option<String>,
    pub department: String,
    pub semester: Option<i32>,
    pub bio: Option<String>,
    pub reputation: i32,
    pub stats: StatsView,
    pub badges: Vec<BadgeView>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.as_str(),
            profile_photo: user.profile_photo.clone(),
            branch: user.branch.clone(),
            department: user.department.clone(),
            semester: user.semester,
            bio: user.bio.clone(),
            reputation: user.reputation,
            stats: StatsView::from(&user.stats),
            badges: user.badges.iter().map(BadgeView::from).collect(),
            is_verified: user.is_verified,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The author block embedded in doubts and answers.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
    pub profile_photo: String,
    #[schema(value_type = String, example = "faculty")]
    pub role: &'static str,
    pub department: String,
    pub reputation: i32,
    pub badges: Vec<BadgeView>,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            profile_photo: user.profile_photo.clone(),
            role: user.role.as_str(),
            department: user.department.clone(),
            reputation: user.reputation,
            badges: user.badges.iter().map(BadgeView::from).collect(),
        }
    }
}

/// Authors looked up once per response, keyed by user id.
pub type Authors = HashMap<Uuid, User>;

fn author(authors: &Authors, id: Uuid) -> Option<AuthorView> {
    authors.get(&id).map(AuthorView::from)
}

/// A leaderboard row: the public parts of a profile.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankedUserView {
    pub id: Uuid,
    pub name: String,
    pub profile_photo: String,
    #[schema(value_type = String)]
    pub role: &'static str,
    pub department: String,
    pub branch: Option<String>,
    pub reputation: i32,
    pub stats: StatsView,
    pub badges: Vec<BadgeView>,
}

impl From<&User> for RankedUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            profile_photo: user.profile_photo.clone(),
            role: user.role.as_str(),
            department: user.department.clone(),
            branch: user.branch.clone(),
            reputation: user.reputation,
            stats: StatsView::from(&user.stats),
            badges: user.badges.iter().map(BadgeView::from).collect(),
        }
    }
}

//=========================================================================================
// Doubts
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoubtView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub author: Option<AuthorView>,
    pub tags: Vec<String>,
    pub subject: String,
    pub department: String,
    pub is_urgent: bool,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub accepted_answer: Option<Uuid>,
    pub views: i64,
    pub upvotes: Vec<Uuid>,
    pub downvotes: Vec<Uuid>,
    pub vote_score: i64,
    pub followers: Vec<Uuid>,
    pub answer_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoubtView {
    pub fn new(doubt: &Doubt, authors: &Authors) -> Self {
        Self {
            id: doubt.id,
            title: doubt.title.clone(),
            description: doubt.description.clone(),
            author: author(authors, doubt.author_id),
            tags: doubt.tags.clone(),
            subject: doubt.subject.clone(),
            department: doubt.department.clone(),
            is_urgent: doubt.is_urgent,
            is_resolved: doubt.is_resolved,
            resolved_at: doubt.resolved_at,
            accepted_answer: doubt.accepted_answer_id,
            views: doubt.views,
            upvotes: doubt.upvotes.clone(),
            downvotes: doubt.downvotes.clone(),
            vote_score: doubt.vote_score(),
            followers: doubt.followers.clone(),
            answer_count: doubt.answer_count,
            created_at: doubt.created_at,
            updated_at: doubt.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationView {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

impl<T> From<&Page<T>> for PaginationView {
    fn from(page: &Page<T>) -> Self {
        Self {
            total: page.total,
            page: page.page,
            pages: page.pages(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DoubtListView {
    pub doubts: Vec<DoubtView>,
    pub pagination: PaginationView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DoubtDetailView {
    pub doubt: DoubtView,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DoubtEnvelopeView {
    pub doubt: DoubtView,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteTallyView {
    pub vote_score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

impl From<doubtstack_core::domain::VoteTally> for VoteTallyView {
    fn from(tally: doubtstack_core::domain::VoteTally) -> Self {
        Self {
            vote_score: tally.vote_score,
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowView {
    pub is_following: bool,
    pub follower_count: i64,
}

//=========================================================================================
// Answers
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditView {
    pub edited_at: DateTime<Utc>,
    pub previous_content: String,
}

impl From<&EditRecord> for EditView {
    fn from(edit: &EditRecord) -> Self {
        Self {
            edited_at: edit.edited_at,
            previous_content: edit.previous_content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: Uuid,
    pub content: String,
    pub author: Option<AuthorView>,
    pub doubt: Uuid,
    pub parent_answer: Option<Uuid>,
    pub upvotes: Vec<Uuid>,
    pub downvotes: Vec<Uuid>,
    pub vote_score: i64,
    pub is_accepted: bool,
    pub is_faculty_verified: bool,
    pub verified_by: Option<Uuid>,
    pub edit_history: Vec<EditView>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[schema(no_recursion)]
    pub replies: Vec<AnswerView>,
}

impl AnswerView {
    pub fn new(answer: &Answer, authors: &Authors) -> Self {
        Self {
            id: answer.id,
            content: answer.content.clone(),
            author: author(authors, answer.author_id),
            doubt: answer.doubt_id,
            parent_answer: answer.parent_answer_id,
            upvotes: answer.upvotes.clone(),
            downvotes: answer.downvotes.clone(),
            vote_score: answer.vote_score(),
            is_accepted: answer.is_accepted,
            is_faculty_verified: answer.is_faculty_verified,
            verified_by: answer.verified_by,
            edit_history: answer.edit_history.iter().map(EditView::from).collect(),
            is_edited: answer.is_edited,
            created_at: answer.created_at,
            updated_at: answer.updated_at,
            replies: Vec::new(),
        }
    }

    pub fn thread(thread: &AnswerThread, authors: &Authors) -> Self {
        let mut view = Self::new(&thread.answer, authors);
        view.replies = thread
            .replies
            .iter()
            .map(|reply| Self::thread(reply, authors))
            .collect();
        view
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerEnvelopeView {
    pub answer: AnswerView,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DoubtRefView {
    pub id: Uuid,
    pub title: String,
}

impl From<&DoubtRef> for DoubtRefView {
    fn from(doubt: &DoubtRef) -> Self {
        Self {
            id: doubt.id,
            title: doubt.title.clone(),
        }
    }
}

/// An answer in a user's history, with the title of the doubt it answers.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswerView {
    pub id: Uuid,
    pub content: String,
    pub author: Option<AuthorView>,
    pub doubt: Option<DoubtRefView>,
    pub parent_answer: Option<Uuid>,
    pub vote_score: i64,
    pub is_accepted: bool,
    pub is_faculty_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserAnswerView {
    pub fn new(answer: &Answer, authors: &Authors, doubt: Option<DoubtRefView>) -> Self {
        Self {
            id: answer.id,
            content: answer.content.clone(),
            author: author(authors, answer.author_id),
            doubt,
            parent_answer: answer.parent_answer_id,
            vote_score: answer.vote_score(),
            is_accepted: answer.is_accepted,
            is_faculty_verified: answer.is_faculty_verified,
            created_at: answer.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserAnswerListView {
    pub answers: Vec<UserAnswerView>,
    pub pagination: PaginationView,
}

//=========================================================================================
// Tags
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "subject")]
    pub category: &'static str,
    pub usage_count: i64,
    pub related_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Tag> for TagView {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name.clone(),
            description: tag.description.clone(),
            category: tag.category.as_str(),
            usage_count: tag.usage_count,
            related_tags: tag.related_tags.clone(),
            created_at: tag.created_at,
        }
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SenderView {
    pub id: Uuid,
    pub name: String,
    pub profile_photo: String,
}

impl From<&SenderSummary> for SenderView {
    fn from(sender: &SenderSummary) -> Self {
        Self {
            id: sender.id,
            name: sender.name.clone(),
            profile_photo: sender.profile_photo.clone(),
        }
    }
}

impl From<&User> for SenderView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            profile_photo: user.profile_photo.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerRefView {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    pub recipient: Uuid,
    pub sender: Option<SenderView>,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "new_answer")]
    pub kind: &'static str,
    pub doubt: Option<DoubtRefView>,
    pub answer: Option<AnswerRefView>,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    /// Builds the view from whatever related records are still available.
    pub fn new(
        notification: &Notification,
        sender: Option<SenderView>,
        doubt: Option<DoubtRefView>,
        answer: Option<AnswerRefView>,
    ) -> Self {
        Self {
            id: notification.id,
            recipient: notification.recipient_id,
            sender,
            kind: notification.kind.as_str(),
            doubt,
            answer,
            message: notification.message.clone(),
            is_read: notification.is_read,
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }

    pub fn live(live: &LiveNotification) -> Self {
        Self::new(
            &live.notification,
            Some(SenderView::from(&live.sender)),
            live.doubt.as_ref().map(DoubtRefView::from),
            live.answer_id.map(|id| AnswerRefView { id, content: None }),
        )
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListView {
    pub notifications: Vec<NotificationView>,
    pub pagination: PaginationView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationEnvelopeView {
    pub notification: NotificationView,
}

//=========================================================================================
// Leaderboard
//=========================================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswererView {
    pub user: RankedUserView,
    pub answer_count: i64,
    pub upvotes: i64,
}

impl From<&AnswererRank> for AnswererView {
    fn from(rank: &AnswererRank) -> Self {
        Self {
            user: RankedUserView::from(&rank.user),
            answer_count: rank.answer_count,
            upvotes: rank.upvotes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub top_users: Vec<RankedUserView>,
    pub top_contributors: Vec<RankedUserView>,
    pub top_answerers: Vec<AnswererView>,
    pub faculty_verified: Vec<RankedUserView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TagCountView {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepartmentCountView {
    pub department: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummaryView {
    pub total_users: i64,
    pub total_doubts: i64,
    pub resolved_doubts: i64,
    pub total_answers: i64,
    #[schema(example = "33.33%")]
    pub resolution_rate: String,
    pub popular_tags: Vec<TagCountView>,
    pub active_departments: Vec<DepartmentCountView>,
}

impl From<&PlatformStats> for StatsSummaryView {
    fn from(stats: &PlatformStats) -> Self {
        let tags = |entry: &CountEntry| TagCountView {
            tag: entry.key.clone(),
            count: entry.count,
        };
        let departments = |entry: &CountEntry| DepartmentCountView {
            department: entry.key.clone(),
            count: entry.count,
        };
        Self {
            total_users: stats.total_users,
            total_doubts: stats.total_doubts,
            resolved_doubts: stats.resolved_doubts,
            total_answers: stats.total_answers,
            resolution_rate: stats.resolution_rate(),
            popular_tags: stats.popular_tags.iter().map(tags).collect(),
            active_departments: stats.active_departments.iter().map(departments).collect(),
        }
    }
}
