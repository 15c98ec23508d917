//! crates/doubtstack_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

/// Name of the badge awarded the first time one of a user's answers is verified by faculty.
pub const FACULTY_VERIFIED_BADGE: &str = "Faculty Verified";
pub const FACULTY_VERIFIED_ICON: &str = "✓";

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

string_enum!(Role, "role", {
    Student => "student",
    Faculty => "faculty",
    Admin => "admin",
});

/// Activity counters kept on every user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub questions_asked: i32,
    pub answers_given: i32,
    pub best_answers: i32,
    pub helpful_votes: i32,
}

impl UserStats {
    /// Sum used to rank the "most active contributors" board.
    pub fn total_activity(&self) -> i32 {
        self.questions_asked + self.answers_given + self.best_answers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub name: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
}

/// Represents a user - used throughout app. Never carries the password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_photo: String,
    pub branch: Option<String>,
    pub department: String,
    pub semester: Option<i32>,
    pub bio: Option<String>,
    pub reputation: i32,
    pub stats: UserStats,
    pub badges: Vec<Badge>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_badge(&self, name: &str) -> bool {
        self.badges.iter().any(|b| b.name == name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Everything needed to insert a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    pub branch: Option<String>,
    pub department: String,
    pub semester: Option<i32>,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub semester: Option<i32>,
    pub profile_photo: Option<String>,
}

//=========================================================================================
// Votes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Upvote,
    Downvote,
}

string_enum!(VoteKind, "vote type", {
    Upvote => "upvote",
    Downvote => "downvote",
});

/// Aggregated vote counters returned after a vote is cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub vote_score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteTally {
    pub fn from_lists(upvotes: &[Uuid], downvotes: &[Uuid]) -> Self {
        let up = upvotes.len() as i64;
        let down = downvotes.len() as i64;
        Self {
            vote_score: up - down,
            upvotes: up,
            downvotes: down,
        }
    }
}

/// The voter's previous vote (if any) and the tally after the new vote was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub previous: Option<VoteKind>,
    pub tally: VoteTally,
}

/// Replaces `voter`'s vote in the two lists and reports the previous vote.
///
/// Shared by every storage adapter so vote replacement behaves identically.
pub fn apply_vote(
    upvotes: &mut Vec<Uuid>,
    downvotes: &mut Vec<Uuid>,
    voter: Uuid,
    kind: VoteKind,
) -> Option<VoteKind> {
    let previous = if upvotes.contains(&voter) {
        Some(VoteKind::Upvote)
    } else if downvotes.contains(&voter) {
        Some(VoteKind::Downvote)
    } else {
        None
    };
    upvotes.retain(|id| *id != voter);
    downvotes.retain(|id| *id != voter);
    match kind {
        VoteKind::Upvote => upvotes.push(voter),
        VoteKind::Downvote => downvotes.push(voter),
    }
    previous
}

//=========================================================================================
// Doubts
//=========================================================================================

/// Represents a question posted by a user.
#[derive(Debug, Clone)]
pub struct Doubt {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub author_id: Uuid,
    pub tags: Vec<String>,
    pub subject: String,
    pub department: String,
    pub is_urgent: bool,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub accepted_answer_id: Option<Uuid>,
    pub views: i64,
    pub upvotes: Vec<Uuid>,
    pub downvotes: Vec<Uuid>,
    pub followers: Vec<Uuid>,
    pub answer_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doubt {
    pub fn vote_score(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally::from_lists(&self.upvotes, &self.downvotes)
    }
}

#[derive(Debug, Clone)]
pub struct NewDoubt {
    pub title: String,
    pub description: String,
    pub author_id: Uuid,
    pub tags: Vec<String>,
    pub subject: String,
    pub department: String,
    pub is_urgent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DoubtUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub subject: Option<String>,
    pub is_urgent: Option<bool>,
}

/// Sort orders accepted by the doubt listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoubtSort {
    #[default]
    Newest,
    Oldest,
    MostViewed,
    MostAnswered,
    MostVoted,
}

string_enum!(DoubtSort, "sort order", {
    Newest => "-createdAt",
    Oldest => "createdAt",
    MostViewed => "-views",
    MostAnswered => "-answerCount",
    MostVoted => "-voteScore",
});

/// Filters for the doubt listing. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct DoubtFilter {
    pub subject: Option<String>,
    pub department: Option<String>,
    pub author_id: Option<Uuid>,
    /// Matches doubts carrying at least one of these tags.
    pub tags: Vec<String>,
    pub is_resolved: Option<bool>,
    pub is_urgent: Option<bool>,
    pub search: Option<String>,
    pub sort: DoubtSort,
}

impl DoubtFilter {
    /// In-process evaluation of the filter; adapters without a query engine use this.
    pub fn matches(&self, doubt: &Doubt) -> bool {
        if let Some(subject) = &self.subject {
            if &doubt.subject != subject {
                return false;
            }
        }
        if let Some(department) = &self.department {
            if &doubt.department != department {
                return false;
            }
        }
        if let Some(author) = self.author_id {
            if doubt.author_id != author {
                return false;
            }
        }
        if !self.tags.is_empty() && !doubt.tags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        if let Some(resolved) = self.is_resolved {
            if doubt.is_resolved != resolved {
                return false;
            }
        }
        if let Some(urgent) = self.is_urgent {
            if doubt.is_urgent != urgent {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = doubt.title.to_lowercase().contains(&needle)
                || doubt.description.to_lowercase().contains(&needle)
                || doubt.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Orders two doubts according to `sort`; ties fall back to newest first.
    pub fn compare(&self, a: &Doubt, b: &Doubt) -> std::cmp::Ordering {
        let newest = b.created_at.cmp(&a.created_at);
        match self.sort {
            DoubtSort::Newest => newest,
            DoubtSort::Oldest => a.created_at.cmp(&b.created_at),
            DoubtSort::MostViewed => b.views.cmp(&a.views).then(newest),
            DoubtSort::MostAnswered => b.answer_count.cmp(&a.answer_count).then(newest),
            DoubtSort::MostVoted => b.vote_score().cmp(&a.vote_score()).then(newest),
        }
    }
}

/// Follow state of a user on a doubt after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowState {
    pub is_following: bool,
    pub follower_count: i64,
}

//=========================================================================================
// Answers
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub edited_at: DateTime<Utc>,
    pub previous_content: String,
}

/// Represents a response to a doubt, optionally a threaded reply to another answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub doubt_id: Uuid,
    pub parent_answer_id: Option<Uuid>,
    pub upvotes: Vec<Uuid>,
    pub downvotes: Vec<Uuid>,
    pub is_accepted: bool,
    pub is_faculty_verified: bool,
    pub verified_by: Option<Uuid>,
    pub edit_history: Vec<EditRecord>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Answer {
    pub fn vote_score(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally::from_lists(&self.upvotes, &self.downvotes)
    }
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub content: String,
    pub author_id: Uuid,
    pub doubt_id: Uuid,
    pub parent_answer_id: Option<Uuid>,
}

/// An answer together with its nested replies.
#[derive(Debug, Clone)]
pub struct AnswerThread {
    pub answer: Answer,
    pub replies: Vec<AnswerThread>,
}

/// Arranges the flat answer list of one doubt into threads.
///
/// Top-level answers are ordered by vote score (highest first), then newest first.
/// Replies at every depth are ordered oldest first. Replies whose parent is missing
/// are dropped.
pub fn build_answer_threads(answers: Vec<Answer>) -> Vec<AnswerThread> {
    let (mut roots, replies): (Vec<Answer>, Vec<Answer>) =
        answers.into_iter().partition(|a| a.parent_answer_id.is_none());
    roots.sort_by(|a, b| {
        b.vote_score()
            .cmp(&a.vote_score())
            .then(b.created_at.cmp(&a.created_at))
    });
    roots
        .into_iter()
        .map(|root| attach_replies(root, &replies))
        .collect()
}

fn attach_replies(answer: Answer, pool: &[Answer]) -> AnswerThread {
    let mut children: Vec<&Answer> = pool
        .iter()
        .filter(|a| a.parent_answer_id == Some(answer.id))
        .collect();
    children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let replies = children
        .into_iter()
        .map(|child| attach_replies(child.clone(), pool))
        .collect();
    AnswerThread { answer, replies }
}

//=========================================================================================
// Tags
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagCategory {
    Subject,
    Topic,
    Technology,
    #[default]
    General,
}

string_enum!(TagCategory, "tag category", {
    Subject => "subject",
    Topic => "topic",
    Technology => "technology",
    General => "general",
});

#[derive(Debug, Clone)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: TagCategory,
    pub usage_count: i64,
    pub related_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub description: Option<String>,
    pub category: TagCategory,
    pub related_tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    pub category: Option<TagCategory>,
    pub limit: i64,
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewAnswer,
    NewReply,
    AcceptedAnswer,
    UpvotedAnswer,
    UpvotedDoubt,
}

string_enum!(NotificationKind, "notification type", {
    NewAnswer => "new_answer",
    NewReply => "new_reply",
    AcceptedAnswer => "accepted_answer",
    UpvotedAnswer => "upvoted_answer",
    UpvotedDoubt => "upvoted_doubt",
});

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Uuid,
    pub kind: NotificationKind,
    pub doubt_id: Option<Uuid>,
    pub answer_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub sender_id: Uuid,
    pub kind: NotificationKind,
    pub doubt_id: Option<Uuid>,
    pub answer_id: Option<Uuid>,
    pub message: String,
}

/// Minimal sender info attached to a live notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderSummary {
    pub id: Uuid,
    pub name: String,
    pub profile_photo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubtRef {
    pub id: Uuid,
    pub title: String,
}

/// The payload pushed over the live channel when a notification is stored.
#[derive(Debug, Clone)]
pub struct LiveNotification {
    pub notification: Notification,
    pub sender: SenderSummary,
    pub doubt: Option<DoubtRef>,
    pub answer_id: Option<Uuid>,
}

//=========================================================================================
// Pagination
//=========================================================================================

/// One page of results and the total number of matching rows.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (self.total + self.limit - 1) / self.limit
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Slices an already ordered list; used by adapters that filter in memory.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Page<T> {
        let start = (self.offset().max(0) as usize).min(items.len());
        let end = (start + self.limit.max(0) as usize).min(items.len());
        Page {
            items: items[start..end].to_vec(),
            total: items.len() as i64,
            page: self.page,
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

//=========================================================================================
// Leaderboard and statistics
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardPeriod {
    #[default]
    All,
    Weekly,
    Monthly,
}

string_enum!(LeaderboardPeriod, "period", {
    All => "all",
    Weekly => "weekly",
    Monthly => "monthly",
});

impl LeaderboardPeriod {
    /// Start of the window relative to `now`; `None` means no lower bound.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LeaderboardPeriod::All => None,
            LeaderboardPeriod::Weekly => Some(now - chrono::Duration::days(7)),
            LeaderboardPeriod::Monthly => now.checked_sub_months(chrono::Months::new(1)),
        }
    }
}

/// One row of the "top answerers" board.
#[derive(Debug, Clone)]
pub struct AnswererRank {
    pub user: User,
    pub answer_count: i64,
    pub upvotes: i64,
}

#[derive(Debug, Clone)]
pub struct Leaderboard {
    pub top_users: Vec<User>,
    pub top_contributors: Vec<User>,
    pub top_answerers: Vec<AnswererRank>,
    pub faculty_verified: Vec<User>,
}

/// A label and how often it occurs (tags, departments).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountEntry {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_doubts: i64,
    pub resolved_doubts: i64,
    pub total_answers: i64,
    pub popular_tags: Vec<CountEntry>,
    pub active_departments: Vec<CountEntry>,
}

impl PlatformStats {
    /// Share of resolved doubts as a percentage string with two decimals.
    pub fn resolution_rate(&self) -> String {
        if self.total_doubts > 0 {
            format!(
                "{:.2}%",
                self.resolved_doubts as f64 / self.total_doubts as f64 * 100.0
            )
        } else {
            "0%".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn answer(parent: Option<Uuid>, created_offset: i64, up: usize) -> Answer {
        let now = Utc::now();
        Answer {
            id: Uuid::new_v4(),
            content: "x".into(),
            author_id: Uuid::new_v4(),
            doubt_id: Uuid::nil(),
            parent_answer_id: parent,
            upvotes: (0..up).map(|_| Uuid::new_v4()).collect(),
            downvotes: vec![],
            is_accepted: false,
            is_faculty_verified: false,
            verified_by: None,
            edit_history: vec![],
            is_edited: false,
            created_at: now + Duration::seconds(created_offset),
            updated_at: now,
        }
    }

    #[test]
    fn enums_round_trip_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert_eq!("-voteScore".parse::<DoubtSort>().unwrap(), DoubtSort::MostVoted);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn apply_vote_replaces_previous_vote() {
        let voter = Uuid::new_v4();
        let (mut up, mut down) = (vec![], vec![]);

        assert_eq!(apply_vote(&mut up, &mut down, voter, VoteKind::Upvote), None);
        assert_eq!(
            apply_vote(&mut up, &mut down, voter, VoteKind::Upvote),
            Some(VoteKind::Upvote)
        );
        assert_eq!(up.len(), 1);

        assert_eq!(
            apply_vote(&mut up, &mut down, voter, VoteKind::Downvote),
            Some(VoteKind::Upvote)
        );
        assert!(up.is_empty());
        assert_eq!(down, vec![voter]);
        assert_eq!(VoteTally::from_lists(&up, &down).vote_score, -1);
    }

    #[test]
    fn threads_order_roots_by_score_and_replies_by_age() {
        let low = answer(None, 0, 0);
        let high = answer(None, -10, 3);
        let late_reply = answer(Some(high.id), 20, 0);
        let early_reply = answer(Some(high.id), 10, 5);
        let nested = answer(Some(early_reply.id), 30, 0);
        let orphan = answer(Some(Uuid::new_v4()), 5, 0);

        let threads = build_answer_threads(vec![
            low.clone(),
            late_reply.clone(),
            high.clone(),
            nested.clone(),
            early_reply.clone(),
            orphan,
        ]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].answer.id, high.id);
        assert_eq!(threads[1].answer.id, low.id);
        let replies: Vec<Uuid> = threads[0].replies.iter().map(|t| t.answer.id).collect();
        assert_eq!(replies, vec![early_reply.id, late_reply.id]);
        assert_eq!(threads[0].replies[0].replies[0].answer.id, nested.id);
    }

    #[test]
    fn page_math() {
        let req = PageRequest { page: 2, limit: 3 };
        let page = req.slice(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.pages(), 3);

        let beyond = PageRequest { page: 9, limit: 3 }.slice(&[1, 2]);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 2);
    }

    #[test]
    fn resolution_rate_formats_two_decimals() {
        let mut stats = PlatformStats {
            total_users: 0,
            total_doubts: 0,
            resolved_doubts: 0,
            total_answers: 0,
            popular_tags: vec![],
            active_departments: vec![],
        };
        assert_eq!(stats.resolution_rate(), "0%");
        stats.total_doubts = 3;
        stats.resolved_doubts = 1;
        assert_eq!(stats.resolution_rate(), "33.33%");
    }
}
