//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use doubtstack_core::domain::{
    apply_vote, Answer, AnswererRank, Badge, CountEntry, Doubt, DoubtFilter, DoubtSort,
    DoubtUpdate, EditRecord, FollowState, NewAnswer, NewDoubt, NewNotification, NewTag, NewUser,
    Notification, NotificationKind, Page, PageRequest, ProfileUpdate, Role, Tag, TagCategory,
    TagFilter, User, UserCredentials, UserStats, VoteKind, VoteOutcome, VoteTally,
};
use doubtstack_core::ports::{DatabaseService, PortError, PortResult};
use doubtstack_core::reputation::{ReputationAction, StatCounter};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Error Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => PortError::Unexpected(other.to_string()),
    }
}

fn conflict_on_unique(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Escapes LIKE wildcards so user input matches literally.
fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, name, email, role, profile_photo, branch, department, semester, bio, \
     reputation, questions_asked, answers_given, best_answers, helpful_votes, is_verified, \
     is_active, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    profile_photo: String,
    branch: Option<String>,
    department: String,
    semester: Option<i32>,
    bio: Option<String>,
    reputation: i32,
    questions_asked: i32,
    answers_given: i32,
    best_answers: i32,
    helpful_votes: i32,
    is_verified: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self, badges: Vec<Badge>) -> PortResult<User> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role,
            profile_photo: self.profile_photo,
            branch: self.branch,
            department: self.department,
            semester: self.semester,
            bio: self.bio,
            reputation: self.reputation,
            stats: UserStats {
                questions_asked: self.questions_asked,
                answers_given: self.answers_given,
                best_answers: self.best_answers,
                helpful_votes: self.helpful_votes,
            },
            badges,
            is_verified: self.is_verified,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct BadgeRecord {
    user_id: Uuid,
    name: String,
    icon: String,
    earned_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.password_hash,
        }
    }
}

const DOUBT_COLUMNS: &str = "id, title, description, author_id, tags, subject, department, is_urgent, \
     is_resolved, resolved_at, accepted_answer_id, views, upvotes, downvotes, followers, \
     answer_count, created_at, updated_at";

#[derive(FromRow)]
struct DoubtRecord {
    id: Uuid,
    title: String,
    description: String,
    author_id: Uuid,
    tags: Vec<String>,
    subject: String,
    department: String,
    is_urgent: bool,
    is_resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
    accepted_answer_id: Option<Uuid>,
    views: i64,
    upvotes: Vec<Uuid>,
    downvotes: Vec<Uuid>,
    followers: Vec<Uuid>,
    answer_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl DoubtRecord {
    fn to_domain(self) -> Doubt {
        Doubt {
            id: self.id,
            title: self.title,
            description: self.description,
            author_id: self.author_id,
            tags: self.tags,
            subject: self.subject,
            department: self.department,
            is_urgent: self.is_urgent,
            is_resolved: self.is_resolved,
            resolved_at: self.resolved_at,
            accepted_answer_id: self.accepted_answer_id,
            views: self.views,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            followers: self.followers,
            answer_count: self.answer_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ANSWER_COLUMNS: &str = "id, content, author_id, doubt_id, parent_answer_id, upvotes, downvotes, \
     is_accepted, is_faculty_verified, verified_by, is_edited, created_at, updated_at";

#[derive(FromRow)]
struct AnswerRecord {
    id: Uuid,
    content: String,
    author_id: Uuid,
    doubt_id: Uuid,
    parent_answer_id: Option<Uuid>,
    upvotes: Vec<Uuid>,
    downvotes: Vec<Uuid>,
    is_accepted: bool,
    is_faculty_verified: bool,
    verified_by: Option<Uuid>,
    is_edited: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AnswerRecord {
    fn to_domain(self, edit_history: Vec<EditRecord>) -> Answer {
        Answer {
            id: self.id,
            content: self.content,
            author_id: self.author_id,
            doubt_id: self.doubt_id,
            parent_answer_id: self.parent_answer_id,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            is_accepted: self.is_accepted,
            is_faculty_verified: self.is_faculty_verified,
            verified_by: self.verified_by,
            edit_history,
            is_edited: self.is_edited,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct EditRecordRow {
    answer_id: Uuid,
    edited_at: DateTime<Utc>,
    previous_content: String,
}

const TAG_COLUMNS: &str = "id, name, description, category, usage_count, related_tags, created_at";

#[derive(FromRow)]
struct TagRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    category: String,
    usage_count: i64,
    related_tags: Vec<String>,
    created_at: DateTime<Utc>,
}
impl TagRecord {
    fn to_domain(self) -> PortResult<Tag> {
        Ok(Tag {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self
                .category
                .parse::<TagCategory>()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
            usage_count: self.usage_count,
            related_tags: self.related_tags,
            created_at: self.created_at,
        })
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, sender_id, kind, doubt_id, answer_id, message, is_read, read_at, created_at";

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    recipient_id: Uuid,
    sender_id: Uuid,
    kind: String,
    doubt_id: Option<Uuid>,
    answer_id: Option<Uuid>,
    message: String,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl NotificationRecord {
    fn to_domain(self) -> PortResult<Notification> {
        Ok(Notification {
            id: self.id,
            recipient_id: self.recipient_id,
            sender_id: self.sender_id,
            kind: self
                .kind
                .parse::<NotificationKind>()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
            doubt_id: self.doubt_id,
            answer_id: self.answer_id,
            message: self.message,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CountRecord {
    key: String,
    count: i64,
}

#[derive(FromRow)]
struct AnswererRecord {
    author_id: Uuid,
    answer_count: i64,
    upvotes: i64,
}

//=========================================================================================
// Hydration Helpers (rows that live in side tables)
//=========================================================================================

impl DbAdapter {
    async fn hydrate_users(&self, records: Vec<UserRecord>) -> PortResult<Vec<User>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let badge_rows = sqlx::query_as::<_, BadgeRecord>(
            "SELECT user_id, name, icon, earned_at FROM user_badges WHERE user_id = ANY($1) ORDER BY earned_at ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut badges: HashMap<Uuid, Vec<Badge>> = HashMap::new();
        for row in badge_rows {
            badges.entry(row.user_id).or_default().push(Badge {
                name: row.name,
                icon: row.icon,
                earned_at: row.earned_at,
            });
        }

        records
            .into_iter()
            .map(|r| {
                let user_badges = badges.remove(&r.id).unwrap_or_default();
                r.to_domain(user_badges)
            })
            .collect()
    }

    async fn hydrate_user(&self, record: UserRecord) -> PortResult<User> {
        let mut users = self.hydrate_users(vec![record]).await?;
        users
            .pop()
            .ok_or_else(|| PortError::Unexpected("user hydration returned nothing".to_string()))
    }

    async fn fetch_user_records(&self, sql: &str, limit: i64) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        self.hydrate_users(records).await
    }

    async fn hydrate_answers(&self, records: Vec<AnswerRecord>) -> PortResult<Vec<Answer>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let edit_rows = sqlx::query_as::<_, EditRecordRow>(
            "SELECT answer_id, edited_at, previous_content FROM answer_edits WHERE answer_id = ANY($1) ORDER BY edited_at ASC, id ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut edits: HashMap<Uuid, Vec<EditRecord>> = HashMap::new();
        for row in edit_rows {
            edits.entry(row.answer_id).or_default().push(EditRecord {
                edited_at: row.edited_at,
                previous_content: row.previous_content,
            });
        }

        Ok(records
            .into_iter()
            .map(|r| {
                let history = edits.remove(&r.id).unwrap_or_default();
                r.to_domain(history)
            })
            .collect())
    }

    /// Shared read-modify-write for the vote arrays of `doubts` and `answers`.
    async fn cast_vote(
        &self,
        table: &'static str,
        label: &'static str,
        id: Uuid,
        voter: Uuid,
        kind: VoteKind,
    ) -> PortResult<VoteOutcome> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let (mut upvotes, mut downvotes): (Vec<Uuid>, Vec<Uuid>) = sqlx::query_as(&format!(
            "SELECT upvotes, downvotes FROM {table} WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found(format!("{} {} not found", label, id)))?;

        let previous = apply_vote(&mut upvotes, &mut downvotes, voter, kind);

        sqlx::query(&format!(
            "UPDATE {table} SET upvotes = $2, downvotes = $3, updated_at = NOW() WHERE id = $1"
        ))
        .bind(id)
        .bind(&upvotes)
        .bind(&downvotes)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;

        Ok(VoteOutcome {
            previous,
            tally: VoteTally::from_lists(&upvotes, &downvotes),
        })
    }
}

fn push_doubt_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &DoubtFilter) {
    qb.push(" WHERE TRUE");
    if let Some(subject) = &filter.subject {
        qb.push(" AND subject = ").push_bind(subject.clone());
    }
    if let Some(department) = &filter.department {
        qb.push(" AND department = ").push_bind(department.clone());
    }
    if let Some(author) = filter.author_id {
        qb.push(" AND author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        qb.push(" AND tags && ").push_bind(filter.tags.clone());
    }
    if let Some(resolved) = filter.is_resolved {
        qb.push(" AND is_resolved = ").push_bind(resolved);
    }
    if let Some(urgent) = filter.is_urgent {
        qb.push(" AND is_urgent = ").push_bind(urgent);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", like_escape(search));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(tags) AS t WHERE t ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
}

fn doubt_order(sort: DoubtSort) -> &'static str {
    match sort {
        DoubtSort::Newest => " ORDER BY created_at DESC",
        DoubtSort::Oldest => " ORDER BY created_at ASC",
        DoubtSort::MostViewed => " ORDER BY views DESC, created_at DESC",
        DoubtSort::MostAnswered => " ORDER BY answer_count DESC, created_at DESC",
        DoubtSort::MostVoted => {
            " ORDER BY cardinality(upvotes) - cardinality(downvotes) DESC, created_at DESC"
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Users ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, branch, department, semester) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .bind(&user.branch)
        .bind(&user.department)
        .bind(user.semester)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique(format!("User with email {} already exists", user.email)))?;
        self.hydrate_user(record).await
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        self.hydrate_user(record).await
    }

    async fn get_users_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let mut by_id: HashMap<Uuid, User> = self
            .hydrate_users(records)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User with email {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn get_credentials(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(hashed_password)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                bio = COALESCE($3, bio), \
                branch = COALESCE($4, branch), \
                semester = COALESCE($5, semester), \
                profile_photo = COALESCE($6, profile_photo), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&update.name)
        .bind(&update.bio)
        .bind(&update.branch)
        .bind(update.semester)
        .bind(&update.profile_photo)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        self.hydrate_user(record).await
    }

    async fn apply_reputation(&self, user_id: Uuid, action: ReputationAction) -> PortResult<User> {
        let bump = |counter: StatCounter| i32::from(action.stat() == Some(counter));
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET \
                reputation = GREATEST(reputation + $2, 0), \
                questions_asked = questions_asked + $3, \
                answers_given = answers_given + $4, \
                best_answers = best_answers + $5, \
                helpful_votes = helpful_votes + $6, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(action.points())
        .bind(bump(StatCounter::QuestionsAsked))
        .bind(bump(StatCounter::AnswersGiven))
        .bind(bump(StatCounter::BestAnswers))
        .bind(bump(StatCounter::HelpfulVotes))
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", user_id)))?;
        self.hydrate_user(record).await
    }

    async fn award_badge(&self, user_id: Uuid, name: &str, icon: &str) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_badges (user_id, name, icon) VALUES ($1, $2, $3) ON CONFLICT (user_id, name) DO NOTHING",
        )
        .bind(user_id)
        .bind(name)
        .bind(icon)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM auth_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;

        match row {
            Some((user_id, expires_at)) if expires_at > Utc::now() => Ok(user_id),
            Some(_) => {
                self.delete_auth_session(session_id).await?;
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Doubts ---

    async fn create_doubt(&self, doubt: NewDoubt) -> PortResult<Doubt> {
        let record = sqlx::query_as::<_, DoubtRecord>(&format!(
            "INSERT INTO doubts (id, title, description, author_id, tags, subject, department, is_urgent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {DOUBT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&doubt.title)
        .bind(&doubt.description)
        .bind(doubt.author_id)
        .bind(&doubt.tags)
        .bind(&doubt.subject)
        .bind(&doubt.department)
        .bind(doubt.is_urgent)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_doubt(&self, doubt_id: Uuid) -> PortResult<Doubt> {
        let record = sqlx::query_as::<_, DoubtRecord>(&format!(
            "SELECT {DOUBT_COLUMNS} FROM doubts WHERE id = $1"
        ))
        .bind(doubt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Doubt {} not found", doubt_id)))?;
        Ok(record.to_domain())
    }

    async fn get_doubts_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<Doubt>> {
        let records = sqlx::query_as::<_, DoubtRecord>(&format!(
            "SELECT {DOUBT_COLUMNS} FROM doubts WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let mut by_id: HashMap<Uuid, Doubt> = records
            .into_iter()
            .map(|r| {
                let doubt = r.to_domain();
                (doubt.id, doubt)
            })
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_doubts(&self, filter: &DoubtFilter, page: PageRequest) -> PortResult<Page<Doubt>> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM doubts");
        push_doubt_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {DOUBT_COLUMNS} FROM doubts"));
        push_doubt_filter(&mut qb, filter);
        qb.push(doubt_order(filter.sort));
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset());
        let records = qb
            .build_query_as::<DoubtRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(Page {
            items: records.into_iter().map(|r| r.to_domain()).collect(),
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn update_doubt(&self, doubt_id: Uuid, update: DoubtUpdate) -> PortResult<Doubt> {
        let record = sqlx::query_as::<_, DoubtRecord>(&format!(
            "UPDATE doubts SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                tags = COALESCE($4, tags), \
                subject = COALESCE($5, subject), \
                is_urgent = COALESCE($6, is_urgent), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {DOUBT_COLUMNS}"
        ))
        .bind(doubt_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.tags)
        .bind(&update.subject)
        .bind(update.is_urgent)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Doubt {} not found", doubt_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_doubt(&self, doubt_id: Uuid) -> PortResult<()> {
        // Answers go with the doubt through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM doubts WHERE id = $1")
            .bind(doubt_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Doubt {} not found", doubt_id)));
        }
        Ok(())
    }

    async fn increment_doubt_views(&self, doubt_id: Uuid) -> PortResult<Doubt> {
        let record = sqlx::query_as::<_, DoubtRecord>(&format!(
            "UPDATE doubts SET views = views + 1 WHERE id = $1 RETURNING {DOUBT_COLUMNS}"
        ))
        .bind(doubt_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Doubt {} not found", doubt_id)))?;
        Ok(record.to_domain())
    }

    async fn adjust_answer_count(&self, doubt_id: Uuid, delta: i64) -> PortResult<()> {
        sqlx::query(
            "UPDATE doubts SET answer_count = GREATEST(answer_count + $2, 0) WHERE id = $1",
        )
        .bind(doubt_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn mark_doubt_resolved(
        &self,
        doubt_id: Uuid,
        accepted_answer_id: Option<Uuid>,
    ) -> PortResult<Doubt> {
        let record = sqlx::query_as::<_, DoubtRecord>(&format!(
            "UPDATE doubts SET \
                is_resolved = TRUE, \
                resolved_at = NOW(), \
                accepted_answer_id = COALESCE($2, accepted_answer_id), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {DOUBT_COLUMNS}"
        ))
        .bind(doubt_id)
        .bind(accepted_answer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Doubt {} not found", doubt_id)))?;
        Ok(record.to_domain())
    }

    async fn clear_accepted_answer(&self, doubt_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE doubts SET accepted_answer_id = NULL, is_resolved = FALSE, resolved_at = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(doubt_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn vote_doubt(&self, doubt_id: Uuid, voter: Uuid, kind: VoteKind) -> PortResult<VoteOutcome> {
        self.cast_vote("doubts", "Doubt", doubt_id, voter, kind).await
    }

    async fn toggle_follow(&self, doubt_id: Uuid, user_id: Uuid) -> PortResult<FollowState> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let (mut followers,): (Vec<Uuid>,) =
            sqlx::query_as("SELECT followers FROM doubts WHERE id = $1 FOR UPDATE")
                .bind(doubt_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(not_found(format!("Doubt {} not found", doubt_id)))?;

        let was_following = followers.contains(&user_id);
        if was_following {
            followers.retain(|id| *id != user_id);
        } else {
            followers.push(user_id);
        }

        sqlx::query("UPDATE doubts SET followers = $2 WHERE id = $1")
            .bind(doubt_id)
            .bind(&followers)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        Ok(FollowState {
            is_following: !was_following,
            follower_count: followers.len() as i64,
        })
    }

    // --- Answers ---

    async fn create_answer(&self, answer: NewAnswer) -> PortResult<Answer> {
        let record = sqlx::query_as::<_, AnswerRecord>(&format!(
            "INSERT INTO answers (id, content, author_id, doubt_id, parent_answer_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&answer.content)
        .bind(answer.author_id)
        .bind(answer.doubt_id)
        .bind(answer.parent_answer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain(Vec::new()))
    }

    async fn get_answer(&self, answer_id: Uuid) -> PortResult<Answer> {
        let record = sqlx::query_as::<_, AnswerRecord>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE id = $1"
        ))
        .bind(answer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Answer {} not found", answer_id)))?;
        let mut answers = self.hydrate_answers(vec![record]).await?;
        answers
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Answer {} not found", answer_id)))
    }

    async fn get_answers_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<Answer>> {
        let records = sqlx::query_as::<_, AnswerRecord>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let mut by_id: HashMap<Uuid, Answer> = self
            .hydrate_answers(records)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_answers_for_doubt(&self, doubt_id: Uuid) -> PortResult<Vec<Answer>> {
        let records = sqlx::query_as::<_, AnswerRecord>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE doubt_id = $1 ORDER BY created_at ASC"
        ))
        .bind(doubt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.hydrate_answers(records).await
    }

    async fn list_answers_by_author(&self, author_id: Uuid, page: PageRequest) -> PortResult<Page<Answer>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let records = sqlx::query_as::<_, AnswerRecord>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE author_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(author_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Page {
            items: self.hydrate_answers(records).await?,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn edit_answer(&self, answer_id: Uuid, content: &str) -> PortResult<Answer> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let (previous_content,): (String,) =
            sqlx::query_as("SELECT content FROM answers WHERE id = $1 FOR UPDATE")
                .bind(answer_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(not_found(format!("Answer {} not found", answer_id)))?;

        sqlx::query("INSERT INTO answer_edits (answer_id, previous_content) VALUES ($1, $2)")
            .bind(answer_id)
            .bind(&previous_content)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        sqlx::query(
            "UPDATE answers SET content = $2, is_edited = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(answer_id)
        .bind(content)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        self.get_answer(answer_id).await
    }

    async fn delete_answer(&self, answer_id: Uuid) -> PortResult<i64> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let removed: i64 = sqlx::query_scalar(
            "WITH RECURSIVE subtree AS ( \
                SELECT id FROM answers WHERE id = $1 \
                UNION ALL \
                SELECT a.id FROM answers a JOIN subtree s ON a.parent_answer_id = s.id \
             ) SELECT COUNT(*) FROM subtree",
        )
        .bind(answer_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        if removed == 0 {
            return Err(PortError::NotFound(format!("Answer {} not found", answer_id)));
        }

        // Replies go with their parent through ON DELETE CASCADE.
        sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(answer_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(removed)
    }

    async fn set_answer_accepted(&self, answer_id: Uuid, accepted: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE answers SET is_accepted = $2, updated_at = NOW() WHERE id = $1")
            .bind(answer_id)
            .bind(accepted)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Answer {} not found", answer_id)));
        }
        Ok(())
    }

    async fn set_answer_verification(&self, answer_id: Uuid, verified_by: Option<Uuid>) -> PortResult<Answer> {
        sqlx::query(
            "UPDATE answers SET is_faculty_verified = $2, verified_by = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(answer_id)
        .bind(verified_by.is_some())
        .bind(verified_by)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        self.get_answer(answer_id).await
    }

    async fn vote_answer(&self, answer_id: Uuid, voter: Uuid, kind: VoteKind) -> PortResult<VoteOutcome> {
        self.cast_vote("answers", "Answer", answer_id, voter, kind).await
    }

    // --- Tags ---

    async fn increment_tag_usage(&self, name: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO tags (id, name, usage_count) VALUES ($1, $2, 1) \
             ON CONFLICT (name) DO UPDATE SET usage_count = tags.usage_count + 1, updated_at = NOW()",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_tags(&self, filter: &TagFilter) -> PortResult<Vec<Tag>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TAG_COLUMNS} FROM tags WHERE TRUE"));
        if let Some(search) = &filter.search {
            qb.push(" AND name ILIKE ")
                .push_bind(format!("%{}%", like_escape(search)));
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        qb.push(" ORDER BY usage_count DESC, name ASC LIMIT ")
            .push_bind(filter.limit);

        let records = qb
            .build_query_as::<TagRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn suggest_tags(&self, prefix: &str, limit: i64) -> PortResult<Vec<Tag>> {
        let records = sqlx::query_as::<_, TagRecord>(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE name ILIKE $1 ORDER BY usage_count DESC, name ASC LIMIT $2"
        ))
        .bind(format!("{}%", like_escape(prefix)))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_tag(&self, tag: NewTag) -> PortResult<Tag> {
        let record = sqlx::query_as::<_, TagRecord>(&format!(
            "INSERT INTO tags (id, name, description, category, related_tags) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TAG_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(tag.category.as_str())
        .bind(&tag.related_tags)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique(format!("Tag {} already exists", tag.name)))?;
        record.to_domain()
    }

    // --- Notifications ---

    async fn create_notification(&self, notification: NewNotification) -> PortResult<Notification> {
        let record = sqlx::query_as::<_, NotificationRecord>(&format!(
            "INSERT INTO notifications (id, recipient_id, sender_id, kind, doubt_id, answer_id, message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(notification.recipient_id)
        .bind(notification.sender_id)
        .bind(notification.kind.as_str())
        .bind(notification.doubt_id)
        .bind(notification.answer_id)
        .bind(&notification.message)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        is_read: Option<bool>,
        page: PageRequest,
    ) -> PortResult<Page<Notification>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND ($2::BOOLEAN IS NULL OR is_read = $2)",
        )
        .bind(recipient)
        .bind(is_read)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        let records = sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 AND ($2::BOOLEAN IS NULL OR is_read = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(recipient)
        .bind(is_read)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Page {
            items: records
                .into_iter()
                .map(|r| r.to_domain())
                .collect::<PortResult<Vec<_>>>()?,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn mark_notification_read(&self, notification_id: Uuid, recipient: Uuid) -> PortResult<Notification> {
        let record = sqlx::query_as::<_, NotificationRecord>(&format!(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE id = $1 AND recipient_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(notification_id)
        .bind(recipient)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Notification not found".to_string()))?;
        record.to_domain()
    }

    async fn mark_all_notifications_read(&self, recipient: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, notification_id: Uuid, recipient: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(notification_id)
            .bind(recipient)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    // --- Leaderboard & Statistics ---

    async fn top_users_by_reputation(&self, limit: i64) -> PortResult<Vec<User>> {
        self.fetch_user_records(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE is_active \
                 ORDER BY reputation DESC, created_at ASC LIMIT $1"
            ),
            limit,
        )
        .await
    }

    async fn top_contributors(&self, limit: i64) -> PortResult<Vec<User>> {
        self.fetch_user_records(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE is_active \
                 ORDER BY (questions_asked + answers_given + best_answers) DESC, created_at ASC LIMIT $1"
            ),
            limit,
        )
        .await
    }

    async fn top_answerers(&self, since: Option<DateTime<Utc>>, limit: i64) -> PortResult<Vec<AnswererRank>> {
        let rows = sqlx::query_as::<_, AnswererRecord>(
            "SELECT author_id, COUNT(*) AS answer_count, \
                    COALESCE(SUM(cardinality(upvotes)), 0)::BIGINT AS upvotes \
             FROM answers \
             WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1) \
             GROUP BY author_id \
             ORDER BY answer_count DESC, upvotes DESC \
             LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.author_id).collect();
        let mut users: HashMap<Uuid, User> = self
            .get_users_by_ids(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                users.remove(&row.author_id).map(|user| AnswererRank {
                    user,
                    answer_count: row.answer_count,
                    upvotes: row.upvotes,
                })
            })
            .collect())
    }

    async fn badge_holders(&self, badge: &str, limit: i64) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE is_active AND id IN (SELECT user_id FROM user_badges WHERE name = $1) \
             ORDER BY best_answers DESC, created_at ASC LIMIT $2"
        ))
        .bind(badge)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.hydrate_users(records).await
    }

    async fn count_active_users(&self) -> PortResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn count_doubts(&self) -> PortResult<(i64, i64)> {
        sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_resolved) FROM doubts",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn count_answers(&self) -> PortResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM answers")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn popular_tags(&self, limit: i64) -> PortResult<Vec<CountEntry>> {
        let rows = sqlx::query_as::<_, CountRecord>(
            "SELECT tag AS key, COUNT(*) AS count FROM doubts, unnest(tags) AS tag \
             GROUP BY tag ORDER BY count DESC, tag ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|r| CountEntry { key: r.key, count: r.count })
            .collect())
    }

    async fn active_departments(&self, limit: i64) -> PortResult<Vec<CountEntry>> {
        let rows = sqlx::query_as::<_, CountRecord>(
            "SELECT department AS key, COUNT(*) AS count FROM doubts \
             GROUP BY department ORDER BY count DESC, department ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|r| CountEntry { key: r.key, count: r.count })
            .collect())
    }
}
