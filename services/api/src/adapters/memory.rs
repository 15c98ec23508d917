//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. It backs
//! `DATABASE_URL=memory://` for local runs and the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use doubtstack_core::domain::{
    apply_vote, Answer, AnswererRank, Badge, CountEntry, Doubt, DoubtFilter, DoubtUpdate,
    EditRecord, FollowState, NewAnswer, NewDoubt, NewNotification, NewTag, NewUser, Notification,
    Page, PageRequest, ProfileUpdate, Tag, TagCategory, TagFilter, User, UserCredentials,
    UserStats, VoteKind, VoteOutcome, VoteTally,
};
use doubtstack_core::ports::{DatabaseService, PortError, PortResult};
use doubtstack_core::reputation::{ReputationAction, StatCounter};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct MemoryStore {
    users: HashMap<Uuid, StoredUser>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    doubts: HashMap<Uuid, Doubt>,
    answers: HashMap<Uuid, Answer>,
    tags: HashMap<String, Tag>,
    notifications: HashMap<Uuid, Notification>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryStore {
    /// Strictly increasing timestamps keep "newest first" orderings deterministic.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn user_mut(&mut self, user_id: Uuid) -> PortResult<&mut User> {
        self.users
            .get_mut(&user_id)
            .map(|stored| &mut stored.user)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    fn doubt_mut(&mut self, doubt_id: Uuid) -> PortResult<&mut Doubt> {
        self.doubts
            .get_mut(&doubt_id)
            .ok_or_else(|| PortError::NotFound(format!("Doubt {} not found", doubt_id)))
    }

    fn answer_mut(&mut self, answer_id: Uuid) -> PortResult<&mut Answer> {
        self.answers
            .get_mut(&answer_id)
            .ok_or_else(|| PortError::NotFound(format!("Answer {} not found", answer_id)))
    }

    fn active_users(&self) -> Vec<User> {
        self.users
            .values()
            .filter(|s| s.user.is_active)
            .map(|s| s.user.clone())
            .collect()
    }

    /// Ids of `root` and every reply below it.
    fn answer_subtree(&self, root: Uuid) -> Vec<Uuid> {
        let mut ids = vec![root];
        let mut cursor = 0;
        while cursor < ids.len() {
            let parent = ids[cursor];
            ids.extend(
                self.answers
                    .values()
                    .filter(|a| a.parent_answer_id == Some(parent))
                    .map(|a| a.id),
            );
            cursor += 1;
        }
        ids
    }
}

fn count_entries(counts: HashMap<String, i64>, limit: i64) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(key, count)| CountEntry { key, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.key.cmp(&b.key)));
    entries.truncate(limit.max(0) as usize);
    entries
}

fn take(mut users: Vec<User>, limit: i64) -> Vec<User> {
    users.truncate(limit.max(0) as usize);
    users
}

/// A `DatabaseService` that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryAdapter {
    store: RwLock<MemoryStore>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for MemoryAdapter {
    // --- Users ---

    async fn create_user(&self, new: NewUser) -> PortResult<User> {
        let mut store = self.store.write().await;
        if store.users.values().any(|s| s.user.email == new.email) {
            return Err(PortError::Conflict(format!(
                "User with email {} already exists",
                new.email
            )));
        }
        let now = store.now();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            role: new.role,
            profile_photo: String::new(),
            branch: new.branch,
            department: new.department,
            semester: new.semester,
            bio: None,
            reputation: 0,
            stats: UserStats::default(),
            badges: Vec::new(),
            is_verified: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        store.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new.hashed_password,
            },
        );
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let store = self.store.read().await;
        store
            .users
            .get(&user_id)
            .map(|s| s.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_users_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.users.get(id).map(|s| s.user.clone()))
            .collect())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let store = self.store.read().await;
        store
            .users
            .values()
            .find(|s| s.user.email == email)
            .map(|s| UserCredentials {
                user_id: s.user.id,
                email: s.user.email.clone(),
                hashed_password: s.password_hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn get_credentials(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        let store = self.store.read().await;
        store
            .users
            .get(&user_id)
            .map(|s| UserCredentials {
                user_id: s.user.id,
                email: s.user.email.clone(),
                hashed_password: s.password_hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut store = self.store.write().await;
        let now = store.now();
        let stored = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.password_hash = hashed_password.to_string();
        stored.user.updated_at = now;
        Ok(())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let mut store = self.store.write().await;
        let now = store.now();
        let user = store.user_mut(user_id)?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio);
        }
        if let Some(branch) = update.branch {
            user.branch = Some(branch);
        }
        if let Some(semester) = update.semester {
            user.semester = Some(semester);
        }
        if let Some(photo) = update.profile_photo {
            user.profile_photo = photo;
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn apply_reputation(&self, user_id: Uuid, action: ReputationAction) -> PortResult<User> {
        let mut store = self.store.write().await;
        let now = store.now();
        let user = store.user_mut(user_id)?;
        user.reputation = action.apply(user.reputation);
        match action.stat() {
            Some(StatCounter::QuestionsAsked) => user.stats.questions_asked += 1,
            Some(StatCounter::AnswersGiven) => user.stats.answers_given += 1,
            Some(StatCounter::BestAnswers) => user.stats.best_answers += 1,
            Some(StatCounter::HelpfulVotes) => user.stats.helpful_votes += 1,
            None => {}
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn award_badge(&self, user_id: Uuid, name: &str, icon: &str) -> PortResult<bool> {
        let mut store = self.store.write().await;
        let now = store.now();
        let user = store.user_mut(user_id)?;
        if user.has_badge(name) {
            return Ok(false);
        }
        user.badges.push(Badge {
            name: name.to_string(),
            icon: icon.to_string(),
            earned_at: now,
        });
        Ok(true)
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut store = self.store.write().await;
        store
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let mut store = self.store.write().await;
        match store.sessions.get(session_id).copied() {
            Some((user_id, expires_at)) if expires_at > Utc::now() => Ok(user_id),
            Some(_) => {
                store.sessions.remove(session_id);
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut store = self.store.write().await;
        store.sessions.remove(session_id);
        Ok(())
    }

    // --- Doubts ---

    async fn create_doubt(&self, new: NewDoubt) -> PortResult<Doubt> {
        let mut store = self.store.write().await;
        let now = store.now();
        let doubt = Doubt {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            author_id: new.author_id,
            tags: new.tags,
            subject: new.subject,
            department: new.department,
            is_urgent: new.is_urgent,
            is_resolved: false,
            resolved_at: None,
            accepted_answer_id: None,
            views: 0,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            followers: Vec::new(),
            answer_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.doubts.insert(doubt.id, doubt.clone());
        Ok(doubt)
    }

    async fn get_doubt(&self, doubt_id: Uuid) -> PortResult<Doubt> {
        let store = self.store.read().await;
        store
            .doubts
            .get(&doubt_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Doubt {} not found", doubt_id)))
    }

    async fn get_doubts_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<Doubt>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.doubts.get(id).cloned())
            .collect())
    }

    async fn list_doubts(&self, filter: &DoubtFilter, page: PageRequest) -> PortResult<Page<Doubt>> {
        let store = self.store.read().await;
        let mut matching: Vec<Doubt> = store
            .doubts
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| filter.compare(a, b));
        Ok(page.slice(&matching))
    }

    async fn update_doubt(&self, doubt_id: Uuid, update: DoubtUpdate) -> PortResult<Doubt> {
        let mut store = self.store.write().await;
        let now = store.now();
        let doubt = store.doubt_mut(doubt_id)?;
        if let Some(title) = update.title {
            doubt.title = title;
        }
        if let Some(description) = update.description {
            doubt.description = description;
        }
        if let Some(tags) = update.tags {
            doubt.tags = tags;
        }
        if let Some(subject) = update.subject {
            doubt.subject = subject;
        }
        if let Some(urgent) = update.is_urgent {
            doubt.is_urgent = urgent;
        }
        doubt.updated_at = now;
        Ok(doubt.clone())
    }

    async fn delete_doubt(&self, doubt_id: Uuid) -> PortResult<()> {
        let mut store = self.store.write().await;
        if store.doubts.remove(&doubt_id).is_none() {
            return Err(PortError::NotFound(format!("Doubt {} not found", doubt_id)));
        }
        store.answers.retain(|_, a| a.doubt_id != doubt_id);
        for notification in store.notifications.values_mut() {
            if notification.doubt_id == Some(doubt_id) {
                notification.doubt_id = None;
            }
        }
        Ok(())
    }

    async fn increment_doubt_views(&self, doubt_id: Uuid) -> PortResult<Doubt> {
        let mut store = self.store.write().await;
        let doubt = store.doubt_mut(doubt_id)?;
        doubt.views += 1;
        Ok(doubt.clone())
    }

    async fn adjust_answer_count(&self, doubt_id: Uuid, delta: i64) -> PortResult<()> {
        let mut store = self.store.write().await;
        if let Ok(doubt) = store.doubt_mut(doubt_id) {
            doubt.answer_count = (doubt.answer_count + delta).max(0);
        }
        Ok(())
    }

    async fn mark_doubt_resolved(
        &self,
        doubt_id: Uuid,
        accepted_answer_id: Option<Uuid>,
    ) -> PortResult<Doubt> {
        let mut store = self.store.write().await;
        let now = store.now();
        let doubt = store.doubt_mut(doubt_id)?;
        doubt.is_resolved = true;
        doubt.resolved_at = Some(now);
        if accepted_answer_id.is_some() {
            doubt.accepted_answer_id = accepted_answer_id;
        }
        doubt.updated_at = now;
        Ok(doubt.clone())
    }

    async fn clear_accepted_answer(&self, doubt_id: Uuid) -> PortResult<()> {
        let mut store = self.store.write().await;
        let now = store.now();
        if let Ok(doubt) = store.doubt_mut(doubt_id) {
            doubt.accepted_answer_id = None;
            doubt.is_resolved = false;
            doubt.resolved_at = None;
            doubt.updated_at = now;
        }
        Ok(())
    }

    async fn vote_doubt(&self, doubt_id: Uuid, voter: Uuid, kind: VoteKind) -> PortResult<VoteOutcome> {
        let mut store = self.store.write().await;
        let doubt = store.doubt_mut(doubt_id)?;
        let previous = apply_vote(&mut doubt.upvotes, &mut doubt.downvotes, voter, kind);
        Ok(VoteOutcome {
            previous,
            tally: doubt.tally(),
        })
    }

    async fn toggle_follow(&self, doubt_id: Uuid, user_id: Uuid) -> PortResult<FollowState> {
        let mut store = self.store.write().await;
        let doubt = store.doubt_mut(doubt_id)?;
        let was_following = doubt.followers.contains(&user_id);
        if was_following {
            doubt.followers.retain(|id| *id != user_id);
        } else {
            doubt.followers.push(user_id);
        }
        Ok(FollowState {
            is_following: !was_following,
            follower_count: doubt.followers.len() as i64,
        })
    }

    // --- Answers ---

    async fn create_answer(&self, new: NewAnswer) -> PortResult<Answer> {
        let mut store = self.store.write().await;
        if !store.doubts.contains_key(&new.doubt_id) {
            return Err(PortError::NotFound(format!("Doubt {} not found", new.doubt_id)));
        }
        let now = store.now();
        let answer = Answer {
            id: Uuid::new_v4(),
            content: new.content,
            author_id: new.author_id,
            doubt_id: new.doubt_id,
            parent_answer_id: new.parent_answer_id,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            is_accepted: false,
            is_faculty_verified: false,
            verified_by: None,
            edit_history: Vec::new(),
            is_edited: false,
            created_at: now,
            updated_at: now,
        };
        store.answers.insert(answer.id, answer.clone());
        Ok(answer)
    }

    async fn get_answer(&self, answer_id: Uuid) -> PortResult<Answer> {
        let store = self.store.read().await;
        store
            .answers
            .get(&answer_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Answer {} not found", answer_id)))
    }

    async fn get_answers_by_ids(&self, ids: &[Uuid]) -> PortResult<Vec<Answer>> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.answers.get(id).cloned())
            .collect())
    }

    async fn list_answers_for_doubt(&self, doubt_id: Uuid) -> PortResult<Vec<Answer>> {
        let store = self.store.read().await;
        let mut answers: Vec<Answer> = store
            .answers
            .values()
            .filter(|a| a.doubt_id == doubt_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(answers)
    }

    async fn list_answers_by_author(&self, author_id: Uuid, page: PageRequest) -> PortResult<Page<Answer>> {
        let store = self.store.read().await;
        let mut answers: Vec<Answer> = store
            .answers
            .values()
            .filter(|a| a.author_id == author_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.slice(&answers))
    }

    async fn edit_answer(&self, answer_id: Uuid, content: &str) -> PortResult<Answer> {
        let mut store = self.store.write().await;
        let now = store.now();
        let answer = store.answer_mut(answer_id)?;
        let previous_content = std::mem::replace(&mut answer.content, content.to_string());
        answer.edit_history.push(EditRecord {
            edited_at: now,
            previous_content,
        });
        answer.is_edited = true;
        answer.updated_at = now;
        Ok(answer.clone())
    }

    async fn delete_answer(&self, answer_id: Uuid) -> PortResult<i64> {
        let mut store = self.store.write().await;
        if !store.answers.contains_key(&answer_id) {
            return Err(PortError::NotFound(format!("Answer {} not found", answer_id)));
        }
        let subtree = store.answer_subtree(answer_id);
        for id in &subtree {
            store.answers.remove(id);
        }
        for notification in store.notifications.values_mut() {
            if notification.answer_id.is_some_and(|id| subtree.contains(&id)) {
                notification.answer_id = None;
            }
        }
        Ok(subtree.len() as i64)
    }

    async fn set_answer_accepted(&self, answer_id: Uuid, accepted: bool) -> PortResult<()> {
        let mut store = self.store.write().await;
        let now = store.now();
        let answer = store.answer_mut(answer_id)?;
        answer.is_accepted = accepted;
        answer.updated_at = now;
        Ok(())
    }

    async fn set_answer_verification(&self, answer_id: Uuid, verified_by: Option<Uuid>) -> PortResult<Answer> {
        let mut store = self.store.write().await;
        let now = store.now();
        let answer = store.answer_mut(answer_id)?;
        answer.is_faculty_verified = verified_by.is_some();
        answer.verified_by = verified_by;
        answer.updated_at = now;
        Ok(answer.clone())
    }

    async fn vote_answer(&self, answer_id: Uuid, voter: Uuid, kind: VoteKind) -> PortResult<VoteOutcome> {
        let mut store = self.store.write().await;
        let answer = store.answer_mut(answer_id)?;
        let previous = apply_vote(&mut answer.upvotes, &mut answer.downvotes, voter, kind);
        Ok(VoteOutcome {
            previous,
            tally: VoteTally::from_lists(&answer.upvotes, &answer.downvotes),
        })
    }

    // --- Tags ---

    async fn increment_tag_usage(&self, name: &str) -> PortResult<()> {
        let mut store = self.store.write().await;
        let now = store.now();
        store
            .tags
            .entry(name.to_string())
            .or_insert_with(|| Tag {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: None,
                category: TagCategory::General,
                usage_count: 0,
                related_tags: Vec::new(),
                created_at: now,
            })
            .usage_count += 1;
        Ok(())
    }

    async fn list_tags(&self, filter: &TagFilter) -> PortResult<Vec<Tag>> {
        let store = self.store.read().await;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut tags: Vec<Tag> = store
            .tags
            .values()
            .filter(|t| needle.as_ref().map_or(true, |n| t.name.to_lowercase().contains(n)))
            .filter(|t| filter.category.map_or(true, |c| t.category == c))
            .cloned()
            .collect();
        tags.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then(a.name.cmp(&b.name)));
        tags.truncate(filter.limit.max(0) as usize);
        Ok(tags)
    }

    async fn suggest_tags(&self, prefix: &str, limit: i64) -> PortResult<Vec<Tag>> {
        let store = self.store.read().await;
        let prefix = prefix.to_lowercase();
        let mut tags: Vec<Tag> = store
            .tags
            .values()
            .filter(|t| t.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        tags.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then(a.name.cmp(&b.name)));
        tags.truncate(limit.max(0) as usize);
        Ok(tags)
    }

    async fn create_tag(&self, new: NewTag) -> PortResult<Tag> {
        let mut store = self.store.write().await;
        if store.tags.contains_key(&new.name) {
            return Err(PortError::Conflict(format!("Tag {} already exists", new.name)));
        }
        let now = store.now();
        let tag = Tag {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            category: new.category,
            usage_count: 0,
            related_tags: new.related_tags,
            created_at: now,
        };
        store.tags.insert(tag.name.clone(), tag.clone());
        Ok(tag)
    }

    // --- Notifications ---

    async fn create_notification(&self, new: NewNotification) -> PortResult<Notification> {
        let mut store = self.store.write().await;
        let now = store.now();
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            sender_id: new.sender_id,
            kind: new.kind,
            doubt_id: new.doubt_id,
            answer_id: new.answer_id,
            message: new.message,
            is_read: false,
            read_at: None,
            created_at: now,
        };
        store.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        is_read: Option<bool>,
        page: PageRequest,
    ) -> PortResult<Page<Notification>> {
        let store = self.store.read().await;
        let mut items: Vec<Notification> = store
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient)
            .filter(|n| is_read.map_or(true, |r| n.is_read == r))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.slice(&items))
    }

    async fn mark_notification_read(&self, notification_id: Uuid, recipient: Uuid) -> PortResult<Notification> {
        let mut store = self.store.write().await;
        let now = store.now();
        match store.notifications.get_mut(&notification_id) {
            Some(n) if n.recipient_id == recipient => {
                n.is_read = true;
                n.read_at = Some(now);
                Ok(n.clone())
            }
            _ => Err(PortError::NotFound("Notification not found".to_string())),
        }
    }

    async fn mark_all_notifications_read(&self, recipient: Uuid) -> PortResult<u64> {
        let mut store = self.store.write().await;
        let now = store.now();
        let mut changed = 0;
        for n in store.notifications.values_mut() {
            if n.recipient_id == recipient && !n.is_read {
                n.is_read = true;
                n.read_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_notification(&self, notification_id: Uuid, recipient: Uuid) -> PortResult<()> {
        let mut store = self.store.write().await;
        match store.notifications.get(&notification_id) {
            Some(n) if n.recipient_id == recipient => {
                store.notifications.remove(&notification_id);
                Ok(())
            }
            _ => Err(PortError::NotFound("Notification not found".to_string())),
        }
    }

    // --- Leaderboard & Statistics ---

    async fn top_users_by_reputation(&self, limit: i64) -> PortResult<Vec<User>> {
        let store = self.store.read().await;
        let mut users = store.active_users();
        users.sort_by(|a, b| {
            b.reputation
                .cmp(&a.reputation)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(take(users, limit))
    }

    async fn top_contributors(&self, limit: i64) -> PortResult<Vec<User>> {
        let store = self.store.read().await;
        let mut users = store.active_users();
        users.sort_by(|a, b| {
            b.stats
                .total_activity()
                .cmp(&a.stats.total_activity())
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(take(users, limit))
    }

    async fn top_answerers(&self, since: Option<DateTime<Utc>>, limit: i64) -> PortResult<Vec<AnswererRank>> {
        let store = self.store.read().await;
        let mut totals: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for answer in store.answers.values() {
            if since.is_some_and(|s| answer.created_at < s) {
                continue;
            }
            let entry = totals.entry(answer.author_id).or_default();
            entry.0 += 1;
            entry.1 += answer.upvotes.len() as i64;
        }

        let mut ranks: Vec<AnswererRank> = totals
            .into_iter()
            .filter_map(|(author, (answer_count, upvotes))| {
                store.users.get(&author).map(|s| AnswererRank {
                    user: s.user.clone(),
                    answer_count,
                    upvotes,
                })
            })
            .collect();
        ranks.sort_by(|a, b| {
            b.answer_count
                .cmp(&a.answer_count)
                .then(b.upvotes.cmp(&a.upvotes))
                .then(a.user.created_at.cmp(&b.user.created_at))
        });
        ranks.truncate(limit.max(0) as usize);
        Ok(ranks)
    }

    async fn badge_holders(&self, badge: &str, limit: i64) -> PortResult<Vec<User>> {
        let store = self.store.read().await;
        let mut users: Vec<User> = store
            .active_users()
            .into_iter()
            .filter(|u| u.has_badge(badge))
            .collect();
        users.sort_by(|a, b| {
            b.stats
                .best_answers
                .cmp(&a.stats.best_answers)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(take(users, limit))
    }

    async fn count_active_users(&self) -> PortResult<i64> {
        let store = self.store.read().await;
        Ok(store.users.values().filter(|s| s.user.is_active).count() as i64)
    }

    async fn count_doubts(&self) -> PortResult<(i64, i64)> {
        let store = self.store.read().await;
        let total = store.doubts.len() as i64;
        let resolved = store.doubts.values().filter(|d| d.is_resolved).count() as i64;
        Ok((total, resolved))
    }

    async fn count_answers(&self) -> PortResult<i64> {
        let store = self.store.read().await;
        Ok(store.answers.len() as i64)
    }

    async fn popular_tags(&self, limit: i64) -> PortResult<Vec<CountEntry>> {
        let store = self.store.read().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for doubt in store.doubts.values() {
            for tag in &doubt.tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        Ok(count_entries(counts, limit))
    }

    async fn active_departments(&self, limit: i64) -> PortResult<Vec<CountEntry>> {
        let store = self.store.read().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for doubt in store.doubts.values() {
            *counts.entry(doubt.department.clone()).or_default() += 1;
        }
        Ok(count_entries(counts, limit))
    }
}
