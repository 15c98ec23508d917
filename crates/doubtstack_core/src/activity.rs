//! crates/doubtstack_core/src/activity.rs
//!
//! The side effects of user actions: reputation, stats, tag usage, stored
//! notifications and their live push. Every step is a direct write through the
//! `DatabaseService` port; live delivery goes through `NotificationPublisher`.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{
    Answer, Doubt, DoubtRef, LiveNotification, NewAnswer, NewDoubt, NewNotification,
    Notification, NotificationKind, Role, SenderSummary, User, VoteKind, VoteTally,
    FACULTY_VERIFIED_BADGE, FACULTY_VERIFIED_ICON,
};
use crate::ports::{DatabaseService, NotificationPublisher, PortError, PortResult};
use crate::reputation::ReputationAction;
use crate::validation::DoubtDraft;

#[derive(Clone)]
pub struct Activity {
    db: Arc<dyn DatabaseService>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl Activity {
    pub fn new(db: Arc<dyn DatabaseService>, publisher: Arc<dyn NotificationPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Creates a doubt on behalf of `author` in the author's department.
    pub async fn post_doubt(&self, author: &User, draft: DoubtDraft) -> PortResult<Doubt> {
        let doubt = self
            .db
            .create_doubt(NewDoubt {
                title: draft.title,
                description: draft.description,
                author_id: author.id,
                tags: draft.tags,
                subject: draft.subject,
                department: author.department.clone(),
                is_urgent: draft.is_urgent,
            })
            .await?;

        self.reward(author.id, ReputationAction::QuestionPosted).await?;

        for tag in &doubt.tags {
            self.db.increment_tag_usage(&tag.to_lowercase()).await?;
        }

        info!(doubt_id = %doubt.id, author_id = %author.id, "Doubt posted");
        Ok(doubt)
    }

    /// Posts an answer, or a reply when `parent_answer_id` is given.
    ///
    /// A top-level answer notifies the doubt's author with `new_answer`. A reply
    /// notifies the parent answer's author with `new_reply` instead, and the doubt's
    /// author hears nothing about it. Nobody is notified of their own post.
    /// The parent must belong to the same doubt.
    pub async fn post_answer(
        &self,
        author: &User,
        doubt_id: Uuid,
        content: String,
        parent_answer_id: Option<Uuid>,
    ) -> PortResult<Answer> {
        let doubt = self.db.get_doubt(doubt_id).await?;

        let parent = match parent_answer_id {
            Some(parent_id) => {
                let parent = self.db.get_answer(parent_id).await.map_err(|e| match e {
                    PortError::NotFound(_) => {
                        PortError::Invalid(format!("Parent answer {} does not exist", parent_id))
                    }
                    other => other,
                })?;
                if parent.doubt_id != doubt.id {
                    return Err(PortError::Invalid(
                        "Parent answer belongs to a different doubt".to_string(),
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let answer = self
            .db
            .create_answer(NewAnswer {
                content,
                author_id: author.id,
                doubt_id: doubt.id,
                parent_answer_id: parent.as_ref().map(|p| p.id),
            })
            .await?;

        self.db.adjust_answer_count(doubt.id, 1).await?;
        self.reward(author.id, ReputationAction::AnswerPosted).await?;

        match &parent {
            Some(parent) => {
                self.notify(
                    author,
                    parent.author_id,
                    NotificationKind::NewReply,
                    Some(&doubt),
                    Some(answer.id),
                    format!("{} replied to your answer", author.name),
                )
                .await;
            }
            None => {
                self.notify(
                    author,
                    doubt.author_id,
                    NotificationKind::NewAnswer,
                    Some(&doubt),
                    Some(answer.id),
                    format!("{} answered your question", author.name),
                )
                .await;
            }
        }

        info!(answer_id = %answer.id, doubt_id = %doubt.id, author_id = %author.id, "Answer posted");
        Ok(answer)
    }

    /// Replaces the voter's vote on a doubt. A fresh upvote notifies the author.
    pub async fn vote_doubt(&self, voter: &User, doubt_id: Uuid, kind: VoteKind) -> PortResult<VoteTally> {
        let outcome = self.db.vote_doubt(doubt_id, voter.id, kind).await?;

        if kind == VoteKind::Upvote && outcome.previous != Some(VoteKind::Upvote) {
            let doubt = self.db.get_doubt(doubt_id).await?;
            self.notify(
                voter,
                doubt.author_id,
                NotificationKind::UpvotedDoubt,
                Some(&doubt),
                None,
                format!("{} upvoted your question", voter.name),
            )
            .await;
        }

        Ok(outcome.tally)
    }

    /// Replaces the voter's vote on an answer.
    ///
    /// Only a vote that differs from the voter's previous one moves the author's reputation.
    pub async fn vote_answer(&self, voter: &User, answer_id: Uuid, kind: VoteKind) -> PortResult<VoteTally> {
        let answer = self.db.get_answer(answer_id).await?;
        let outcome = self.db.vote_answer(answer_id, voter.id, kind).await?;

        if outcome.previous == Some(kind) {
            return Ok(outcome.tally);
        }

        match kind {
            VoteKind::Upvote => {
                self.reward(answer.author_id, ReputationAction::UpvoteReceived).await?;
                let doubt = self.db.get_doubt(answer.doubt_id).await.ok();
                self.notify(
                    voter,
                    answer.author_id,
                    NotificationKind::UpvotedAnswer,
                    doubt.as_ref(),
                    Some(answer.id),
                    format!("{} upvoted your answer", voter.name),
                )
                .await;
            }
            VoteKind::Downvote => {
                self.reward(answer.author_id, ReputationAction::DownvoteReceived).await?;
            }
        }

        Ok(outcome.tally)
    }

    /// Marks an answer as the best answer of its doubt. Only the doubt author may do this.
    pub async fn accept_answer(&self, actor: &User, answer_id: Uuid) -> PortResult<Answer> {
        let answer = self.db.get_answer(answer_id).await?;
        let doubt = self.db.get_doubt(answer.doubt_id).await.map_err(|e| match e {
            PortError::NotFound(_) => PortError::NotFound("Associated doubt not found".to_string()),
            other => other,
        })?;

        if doubt.author_id != actor.id {
            return Err(PortError::Forbidden(
                "Only the doubt author can accept an answer".to_string(),
            ));
        }

        if doubt.accepted_answer_id == Some(answer.id) && answer.is_accepted {
            return Ok(answer);
        }

        if let Some(previous) = doubt.accepted_answer_id {
            match self.db.set_answer_accepted(previous, false).await {
                Ok(()) | Err(PortError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.db.set_answer_accepted(answer.id, true).await?;
        let doubt = self.db.mark_doubt_resolved(doubt.id, Some(answer.id)).await?;

        self.reward(answer.author_id, ReputationAction::AnswerAccepted).await?;
        self.notify(
            actor,
            answer.author_id,
            NotificationKind::AcceptedAnswer,
            Some(&doubt),
            Some(answer.id),
            format!("{} accepted your answer as the best answer", actor.name),
        )
        .await;

        self.db.get_answer(answer.id).await
    }

    /// Toggles faculty verification. Verifying rewards the author and grants the badge once.
    pub async fn verify_answer(&self, actor: &User, answer_id: Uuid) -> PortResult<Answer> {
        if !matches!(actor.role, Role::Faculty | Role::Admin) {
            return Err(PortError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                actor.role
            )));
        }

        let answer = self.db.get_answer(answer_id).await?;
        let verified_by = if answer.is_faculty_verified {
            None
        } else {
            Some(actor.id)
        };
        let answer = self.db.set_answer_verification(answer.id, verified_by).await?;

        if answer.is_faculty_verified {
            self.reward(answer.author_id, ReputationAction::BestAnswer).await?;
            if self
                .db
                .award_badge(answer.author_id, FACULTY_VERIFIED_BADGE, FACULTY_VERIFIED_ICON)
                .await?
            {
                info!(user_id = %answer.author_id, "Awarded {} badge", FACULTY_VERIFIED_BADGE);
            }
        }

        Ok(answer)
    }

    /// Deletes an answer with its replies and keeps the doubt's counters consistent.
    pub async fn delete_answer(&self, actor: &User, answer_id: Uuid) -> PortResult<()> {
        let answer = self.db.get_answer(answer_id).await?;
        if answer.author_id != actor.id && !actor.is_admin() {
            return Err(PortError::Forbidden(
                "Not authorized to delete this answer".to_string(),
            ));
        }

        let doubt = match self.db.get_doubt(answer.doubt_id).await {
            Ok(doubt) => Some(doubt),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let removed = self.db.delete_answer(answer.id).await?;

        if let Some(doubt) = doubt {
            self.db.adjust_answer_count(doubt.id, -removed).await?;
            if doubt.accepted_answer_id == Some(answer.id) {
                self.db.clear_accepted_answer(doubt.id).await?;
            }
        }

        info!(answer_id = %answer.id, removed, "Answer deleted");
        Ok(())
    }

    async fn reward(&self, user_id: Uuid, action: ReputationAction) -> PortResult<User> {
        let user = self.db.apply_reputation(user_id, action).await?;
        info!(
            user_id = %user_id,
            action = action.as_str(),
            points = action.points(),
            reputation = user.reputation,
            "Reputation updated"
        );
        Ok(user)
    }

    /// Stores a notification and pushes it live. Never fails the calling action.
    pub async fn notify(
        &self,
        sender: &User,
        recipient: Uuid,
        kind: NotificationKind,
        doubt: Option<&Doubt>,
        answer_id: Option<Uuid>,
        message: String,
    ) -> Option<Notification> {
        if recipient == sender.id {
            return None;
        }

        let stored = self
            .db
            .create_notification(NewNotification {
                recipient_id: recipient,
                sender_id: sender.id,
                kind,
                doubt_id: doubt.map(|d| d.id),
                answer_id,
                message,
            })
            .await;

        let notification = match stored {
            Ok(notification) => notification,
            Err(e) => {
                error!("Error creating notification: {:?}", e);
                return None;
            }
        };

        let live = LiveNotification {
            notification: notification.clone(),
            sender: SenderSummary {
                id: sender.id,
                name: sender.name.clone(),
                profile_photo: sender.profile_photo.clone(),
            },
            doubt: doubt.map(|d| DoubtRef {
                id: d.id,
                title: d.title.clone(),
            }),
            answer_id,
        };
        let delivered = self.publisher.publish(recipient, &live);
        info!(
            notification_id = %notification.id,
            recipient = %recipient,
            kind = kind.as_str(),
            delivered,
            "Notification stored"
        );

        Some(notification)
    }
}
