//! Side effects of user actions, run against the in-memory store.

use std::sync::{Arc, Mutex};

use api_lib::adapters::MemoryAdapter;
use doubtstack_core::{
    domain::{LiveNotification, NewUser, NotificationKind, PageRequest, FACULTY_VERIFIED_BADGE},
    validation::DoubtDraft,
    Activity, DatabaseService, NotificationPublisher, PortError, Role, User, VoteKind,
};
use uuid::Uuid;

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<(Uuid, NotificationKind)>>,
}

impl RecordingPublisher {
    fn sent(&self) -> Vec<(Uuid, NotificationKind)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish(&self, recipient: Uuid, notification: &LiveNotification) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, notification.notification.kind));
        true
    }
}

struct Fixture {
    db: Arc<MemoryAdapter>,
    publisher: Arc<RecordingPublisher>,
    activity: Activity,
}

impl Fixture {
    fn new() -> Self {
        let db = Arc::new(MemoryAdapter::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let activity = Activity::new(db.clone(), publisher.clone());
        Self {
            db,
            publisher,
            activity,
        }
    }

    async fn user(&self, name: &str, role: Role) -> User {
        self.db
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@campus.edu", name.to_lowercase()),
                hashed_password: "not-a-real-hash".to_string(),
                role,
                branch: None,
                department: "Computer Science".to_string(),
                semester: None,
            })
            .await
            .unwrap()
    }

    async fn reload(&self, user: &User) -> User {
        self.db.get_user_by_id(user.id).await.unwrap()
    }
}

fn draft(title: &str, tags: &[&str]) -> DoubtDraft {
    DoubtDraft {
        title: title.to_string(),
        description: "How does this work?".to_string(),
        subject: "Algorithms".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        is_urgent: false,
    }
}

#[tokio::test]
async fn posting_a_doubt_rewards_the_author_and_counts_tags() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;

    let doubt = fx
        .activity
        .post_doubt(&asker, draft("Dijkstra with negative edges", &["graphs", "dsa"]))
        .await
        .unwrap();

    assert_eq!(doubt.department, "Computer Science");
    let asker = fx.reload(&asker).await;
    assert_eq!(asker.reputation, 5);
    assert_eq!(asker.stats.questions_asked, 1);

    let suggestions = fx.db.suggest_tags("gr", 10).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "graphs");
    assert_eq!(suggestions[0].usage_count, 1);
}

#[tokio::test]
async fn answering_notifies_the_doubt_author_but_not_yourself() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let helper = fx.user("Ravi", Role::Student).await;
    let doubt = fx.activity.post_doubt(&asker, draft("Heaps", &[])).await.unwrap();

    fx.activity
        .post_answer(&asker, doubt.id, "Answering my own question".to_string(), None)
        .await
        .unwrap();
    assert!(fx.publisher.sent().is_empty());

    fx.activity
        .post_answer(&helper, doubt.id, "Use a binary heap".to_string(), None)
        .await
        .unwrap();
    assert_eq!(fx.publisher.sent(), vec![(asker.id, NotificationKind::NewAnswer)]);

    let helper = fx.reload(&helper).await;
    assert_eq!(helper.reputation, 10);
    assert_eq!(helper.stats.answers_given, 1);

    let stored = fx
        .db
        .list_notifications(asker.id, None, PageRequest { page: 1, limit: 20 })
        .await
        .unwrap();
    assert_eq!(stored.total, 1);
    assert_eq!(stored.items[0].sender_id, helper.id);
    assert_eq!(fx.db.get_doubt(doubt.id).await.unwrap().answer_count, 2);
}

#[tokio::test]
async fn replies_notify_the_parent_author_and_must_share_the_doubt() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let helper = fx.user("Ravi", Role::Student).await;
    let first = fx.activity.post_doubt(&asker, draft("Tries", &[])).await.unwrap();
    let second = fx.activity.post_doubt(&asker, draft("Graphs", &[])).await.unwrap();

    let answer = fx
        .activity
        .post_answer(&helper, first.id, "Prefix tree".to_string(), None)
        .await
        .unwrap();
    fx.activity
        .post_answer(&asker, first.id, "Thanks, why?".to_string(), Some(answer.id))
        .await
        .unwrap();

    let sent = fx.publisher.sent();
    assert_eq!(sent.last(), Some(&(helper.id, NotificationKind::NewReply)));

    // A third user's reply reaches the answer's author but not the asker.
    let bystander = fx.user("Meera", Role::Student).await;
    let before = fx.publisher.sent().len();
    fx.activity
        .post_answer(&bystander, first.id, "Also a trie".to_string(), Some(answer.id))
        .await
        .unwrap();
    let sent = fx.publisher.sent();
    assert_eq!(&sent[before..], &[(helper.id, NotificationKind::NewReply)]);

    let err = fx
        .activity
        .post_answer(&asker, second.id, "Wrong thread".to_string(), Some(answer.id))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Invalid(_)));
}

#[tokio::test]
async fn answer_votes_move_reputation_only_when_they_change() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let helper = fx.user("Ravi", Role::Student).await;
    let doubt = fx.activity.post_doubt(&asker, draft("Tries", &[])).await.unwrap();
    let answer = fx
        .activity
        .post_answer(&helper, doubt.id, "Prefix tree".to_string(), None)
        .await
        .unwrap();

    let tally = fx
        .activity
        .vote_answer(&asker, answer.id, VoteKind::Upvote)
        .await
        .unwrap();
    assert_eq!((tally.upvotes, tally.downvotes, tally.vote_score), (1, 0, 1));
    assert_eq!(fx.reload(&helper).await.reputation, 15);

    fx.activity
        .vote_answer(&asker, answer.id, VoteKind::Upvote)
        .await
        .unwrap();
    assert_eq!(fx.reload(&helper).await.reputation, 15);

    let tally = fx
        .activity
        .vote_answer(&asker, answer.id, VoteKind::Downvote)
        .await
        .unwrap();
    assert_eq!((tally.upvotes, tally.downvotes, tally.vote_score), (0, 1, -1));
    let helper = fx.reload(&helper).await;
    assert_eq!(helper.reputation, 13);
    assert_eq!(helper.stats.helpful_votes, 1);
}

#[tokio::test]
async fn doubt_upvotes_notify_once_per_fresh_upvote() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let voter = fx.user("Ravi", Role::Student).await;
    let doubt = fx.activity.post_doubt(&asker, draft("Tries", &[])).await.unwrap();

    fx.activity.vote_doubt(&voter, doubt.id, VoteKind::Upvote).await.unwrap();
    fx.activity.vote_doubt(&voter, doubt.id, VoteKind::Upvote).await.unwrap();
    let tally = fx
        .activity
        .vote_doubt(&voter, doubt.id, VoteKind::Downvote)
        .await
        .unwrap();

    assert_eq!(tally.vote_score, -1);
    assert_eq!(fx.publisher.sent(), vec![(asker.id, NotificationKind::UpvotedDoubt)]);
    assert_eq!(fx.reload(&asker).await.reputation, 5);
}

#[tokio::test]
async fn accepting_resolves_the_doubt_and_replaces_the_previous_pick() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let first_helper = fx.user("Ravi", Role::Student).await;
    let second_helper = fx.user("Meera", Role::Student).await;
    let doubt = fx.activity.post_doubt(&asker, draft("Tries", &[])).await.unwrap();
    let first = fx
        .activity
        .post_answer(&first_helper, doubt.id, "One".to_string(), None)
        .await
        .unwrap();
    let second = fx
        .activity
        .post_answer(&second_helper, doubt.id, "Two".to_string(), None)
        .await
        .unwrap();

    let err = fx.activity.accept_answer(&first_helper, first.id).await.unwrap_err();
    assert!(matches!(err, PortError::Forbidden(_)));

    let accepted = fx.activity.accept_answer(&asker, first.id).await.unwrap();
    assert!(accepted.is_accepted);
    let resolved = fx.db.get_doubt(doubt.id).await.unwrap();
    assert!(resolved.is_resolved);
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.accepted_answer_id, Some(first.id));

    // Accepting the same answer again changes nothing.
    fx.activity.accept_answer(&asker, first.id).await.unwrap();
    let first_helper_after = fx.reload(&first_helper).await;
    assert_eq!(first_helper_after.reputation, 35);
    assert_eq!(first_helper_after.stats.best_answers, 1);

    fx.activity.accept_answer(&asker, second.id).await.unwrap();
    assert!(!fx.db.get_answer(first.id).await.unwrap().is_accepted);
    assert!(fx.db.get_answer(second.id).await.unwrap().is_accepted);
    assert_eq!(
        fx.db.get_doubt(doubt.id).await.unwrap().accepted_answer_id,
        Some(second.id)
    );
}

#[tokio::test]
async fn verification_toggles_and_awards_the_badge_once() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let helper = fx.user("Ravi", Role::Student).await;
    let professor = fx.user("Iyer", Role::Faculty).await;
    let doubt = fx.activity.post_doubt(&asker, draft("Tries", &[])).await.unwrap();
    let answer = fx
        .activity
        .post_answer(&helper, doubt.id, "Prefix tree".to_string(), None)
        .await
        .unwrap();

    let err = fx.activity.verify_answer(&asker, answer.id).await.unwrap_err();
    assert!(matches!(err, PortError::Forbidden(_)));

    let verified = fx.activity.verify_answer(&professor, answer.id).await.unwrap();
    assert!(verified.is_faculty_verified);
    assert_eq!(verified.verified_by, Some(professor.id));

    let cleared = fx.activity.verify_answer(&professor, answer.id).await.unwrap();
    assert!(!cleared.is_faculty_verified);
    assert_eq!(cleared.verified_by, None);

    fx.activity.verify_answer(&professor, answer.id).await.unwrap();
    let helper = fx.reload(&helper).await;
    assert_eq!(helper.reputation, 10 + 50 + 50);
    assert_eq!(
        helper
            .badges
            .iter()
            .filter(|b| b.name == FACULTY_VERIFIED_BADGE)
            .count(),
        1
    );
}

#[tokio::test]
async fn deleting_an_answer_removes_its_replies_from_the_count() {
    let fx = Fixture::new();
    let asker = fx.user("Asha", Role::Student).await;
    let helper = fx.user("Ravi", Role::Student).await;
    let doubt = fx.activity.post_doubt(&asker, draft("Tries", &[])).await.unwrap();
    let answer = fx
        .activity
        .post_answer(&helper, doubt.id, "Prefix tree".to_string(), None)
        .await
        .unwrap();
    let reply = fx
        .activity
        .post_answer(&asker, doubt.id, "Why?".to_string(), Some(answer.id))
        .await
        .unwrap();
    fx.activity
        .post_answer(&helper, doubt.id, "Shared prefixes".to_string(), Some(reply.id))
        .await
        .unwrap();
    fx.activity
        .post_answer(&helper, doubt.id, "Also a radix tree".to_string(), None)
        .await
        .unwrap();
    fx.activity.accept_answer(&asker, answer.id).await.unwrap();
    assert_eq!(fx.db.get_doubt(doubt.id).await.unwrap().answer_count, 4);

    let err = fx.activity.delete_answer(&asker, answer.id).await.unwrap_err();
    assert!(matches!(err, PortError::Forbidden(_)));

    fx.activity.delete_answer(&helper, answer.id).await.unwrap();

    let doubt = fx.db.get_doubt(doubt.id).await.unwrap();
    assert_eq!(doubt.answer_count, 1);
    assert_eq!(doubt.accepted_answer_id, None);
    assert!(!doubt.is_resolved);
    assert_eq!(fx.db.list_answers_for_doubt(doubt.id).await.unwrap().len(), 1);
    assert!(matches!(
        fx.db.get_answer(reply.id).await,
        Err(PortError::NotFound(_))
    ));
}
