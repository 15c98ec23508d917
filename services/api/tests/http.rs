//! End-to-end requests through the full router, backed by the in-memory store.

use std::sync::Arc;

use api_lib::{
    adapters::MemoryAdapter,
    config::Config,
    web::{build_router, AppState},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use doubtstack_core::{domain::NewUser, DatabaseService, Role, User};
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, Message as WsMessage};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    db: Arc<MemoryAdapter>,
}

impl TestApp {
    fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("memory://".to_string()),
            _ => None,
        })
        .unwrap();
        let db = Arc::new(MemoryAdapter::new());
        let state = Arc::new(AppState::new(db.clone(), Arc::new(config)));
        let router = build_router(state).unwrap();
        Self { router, db }
    }

    /// Inserts a user directly and opens a session for them.
    async fn seed_user(&self, name: &str, role: Role) -> (User, String) {
        let user = self
            .db
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@campus.edu", name.to_lowercase()),
                hashed_password: "unused".to_string(),
                role,
                branch: Some("CSE".to_string()),
                department: "Computer Science".to_string(),
                semester: Some(3),
            })
            .await
            .unwrap();
        let token = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&token, user.id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        (user, token)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn post_doubt(&self, token: &str, title: &str) -> Value {
        self.post_tagged_doubt(token, title, "hashing, DSA").await
    }

    async fn post_tagged_doubt(&self, token: &str, title: &str, tags: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/doubts",
                Some(token),
                Some(json!({
                    "title": title,
                    "description": "Why is the amortized cost constant?",
                    "subject": "Data Structures",
                    "tags": tags,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["doubt"].clone()
    }

    async fn post_answer(&self, token: &str, doubt_id: &str, content: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/api/answers/doubts/{}", doubt_id),
                Some(token),
                Some(json!({ "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["answer"].clone()
    }
}

fn titles(body: &Value) -> Vec<String> {
    body["data"]["doubts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, body) = app.send(Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "message": "Route not found"}));
}

#[tokio::test]
async fn protected_routes_need_a_live_session() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized to access this route");

    let (status, _) = app
        .send(Method::GET, "/api/notifications", Some("made-up-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_logout() {
    let app = TestApp::new();
    let registration = json!({
        "name": "Asha Rao",
        "email": "Asha@Campus.edu",
        "password": "secret123",
        "role": "student",
        "branch": "CSE",
        "department": "Computer Science",
        "semester": 4,
    });

    let (status, body) = app
        .send(Method::POST, "/api/auth/register", None, Some(registration.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["user"]["email"], "asha@campus.edu");
    assert_eq!(body["data"]["user"]["reputation"], 0);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::POST, "/api/auth/register", None, Some(registration))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists with this email");

    let (status, body) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["name"], "Asha Rao");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "asha@campus.edu", "password": "wrong-one"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "asha@campus.edu", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let login_token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::POST, "/api/auth/logout", Some(&login_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    let (status, _) = app
        .send(Method::GET, "/api/auth/me", Some(&login_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_errors_are_listed_per_field() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "not-an-email", "password": "123", "role": "student"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
    assert!(fields.contains(&"department"));
}

#[tokio::test]
async fn doubt_validation_and_bad_ids() {
    let app = TestApp::new();
    let (_, token) = app.seed_user("Asha", Role::Student).await;

    let (status, body) = app
        .send(Method::POST, "/api/doubts", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);

    let (status, body) = app.send(Method::GET, "/api/doubts/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid ID format");

    let (status, _) = app
        .send(Method::GET, &format!("/api/doubts/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(Method::GET, "/api/doubts?sort=sideways", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn asking_answering_and_notifications() {
    let app = TestApp::new();
    let (asker, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, helper_token) = app.seed_user("Ravi", Role::Student).await;

    let doubt = app.post_doubt(&asker_token, "Hash table resizing").await;
    assert_eq!(doubt["tags"], json!(["hashing", "DSA"]));
    assert_eq!(doubt["author"]["id"], json!(asker.id));
    let doubt_id = doubt["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/answers/doubts/{}", doubt_id),
            Some(&helper_token),
            Some(json!({"content": "Doubling keeps inserts O(1) amortized."})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let answer_id = body["data"]["answer"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/answers/{}/vote", answer_id),
            Some(&asker_token),
            Some(json!({"voteType": "upvote"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["voteScore"], 1);

    let (status, body) = app
        .send(Method::GET, &format!("/api/doubts/{}", doubt_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doubt"]["views"], 1);
    assert_eq!(body["data"]["doubt"]["answerCount"], 1);
    assert_eq!(body["data"]["answers"][0]["id"], answer_id.as_str());

    let (status, body) = app
        .send(Method::GET, "/api/notifications", Some(&asker_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let notifications = body["data"]["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "new_answer");
    assert_eq!(notifications[0]["doubt"]["title"], "Hash table resizing");

    let (status, body) = app
        .send(Method::PUT, "/api/notifications/read-all", Some(&asker_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Marked 1 notifications as read");

    let (_, body) = app
        .send(Method::GET, "/api/notifications?isRead=false", Some(&asker_token), None)
        .await;
    assert!(body["data"]["notifications"].as_array().unwrap().is_empty());

    let (_, body) = app
        .send(Method::GET, "/api/notifications?isRead=true", Some(&asker_token), None)
        .await;
    assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/answers/{}/accept", answer_id),
            Some(&helper_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/answers/{}/accept", answer_id),
            Some(&asker_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["answer"]["isAccepted"], true);

    let (_, body) = app.send(Method::GET, "/api/doubts?isResolved=true", None, None).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn following_toggles() {
    let app = TestApp::new();
    let (_, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, reader_token) = app.seed_user("Ravi", Role::Student).await;
    let doubt = app.post_doubt(&asker_token, "Tries").await;
    let uri = format!("/api/doubts/{}/follow", doubt["id"].as_str().unwrap());

    let (status, body) = app.send(Method::POST, &uri, Some(&reader_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"isFollowing": true, "followerCount": 1}));

    let (_, body) = app.send(Method::POST, &uri, Some(&reader_token), None).await;
    assert_eq!(body["data"], json!({"isFollowing": false, "followerCount": 0}));
}

#[tokio::test]
async fn only_owners_edit_profiles_and_only_admins_create_tags() {
    let app = TestApp::new();
    let (asha, asha_token) = app.seed_user("Asha", Role::Student).await;
    let (_, ravi_token) = app.seed_user("Ravi", Role::Student).await;
    let (_, admin_token) = app.seed_user("Admin", Role::Admin).await;
    let profile = format!("/api/users/{}", asha.id);

    let (status, body) = app
        .send(Method::PUT, &profile, Some(&ravi_token), Some(json!({"bio": "hijacked"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to update this profile");

    let (status, body) = app
        .send(Method::PUT, &profile, Some(&asha_token), Some(json!({"bio": "Loves graphs"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = app.send(Method::GET, &profile, None, None).await;
    assert_eq!(body["data"]["user"]["bio"], "Loves graphs");

    let tag = json!({"name": "graphs", "category": "subject"});
    let (status, _) = app
        .send(Method::POST, "/api/tags", Some(&asha_token), Some(tag.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/api/tags", Some(&admin_token), Some(tag.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["tag"]["name"], "graphs");

    let (status, body) = app
        .send(Method::POST, "/api/tags", Some(&admin_token), Some(tag))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Tag already exists");

    let (_, body) = app.send(Method::GET, "/api/tags/suggest?query=gr", None, None).await;
    assert_eq!(body["data"]["suggestions"][0]["name"], "graphs");
}

#[tokio::test]
async fn leaderboard_ranks_by_reputation() {
    let app = TestApp::new();
    let (asker, asker_token) = app.seed_user("Asha", Role::Student).await;
    app.seed_user("Ravi", Role::Student).await;
    app.post_doubt(&asker_token, "Tries").await;

    let (status, body) = app.send(Method::GET, "/api/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["topUsers"][0]["id"], json!(asker.id));
    assert_eq!(body["data"]["topUsers"][0]["reputation"], 5);

    let (status, _) = app
        .send(Method::GET, "/api/leaderboard?period=yearly", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(Method::GET, "/api/leaderboard/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalUsers"], 2);
    assert_eq!(body["data"]["totalDoubts"], 1);
}

#[tokio::test]
async fn editing_an_answer_keeps_its_history() {
    let app = TestApp::new();
    let (_, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, helper_token) = app.seed_user("Ravi", Role::Student).await;
    let doubt = app.post_doubt(&asker_token, "Tries").await;
    let answer = app
        .post_answer(&helper_token, doubt["id"].as_str().unwrap(), "Use a hash map.")
        .await;
    assert_eq!(answer["isEdited"], false);
    let uri = format!("/api/answers/{}", answer["id"].as_str().unwrap());

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&asker_token), Some(json!({"content": "Hijacked"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to update this answer");

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&helper_token), Some(json!({"content": "Use a prefix tree."})))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let edited = &body["data"]["answer"];
    assert_eq!(edited["content"], "Use a prefix tree.");
    assert_eq!(edited["isEdited"], true);
    assert_eq!(edited["editHistory"].as_array().unwrap().len(), 1);
    assert_eq!(edited["editHistory"][0]["previousContent"], "Use a hash map.");

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&helper_token), Some(json!({"content": ""})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn only_the_author_resolves_a_doubt() {
    let app = TestApp::new();
    let (_, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, other_token) = app.seed_user("Ravi", Role::Student).await;
    let doubt = app.post_doubt(&asker_token, "Tries").await;
    assert_eq!(doubt["isResolved"], false);
    let uri = format!("/api/doubts/{}/resolve", doubt["id"].as_str().unwrap());

    let (status, body) = app.send(Method::PUT, &uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only the doubt author can mark it as resolved");

    let (status, body) = app.send(Method::PUT, &uri, Some(&asker_token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["doubt"]["isResolved"], true);
    assert!(body["data"]["doubt"]["resolvedAt"].is_string());

    let (_, body) = app.send(Method::GET, "/api/doubts?isResolved=true", None, None).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn deleting_a_doubt_takes_its_answers() {
    let app = TestApp::new();
    let (_, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, helper_token) = app.seed_user("Ravi", Role::Student).await;
    let doubt = app.post_doubt(&asker_token, "Tries").await;
    let doubt_id = doubt["id"].as_str().unwrap();
    let answer = app.post_answer(&helper_token, doubt_id, "Prefix tree").await;
    let answer_id: Uuid = answer["id"].as_str().unwrap().parse().unwrap();
    let uri = format!("/api/doubts/{}", doubt_id);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&helper_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::DELETE, &uri, Some(&asker_token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Doubt deleted successfully");

    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.db.get_answer(answer_id).await.is_err());

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/answers/{}", answer_id),
            Some(&helper_token),
            Some(json!({"content": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The new_answer notification outlives both records.
    let (status, body) = app
        .send(Method::GET, "/api/notifications", Some(&asker_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let notification = &body["data"]["notifications"][0];
    assert_eq!(notification["type"], "new_answer");
    assert!(notification["doubt"].is_null());
    assert!(notification["answer"].is_null());
}

#[tokio::test]
async fn changing_the_password() {
    let app = TestApp::new();
    let (_, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Asha Rao",
                "email": "asha@campus.edu",
                "password": "secret123",
                "role": "student",
                "branch": "CSE",
                "department": "Computer Science",
            })),
        )
        .await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    let change = |current: &str, new: &str| json!({"currentPassword": current, "newPassword": new});

    let (status, body) = app
        .send(Method::PUT, "/api/auth/updatepassword", Some(&token), Some(change("guess", "another1")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, body) = app
        .send(Method::PUT, "/api/auth/updatepassword", Some(&token), Some(change("secret123", "abc")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "newPassword");

    let (status, body) = app
        .send(Method::PUT, "/api/auth/updatepassword", Some(&token), Some(change("secret123", "another1")))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["token"].is_string());

    let login = |password: &str| json!({"email": "asha@campus.edu", "password": password});
    let (status, _) = app
        .send(Method::POST, "/api/auth/login", None, Some(login("secret123")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(Method::POST, "/api/auth/login", None, Some(login("another1")))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn doubt_lists_filter_and_sort() {
    let app = TestApp::new();
    let (_, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, helper_token) = app.seed_user("Ravi", Role::Student).await;
    let hashing = app.post_tagged_doubt(&asker_token, "Hash table resizing", "hashing").await;
    let graphs = app.post_tagged_doubt(&asker_token, "Shortest paths", "graphs, DSA").await;
    app.post_tagged_doubt(&asker_token, "Trie memory", "strings").await;

    app.post_answer(&helper_token, graphs["id"].as_str().unwrap(), "Dijkstra").await;
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/doubts/{}/vote", hashing["id"].as_str().unwrap()),
            Some(&helper_token),
            Some(json!({"voteType": "upvote"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/api/doubts", None, None).await;
    assert_eq!(titles(&body), vec!["Trie memory", "Shortest paths", "Hash table resizing"]);

    let (_, body) = app.send(Method::GET, "/api/doubts?sort=-voteScore", None, None).await;
    assert_eq!(titles(&body)[0], "Hash table resizing");

    let (_, body) = app.send(Method::GET, "/api/doubts?sort=-answerCount", None, None).await;
    assert_eq!(titles(&body)[0], "Shortest paths");

    let (_, body) = app.send(Method::GET, "/api/doubts?sort=createdAt", None, None).await;
    assert_eq!(titles(&body)[0], "Hash table resizing");

    let (_, body) = app.send(Method::GET, "/api/doubts?search=TRIE", None, None).await;
    assert_eq!(titles(&body), vec!["Trie memory"]);

    let (_, body) = app.send(Method::GET, "/api/doubts?tags=hashing,graphs", None, None).await;
    assert_eq!(titles(&body), vec!["Shortest paths", "Hash table resizing"]);

    let (_, body) = app.send(Method::GET, "/api/doubts?limit=2&page=2", None, None).await;
    assert_eq!(titles(&body), vec!["Hash table resizing"]);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["pages"], 2);
}

#[tokio::test]
async fn user_history_lists_doubts_and_answers() {
    let app = TestApp::new();
    let (asker, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (helper, helper_token) = app.seed_user("Ravi", Role::Student).await;
    let tries = app.post_doubt(&asker_token, "Tries").await;
    let heaps = app.post_doubt(&asker_token, "Heaps").await;
    app.post_answer(&helper_token, tries["id"].as_str().unwrap(), "Prefix tree").await;
    app.post_answer(&helper_token, heaps["id"].as_str().unwrap(), "Sift down").await;

    let (status, body) = app
        .send(Method::GET, &format!("/api/users/{}/doubts", asker.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Heaps", "Tries"]);
    assert_eq!(body["data"]["doubts"][0]["author"]["id"], json!(asker.id));

    let (status, body) = app
        .send(Method::GET, &format!("/api/users/{}/answers", helper.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let answers = body["data"]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0]["content"], "Sift down");
    assert_eq!(answers[0]["doubt"]["title"], "Heaps");
    assert_eq!(answers[1]["doubt"]["title"], "Tries");

    let (_, body) = app
        .send(Method::GET, &format!("/api/users/{}/answers", asker.id), None, None)
        .await;
    assert!(body["data"]["answers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn answers_can_be_posted_as_a_form() {
    let app = TestApp::new();
    let (asker, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, helper_token) = app.seed_user("Ravi", Role::Student).await;
    let doubt = app.post_doubt(&asker_token, "Tries").await;
    let doubt_id = doubt["id"].as_str().unwrap();
    let answer = app.post_answer(&asker_token, doubt_id, "Any ideas?").await;

    let boundary = "doubtstack-form";
    let form = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"content\"\r\n\r\n\
         A trie shares prefixes.\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"parentAnswerId\"\r\n\r\n\
         {parent}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"attachments\"; filename=\"sketch.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         not really a png\r\n\
         --{b}--\r\n",
        b = boundary,
        parent = answer["id"].as_str().unwrap(),
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/answers/doubts/{}", doubt_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", helper_token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(form))
        .unwrap();

    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["answer"]["content"], "A trie shares prefixes.");
    assert_eq!(body["data"]["answer"]["parentAnswer"], answer["id"]);

    let (_, body) = app
        .send(Method::GET, "/api/notifications", Some(&asker_token), None)
        .await;
    let notifications = body["data"]["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "new_reply");
    assert_eq!(notifications[0]["recipient"], json!(asker.id));

    let empty = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\n\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/answers/doubts/{}", doubt_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", helper_token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(empty))
        .unwrap();
    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "content");
}

#[tokio::test]
async fn websocket_registers_and_receives_live_notifications() {
    let app = TestApp::new();
    let (asker, asker_token) = app.seed_user("Asha", Role::Student).await;
    let (_, helper_token) = app.seed_user("Ravi", Role::Student).await;
    let doubt = app.post_doubt(&asker_token, "Tries").await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let anonymous = format!("ws://{}/ws", addr).into_client_request().unwrap();
    assert!(tokio_tungstenite::connect_async(anonymous).await.is_err());

    let mut request = format!("ws://{}/ws", addr).into_client_request().unwrap();
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", asker_token).parse().unwrap(),
    );
    let (mut socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    let registered = next_json(&mut socket).await;
    assert_eq!(registered, json!({"type": "registered", "userId": asker.id}));

    app.post_answer(&helper_token, doubt["id"].as_str().unwrap(), "Prefix tree")
        .await;

    let pushed = next_json(&mut socket).await;
    assert_eq!(pushed["type"], "notification");
    assert_eq!(pushed["notification"]["type"], "new_answer");
    assert_eq!(pushed["sender"]["name"], "Ravi");
    assert_eq!(pushed["doubt"]["title"], "Tries");

    socket.send(WsMessage::text(r#"{"type":"ping"}"#)).await.unwrap();
    assert_eq!(next_json(&mut socket).await, json!({"type": "pong"}));
}

async fn next_json<S>(socket: &mut S) -> Value
where
    S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a websocket message")
            .expect("websocket closed")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}
