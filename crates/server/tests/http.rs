use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{
    ChatCredentials, ChatError, ChatProvisioner, Engine, NewUser, Role, Roles, User,
};
use migration::MigratorTrait;
use server::{ServerState, StandardPolicy, app};

const PASSWORD: &str = "secret";
const VIDEO: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const OTHER_VIDEO: &str = "https://youtu.be/9bZkp7q19f0";

struct FakeChat {
    fail_reset: bool,
}

#[async_trait]
impl ChatProvisioner for FakeChat {
    async fn provision(&self, user: &User) -> Result<ChatCredentials, ChatError> {
        Ok(ChatCredentials {
            username: format!("user{}", user.id),
            password: "chat-pw".to_string(),
        })
    }

    async fn reset(&self, user: &User) -> Result<ChatCredentials, ChatError> {
        if self.fail_reset {
            return Err(ChatError::MissingEmail);
        }
        self.provision(user).await
    }
}

struct TestApp {
    router: Router,
    engine: Arc<Engine>,
}

impl TestApp {
    async fn new(chat: Option<FakeChat>) -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let mut builder = Engine::builder()
            .database(db)
            .policy(Arc::new(StandardPolicy));
        if let Some(chat) = chat {
            builder = builder.chat(Arc::new(chat));
        }
        let engine = Arc::new(builder.build().await.unwrap());
        let router = app(ServerState {
            engine: engine.clone(),
        });
        Self { router, engine }
    }

    async fn founder(&self, name: &str, startup_id: Option<i64>) -> User {
        self.engine
            .create_user(
                NewUser {
                    name: name.to_string(),
                    email: Some(format!("{}@example.com", name.to_lowercase())),
                    password: PASSWORD.to_string(),
                    startup_id,
                    roles: [Role::Entrepreneur].into_iter().collect::<Roles>(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    async fn startup(&self, name: &str) -> i64 {
        self.engine
            .create_startup(name, true, Utc::now())
            .await
            .unwrap()
            .id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            let email = user.email.clone().unwrap_or_default();
            let token = STANDARD.encode(format!("{email}:{PASSWORD}"));
            request = request.header(header::AUTHORIZATION, format!("Basic {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, location, body)
    }

    async fn get(&self, uri: &str, user: &User) -> (StatusCode, Option<String>, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }

    async fn post(&self, uri: &str, user: &User, body: Value) -> (StatusCode, Option<String>, Value) {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }
}

#[tokio::test]
async fn requests_without_credentials_are_unauthorized() {
    let app = TestApp::new(None).await;
    let (status, _, _) = app.send(Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;
    let token = STANDARD.encode("ada@example.com:nope");
    let request = Request::builder()
        .uri("/users/me")
        .header(header::AUTHORIZATION, format!("Basic {token}"))
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(ada.name, "Ada");
}

#[tokio::test]
async fn users_index_redirects_home() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;
    let (status, location, _) = app.get("/users", &ada).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
}

#[tokio::test]
async fn own_profile_and_unknown_ids() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;

    let (status, _, body) = app.get("/users/me", &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["current_invite"], Value::Null);

    let (status, _, _) = app.get("/users/nobody", &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = app.get("/users/999", &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_type_accepts_self_assignable_roles_only() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;

    let (status, _, body) = app
        .post("/users/me/account_type", &ada, json!({ "roles": "admin" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["form"], "account_type");
    assert!(body["errors"]["roles"].is_array());

    let (status, location, _) = app
        .post(
            "/users/me/account_type",
            &ada,
            json!({ "reset": true, "roles": "mentor" }),
        )
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));

    let (_, _, body) = app.get("/users/me/account_type", &ada).await;
    assert_eq!(body["roles"], json!(["entrepreneur", "mentor"]));
}

#[tokio::test]
async fn profile_update_redirects_with_notice() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;

    let (status, location, body) = app
        .post(
            "/users/me",
            &ada,
            json!({ "location": "Torino", "email_on": ["docheckin"] }),
        )
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location, Some(format!("/users/{}", ada.id)));
    assert_eq!(body["flash"]["notice"], "Your account has been updated!");

    let (_, _, body) = app.get("/users/me/edit", &ada).await;
    assert_eq!(body["user"]["location"], "Torino");
    assert_eq!(body["user"]["email_on"], json!(["docheckin"]));
    assert_eq!(body["profile_completeness_percent"], 43);
}

#[tokio::test]
async fn invalid_profile_renders_the_submitting_form() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;

    let (status, _, body) = app
        .post(
            "/users/me",
            &ada,
            json!({ "email": "not an email", "complete_account": true }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["form"], "complete_account");
    assert!(body["errors"]["email"].is_array());

    let (_, _, body) = app.post("/users/me", &ada, json!({ "name": " " })).await;
    assert_eq!(body["form"], "edit");
}

#[tokio::test]
async fn editing_someone_else_is_forbidden() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;
    let bob = app.founder("Bob", None).await;

    let (status, _, _) = app.get(&format!("/users/{}/edit", bob.id), &ada).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = app
        .post(&format!("/users/{}", bob.id), &ada, json!({ "name": "Mallory" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = app.get(&format!("/users/{}", bob.id), &ada).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn chat_account_is_provisioned_and_reset() {
    let app = TestApp::new(Some(FakeChat { fail_reset: false })).await;
    let ada = app.founder("Ada", None).await;

    let (status, _, body) = app.get("/users/me/chat", &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], format!("user{}", ada.id));

    let (status, location, body) = app.post("/users/me/chat/reset", &ada, json!({})).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/users/me/chat"));
    assert_eq!(
        body["flash"]["notice"],
        "Your chat account has been reset, please try logging in again."
    );
}

#[tokio::test]
async fn failed_chat_reset_redirects_with_alert() {
    let app = TestApp::new(Some(FakeChat { fail_reset: true })).await;
    let ada = app.founder("Ada", None).await;

    let (status, location, body) = app.post("/users/me/chat/reset", &ada, json!({})).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/users/me/chat"));
    assert_eq!(
        body["flash"]["alert"],
        "Sorry but your chat account could not be reset. Please contact support@nreduce.com"
    );
}

#[tokio::test]
async fn chat_without_provisioner_is_unavailable() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;
    let (status, _, _) = app.get("/users/me/chat", &ada).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn welcome_completes_setup() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;

    let (_, _, body) = app.get("/users/me/welcome", &ada).await;
    assert_eq!(body["setup_complete"], false);

    let (status, location, _) = app.post("/users/me/welcome", &ada, json!({})).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));

    let (_, _, body) = app.get("/users/me/welcome", &ada).await;
    assert_eq!(body["setup_complete"], true);
}

#[tokio::test]
async fn completed_checkin_shows_up_as_current_and_notifies() {
    let app = TestApp::new(None).await;
    let startup_id = app.startup("Acme").await;
    let ada = app.founder("Ada", Some(startup_id)).await;

    let (status, _, checkin) = app
        .post(
            "/checkins",
            &ada,
            json!({
                "startup_id": startup_id,
                "start_focus": "ship the beta",
                "start_video_url": VIDEO,
                "end_video_url": OTHER_VIDEO,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(checkin["submitted"], true);
    assert_eq!(checkin["completed"], true);
    assert_eq!(checkin["user_id"], ada.id);

    let (status, _, body) = app
        .get(&format!("/checkins/current?startup_ids={startup_id},{}", startup_id + 1), &ada)
        .await;
    assert_eq!(status, StatusCode::OK);
    let current = body["checkins"].as_object().unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[&startup_id.to_string()]["id"], checkin["id"]);

    let (_, _, notifications) = app.get("/users/me/notifications", &ada).await;
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["action"], "new_checkin");
    assert_eq!(notifications[0]["attachable_id"], checkin["id"]);
}

#[tokio::test]
async fn bad_video_renders_the_checkin_form() {
    let app = TestApp::new(None).await;
    let startup_id = app.startup("Acme").await;
    let ada = app.founder("Ada", Some(startup_id)).await;

    let (status, _, body) = app
        .post(
            "/checkins",
            &ada,
            json!({
                "startup_id": startup_id,
                "start_focus": "ship the beta",
                "start_video_url": "https://vimeo.com/123",
                "end_video_url": OTHER_VIDEO,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["form"], "checkin");
    assert_eq!(body["errors"]["start_video_url"], json!(["invalid Youtube URL"]));
}

#[tokio::test]
async fn checkins_of_other_startups_are_read_only() {
    let app = TestApp::new(None).await;
    let acme = app.startup("Acme").await;
    let globex = app.startup("Globex").await;
    let ada = app.founder("Ada", Some(acme)).await;
    let bob = app.founder("Bob", Some(globex)).await;

    let (status, _, _) = app
        .post("/checkins", &ada, json!({ "startup_id": globex }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, _, checkin) = app
        .post(
            "/checkins",
            &bob,
            json!({
                "startup_id": globex,
                "start_focus": "hire",
                "start_video_url": VIDEO,
                "end_video_url": OTHER_VIDEO,
            }),
        )
        .await;
    let id = checkin["id"].as_i64().unwrap();

    let (status, _, _) = app.get(&format!("/checkins/{id}"), &ada).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = app
        .post(&format!("/checkins/{id}"), &ada, json!({ "start_why": "because" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .post(&format!("/checkins/{id}/comments"), &ada, json!({ "content": " " }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["form"], "comment");

    let (status, _, comment) = app
        .post(&format!("/checkins/{id}/comments"), &ada, json!({ "content": "nice" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["user_id"], ada.id);

    let (_, _, list) = app
        .get(&format!("/startups/{globex}/checkins?completed=true"), &ada)
        .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["comment_count"], 1);
}

#[tokio::test]
async fn current_checkins_reject_malformed_ids() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;
    let (status, _, _) = app.get("/checkins/current?startup_ids=1,abc", &ada).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn next_checkin_reports_the_schedule() {
    let app = TestApp::new(None).await;
    let ada = app.founder("Ada", None).await;
    let (status, _, body) = app.get("/checkins/next", &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert!(matches!(body["kind"].as_str(), Some("before" | "after")));
    assert!(body["week"].as_str().is_some_and(|week| week.contains('-')));
}
