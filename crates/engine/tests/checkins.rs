use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    Action, CheckinFields, Engine, EngineError, NewUser, Policy, Resource, User,
};
use migration::MigratorTrait;

const VIDEO: &str = "https://youtu.be/dQw4w9WgXcQ";
const OTHER_VIDEO: &str = "https://www.youtube.com/watch?v=9bZkp7q19f0";

struct AllowAll;

impl Policy for AllowAll {
    fn can_access(&self, _: &User, _: Resource, _: Action) -> bool {
        true
    }
}

/// Members may only touch their own startup's checkins.
struct OwnStartup;

impl Policy for OwnStartup {
    fn can_access(&self, actor: &User, resource: Resource, _: Action) -> bool {
        match resource {
            Resource::Startup(id) | Resource::Checkin { startup_id: id, .. } => {
                actor.startup_id == Some(id)
            }
            Resource::User(id) => actor.id == id,
        }
    }
}

/// Local time in July 2024; the 1st is a Monday.
fn local(day: u32, hour: u32) -> DateTime<Utc> {
    Los_Angeles
        .with_ymd_and_hms(2024, 7, day, hour, 0, 0)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

async fn engine_with_db(policy: Arc<dyn Policy>) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .policy(policy)
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn founder(engine: &Engine, email: &str) -> User {
    let startup = engine
        .create_startup("Acme", true, local(1, 9))
        .await
        .unwrap();
    engine
        .create_user(
            NewUser {
                name: "Founder".to_string(),
                email: Some(email.to_string()),
                password: "secret".to_string(),
                startup_id: Some(startup.id),
                ..Default::default()
            },
            local(1, 9),
        )
        .await
        .unwrap()
}

fn before_fields() -> CheckinFields {
    CheckinFields {
        start_focus: Some("Ship the beta".to_string()),
        start_video_url: Some(VIDEO.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn before_window_requires_focus_and_video() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;
    let startup_id = user.startup_id.unwrap();

    let err = engine
        .create_checkin(&user, startup_id, CheckinFields::default(), local(2, 18))
        .await
        .unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.get("start_focus"), Some(&["can't be blank".to_string()][..]));
    assert!(errors.contains("start_video_url"));

    // Outside every window the same empty checkin is fine.
    let checkin = engine
        .create_checkin(&user, startup_id, CheckinFields::default(), local(4, 12))
        .await
        .unwrap();
    assert!(!checkin.submitted());
}

#[tokio::test]
async fn submitted_at_is_set_once() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;

    let created = engine
        .create_checkin(&user, user.startup_id.unwrap(), before_fields(), local(2, 18))
        .await
        .unwrap();
    assert_eq!(created.submitted_at, Some(local(2, 18)));
    assert_eq!(created.user_id, Some(user.id));

    let updated = engine
        .update_checkin(
            &user,
            created.id.unwrap(),
            CheckinFields {
                start_why: Some("Users asked for it".to_string()),
                ..Default::default()
            },
            local(3, 10),
        )
        .await
        .unwrap();
    assert_eq!(updated.submitted_at, Some(local(2, 18)));
    assert_eq!(updated.updated_at, local(3, 10));
    assert_eq!(updated.fields.start_why.as_deref(), Some("Users asked for it"));
}

#[tokio::test]
async fn completion_creates_exactly_one_notification() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;

    let checkin = engine
        .create_checkin(&user, user.startup_id.unwrap(), before_fields(), local(4, 12))
        .await
        .unwrap();
    let id = checkin.id.unwrap();
    assert!(engine.notifications(user.id).await.unwrap().is_empty());

    let completed = engine
        .update_checkin(
            &user,
            id,
            CheckinFields {
                end_video_url: Some(OTHER_VIDEO.to_string()),
                ..Default::default()
            },
            local(8, 18),
        )
        .await
        .unwrap();
    assert_eq!(completed.completed_at, Some(local(8, 18)));

    engine
        .update_checkin(
            &user,
            id,
            CheckinFields {
                end_comments: Some("Great week".to_string()),
                ..Default::default()
            },
            local(8, 19),
        )
        .await
        .unwrap();

    let notifications = engine.notifications(user.id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].action, engine::notifications::NEW_CHECKIN);
    assert_eq!(notifications[0].attachable_id, id);
    assert_eq!(
        engine.checkin(&user, id).await.unwrap().completed_at,
        Some(local(8, 18))
    );
}

#[tokio::test]
async fn failed_save_keeps_the_stored_checkin() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;
    let checkin = engine
        .create_checkin(&user, user.startup_id.unwrap(), before_fields(), local(4, 12))
        .await
        .unwrap();
    let id = checkin.id.unwrap();

    // Clearing the video inside the before window is rejected.
    let err = engine
        .update_checkin(
            &user,
            id,
            CheckinFields {
                start_video_url: Some(String::new()),
                ..Default::default()
            },
            local(9, 18),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let stored = engine.checkin(&user, id).await.unwrap();
    assert_eq!(stored.fields.start_video_url.as_deref(), Some(VIDEO));
}

#[tokio::test]
async fn malformed_video_url_is_rejected() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;

    let err = engine
        .create_checkin(
            &user,
            user.startup_id.unwrap(),
            CheckinFields {
                end_video_url: Some("https://vimeo.com/123".to_string()),
                ..Default::default()
            },
            local(4, 12),
        )
        .await
        .unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(
        errors.get("end_video_url"),
        Some(&["invalid Youtube URL".to_string()][..])
    );
}

#[tokio::test]
async fn current_checkins_keep_the_latest_per_startup() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let ada = founder(&engine, "ada@example.com").await;
    let bob = founder(&engine, "bob@example.com").await;
    let acme = ada.startup_id.unwrap();
    let other = bob.startup_id.unwrap();

    // Previous cycle: ignored.
    engine
        .create_checkin(&bob, other, before_fields(), local(1, 10))
        .await
        .unwrap();
    let first = engine
        .create_checkin(&ada, acme, before_fields(), local(2, 18))
        .await
        .unwrap();
    let second = engine
        .create_checkin(&ada, acme, before_fields(), local(3, 10))
        .await
        .unwrap();

    let current = engine
        .current_checkins_for_startups(&[acme, other], local(4, 12))
        .await
        .unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[&acme].id, second.id);
    assert_ne!(current[&acme].id, first.id);

    // Once the after window opens a new cycle starts.
    let current = engine
        .current_checkins_for_startups(&[acme, other], local(8, 18))
        .await
        .unwrap();
    assert!(current.is_empty());

    let none = engine
        .current_checkins_for_startups(&[], local(4, 12))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn video_url_taken_skips_the_excluded_checkin() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;
    let checkin = engine
        .create_checkin(&user, user.startup_id.unwrap(), before_fields(), local(4, 12))
        .await
        .unwrap();

    assert!(engine.video_url_taken(VIDEO, None).await.unwrap());
    assert!(!engine.video_url_taken(VIDEO, checkin.id).await.unwrap());
    assert!(!engine.video_url_taken(OTHER_VIDEO, None).await.unwrap());
}

#[tokio::test]
async fn comments_refresh_the_cached_count() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;
    let checkin = engine
        .create_checkin(&user, user.startup_id.unwrap(), before_fields(), local(4, 12))
        .await
        .unwrap();
    let id = checkin.id.unwrap();

    engine
        .add_comment(&user, id, "Nice progress", local(4, 13))
        .await
        .unwrap();
    engine
        .add_comment(&user, id, "Keep going", local(4, 14))
        .await
        .unwrap();
    assert_eq!(engine.checkin(&user, id).await.unwrap().comment_count, 2);

    let err = engine
        .add_comment(&user, id, "   ", local(4, 15))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Counting ignores checkin validation, even inside a window.
    assert_eq!(engine.refresh_comment_count(id).await.unwrap(), 2);
}

#[tokio::test]
async fn checkins_for_startup_filters_completed() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;
    let startup_id = user.startup_id.unwrap();

    let open = engine
        .create_checkin(&user, startup_id, before_fields(), local(4, 12))
        .await
        .unwrap();
    let done = engine
        .create_checkin(
            &user,
            startup_id,
            CheckinFields {
                end_video_url: Some(OTHER_VIDEO.to_string()),
                ..before_fields()
            },
            local(5, 12),
        )
        .await
        .unwrap();

    let all = engine
        .checkins_for_startup(&user, startup_id, false)
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![done.id, open.id]
    );
    let completed = engine
        .checkins_for_startup(&user, startup_id, true)
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].time_label(engine.clock()), "Jul 2-Jul 8");
}

#[tokio::test]
async fn policy_refusal_is_forbidden() {
    let (engine, _db) = engine_with_db(Arc::new(OwnStartup)).await;
    let ada = founder(&engine, "ada@example.com").await;
    let bob = founder(&engine, "bob@example.com").await;

    let err = engine
        .create_checkin(&bob, ada.startup_id.unwrap(), before_fields(), local(4, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let checkin = engine
        .create_checkin(&ada, ada.startup_id.unwrap(), before_fields(), local(4, 12))
        .await
        .unwrap();
    let err = engine
        .checkin(&bob, checkin.id.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn missing_startup_is_not_found() {
    let (engine, _db) = engine_with_db(Arc::new(AllowAll)).await;
    let user = founder(&engine, "ada@example.com").await;

    let err = engine
        .create_checkin(&user, 999, before_fields(), local(4, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}
