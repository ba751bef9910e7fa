use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    Statement,
};

use engine::{
    Action, CheckinKind, EmailPreference, Engine, MailError, Mailer, NewUser, Policy,
    ReminderJob, ReminderWorker, Resource, ResultEngine, TaskQueue, User, reminder_jobs,
    responses,
};
use migration::MigratorTrait;

struct AllowAll;

impl Policy for AllowAll {
    fn can_access(&self, _: &User, _: Resource, _: Action) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingQueue {
    jobs: Mutex<Vec<ReminderJob>>,
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn schedule(&self, job: ReminderJob) -> ResultEngine<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(CheckinKind, i64)>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn checkin_reminder(&self, kind: CheckinKind, user: &User) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::MissingEmail(user.id));
        }
        self.sent.lock().unwrap().push((kind, user.id));
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 2, 17, 0, 0).unwrap()
}

async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn engine(db: &DatabaseConnection, queue: Option<Arc<RecordingQueue>>) -> Engine {
    let mut builder = Engine::builder()
        .database(db.clone())
        .policy(Arc::new(AllowAll));
    if let Some(queue) = queue {
        builder = builder.queue(queue);
    }
    builder.build().await.unwrap()
}

async fn member(
    engine: &Engine,
    email: Option<&str>,
    startup_id: i64,
    wants_reminders: bool,
) -> User {
    let email_on = if wants_reminders {
        [EmailPreference::DoCheckin].into_iter().collect()
    } else {
        [EmailPreference::Comment].into_iter().collect()
    };
    engine
        .create_user(
            NewUser {
                name: "Member".to_string(),
                email: email.map(ToString::to_string),
                password: "secret".to_string(),
                startup_id: Some(startup_id),
                email_on,
                ..Default::default()
            },
            now(),
        )
        .await
        .unwrap()
}

/// One reachable member plus every kind of user that must be skipped.
async fn seed(engine: &Engine) -> User {
    let onboarded = engine.create_startup("Acme", true, now()).await.unwrap();
    let pending = engine.create_startup("Later", false, now()).await.unwrap();

    let reachable = member(engine, Some("ada@example.com"), onboarded.id, true).await;
    member(engine, Some("bob@example.com"), onboarded.id, false).await;
    member(engine, None, onboarded.id, true).await;
    member(engine, Some("eve@example.com"), pending.id, true).await;
    reachable
}

#[tokio::test]
async fn reminders_go_to_reachable_members_of_onboarded_startups() {
    let db = database().await;
    let queue = Arc::new(RecordingQueue::default());
    let engine = engine(&db, Some(queue.clone())).await;
    let ada = seed(&engine).await;

    let scheduled = engine
        .send_checkin_reminders(CheckinKind::Before, now())
        .await
        .unwrap();
    assert_eq!(scheduled, 1);

    let jobs = queue.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].kind, CheckinKind::Before);
    assert_eq!(jobs[0].user_id, ada.id);
}

#[tokio::test]
async fn no_onboarded_startups_means_no_reminders() {
    let db = database().await;
    let engine = engine(&db, None).await;
    let pending = engine.create_startup("Later", false, now()).await.unwrap();
    member(&engine, Some("eve@example.com"), pending.id, true).await;

    let scheduled = engine
        .send_checkin_reminders(CheckinKind::After, now())
        .await
        .unwrap();
    assert_eq!(scheduled, 0);
}

#[tokio::test]
async fn worker_delivers_queued_reminders_once() {
    let db = database().await;
    let engine = engine(&db, None).await;
    let ada = seed(&engine).await;

    engine
        .send_checkin_reminders(CheckinKind::After, now())
        .await
        .unwrap();
    let rows = reminder_jobs::Entity::find().all(&db).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "after");
    assert!(rows[0].delivered_at.is_none());

    let mailer = Arc::new(RecordingMailer::default());
    let worker = ReminderWorker::new(db.clone(), mailer.clone());
    assert_eq!(worker.drain_once(now()).await.unwrap(), 1);
    assert_eq!(worker.drain_once(now()).await.unwrap(), 0);

    assert_eq!(
        *mailer.sent.lock().unwrap(),
        vec![(CheckinKind::After, ada.id)]
    );
    let row = reminder_jobs::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.delivered_at, Some(now()));
    assert_eq!(row.attempts, 1);
}

#[tokio::test]
async fn failed_deliveries_are_retried_up_to_the_limit() {
    let db = database().await;
    let engine = engine(&db, None).await;
    seed(&engine).await;
    engine
        .send_checkin_reminders(CheckinKind::Before, now())
        .await
        .unwrap();

    let mailer = Arc::new(RecordingMailer {
        fail: true,
        ..Default::default()
    });
    let worker = ReminderWorker::new(db.clone(), mailer).max_attempts(2);
    assert_eq!(worker.drain_once(now()).await.unwrap(), 0);
    assert_eq!(worker.drain_once(now()).await.unwrap(), 0);

    let row = reminder_jobs::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(row.attempts, 2);
    assert!(row.delivered_at.is_none());
    assert!(row.last_error.is_some());

    // Exhausted jobs are no longer picked up, even by a working mailer.
    let worker = ReminderWorker::new(db.clone(), Arc::new(RecordingMailer::default()))
        .max_attempts(2);
    assert_eq!(worker.drain_once(now()).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_job_kind_is_dropped() {
    let db = database().await;
    let engine = engine(&db, None).await;
    let ada = seed(&engine).await;

    reminder_jobs::ActiveModel {
        id: ActiveValue::Set("manual".to_string()),
        kind: ActiveValue::Set("sideways".to_string()),
        user_id: ActiveValue::Set(ada.id),
        enqueued_at: ActiveValue::Set(now()),
        attempts: ActiveValue::Set(0),
        last_error: ActiveValue::Set(None),
        delivered_at: ActiveValue::Set(None),
    }
    .insert(&db)
    .await
    .unwrap();

    let mailer = Arc::new(RecordingMailer::default());
    let worker = ReminderWorker::new(db.clone(), mailer.clone()).max_attempts(3);
    assert_eq!(worker.drain_once(now()).await.unwrap(), 0);
    assert!(mailer.sent.lock().unwrap().is_empty());

    let row = reminder_jobs::Entity::find_by_id("manual".to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.attempts, 3);
}

#[tokio::test]
async fn responses_default_amount_paid_to_zero() {
    let db = database().await;
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO responses (data, request_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        vec![
            "{}".into(),
            7i64.into(),
            now().into(),
            now().into(),
        ],
    ))
    .await
    .unwrap();

    let response = responses::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(response.amount_paid, 0);
    assert_eq!(response.request_id, Some(7));
    assert!(response.accepted_at.is_none());
}
