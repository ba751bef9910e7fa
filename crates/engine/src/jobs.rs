//! Reminder jobs: the queue seam, the mailer seam and the worker that joins
//! them.
//!
//! Scheduling is fire-and-forget: [`TaskQueue::schedule`] returns as soon as
//! the job is stored. [`ReminderWorker`] picks pending jobs up and hands them
//! to a [`Mailer`]. A job is marked delivered only after the mailer succeeds,
//! so delivery is at-least-once.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseConnection, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{CheckinKind, ResultEngine, User, reminder_jobs, users};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReminderJob {
    pub id: Uuid,
    pub kind: CheckinKind,
    pub user_id: i64,
    pub enqueued_at: DateTime<Utc>,
}

impl ReminderJob {
    pub fn new(kind: CheckinKind, user_id: i64, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            user_id,
            enqueued_at,
        }
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Store `job` for later delivery and return immediately.
    async fn schedule(&self, job: ReminderJob) -> ResultEngine<()>;
}

/// Queue backed by the `reminder_jobs` table.
#[derive(Clone, Debug)]
pub struct DbTaskQueue {
    database: DatabaseConnection,
}

impl DbTaskQueue {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl TaskQueue for DbTaskQueue {
    async fn schedule(&self, job: ReminderJob) -> ResultEngine<()> {
        reminder_jobs::ActiveModel {
            id: ActiveValue::Set(job.id.to_string()),
            kind: ActiveValue::Set(job.kind.as_str().to_string()),
            user_id: ActiveValue::Set(job.user_id),
            enqueued_at: ActiveValue::Set(job.enqueued_at),
            attempts: ActiveValue::Set(0),
            last_error: ActiveValue::Set(None),
            delivered_at: ActiveValue::Set(None),
        }
        .insert(&self.database)
        .await?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail service responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("user {0} has no email address")]
    MissingEmail(i64),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn checkin_reminder(&self, kind: CheckinKind, user: &User) -> Result<(), MailError>;
}

/// Mailer that only writes a log line. Used when no mail service is
/// configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn checkin_reminder(&self, kind: CheckinKind, user: &User) -> Result<(), MailError> {
        let email = user
            .email
            .as_deref()
            .ok_or(MailError::MissingEmail(user.id))?;
        tracing::info!(user_id = user.id, email, kind = kind.as_str(), "checkin reminder");
        Ok(())
    }
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    template: String,
    name: &'a str,
}

/// Posts reminders to a transactional mail HTTP API.
#[derive(Clone, Debug)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: &str, token: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            token: token.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn checkin_reminder(&self, kind: CheckinKind, user: &User) -> Result<(), MailError> {
        let to = user
            .email
            .as_deref()
            .ok_or(MailError::MissingEmail(user.id))?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&OutgoingMail {
                from: &self.from,
                to,
                template: format!("{}_checkin_reminder", kind.as_str()),
                name: &user.name,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MailError::Status(response.status()));
        }
        Ok(())
    }
}

/// Shortest accepted poll interval; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls `reminder_jobs` and delivers pending reminders.
pub struct ReminderWorker {
    database: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    poll_interval: Duration,
    batch_size: u64,
    max_attempts: i32,
}

impl ReminderWorker {
    pub fn new(database: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            database,
            mailer,
            poll_interval: Duration::from_secs(30),
            batch_size: 50,
            max_attempts: 5,
        }
    }

    /// Intervals below one second are raised to one second.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Poll forever.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            "reminder worker started"
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            match self.drain_once(Utc::now()).await {
                Ok(0) => {}
                Ok(delivered) => tracing::info!(delivered, "reminders delivered"),
                Err(err) => tracing::error!("reminder worker failed: {err}"),
            }
        }
    }

    /// Deliver one batch of pending jobs; returns how many were delivered.
    pub async fn drain_once(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let pending = reminder_jobs::Entity::find()
            .filter(reminder_jobs::Column::DeliveredAt.is_null())
            .filter(reminder_jobs::Column::Attempts.lt(self.max_attempts))
            .order_by_asc(reminder_jobs::Column::EnqueuedAt)
            .limit(self.batch_size)
            .all(&self.database)
            .await?;

        let mut delivered = 0;
        for job in pending {
            if self.perform(job, now).await? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn perform(&self, job: reminder_jobs::Model, now: DateTime<Utc>) -> ResultEngine<bool> {
        let attempts = job.attempts + 1;
        let mut row = reminder_jobs::ActiveModel {
            id: ActiveValue::Unchanged(job.id.clone()),
            attempts: ActiveValue::Set(attempts),
            ..Default::default()
        };

        let kind = match CheckinKind::try_from(job.kind.as_str()) {
            Ok(kind) => kind,
            Err(err) => {
                tracing::warn!(job_id = %job.id, "dropping reminder job: {err}");
                row.attempts = ActiveValue::Set(self.max_attempts);
                row.last_error = ActiveValue::Set(Some(err.to_string()));
                row.update(&self.database).await?;
                return Ok(false);
            }
        };

        let Some(user) = users::Entity::find_by_id(job.user_id)
            .one(&self.database)
            .await?
        else {
            tracing::warn!(job_id = %job.id, user_id = job.user_id, "reminder for missing user");
            row.attempts = ActiveValue::Set(self.max_attempts);
            row.last_error = ActiveValue::Set(Some("user not found".to_string()));
            row.update(&self.database).await?;
            return Ok(false);
        };

        let user = User::from(user);
        match self.mailer.checkin_reminder(kind, &user).await {
            Ok(()) => {
                row.delivered_at = ActiveValue::Set(Some(now));
                row.last_error = ActiveValue::Set(None);
                row.update(&self.database).await?;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(job_id = %job.id, attempts, "reminder delivery failed: {err}");
                row.last_error = ActiveValue::Set(Some(err.to_string()));
                row.update(&self.database).await?;
                Ok(false)
            }
        }
    }
}
