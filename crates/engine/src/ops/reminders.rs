use chrono::{DateTime, Utc};
use sea_orm::{QueryFilter, QueryOrder, prelude::*};

use crate::{CheckinKind, EmailPreference, ReminderJob, ResultEngine, User, startups, users};

use super::Engine;

impl Engine {
    /// Queue one `kind` reminder for every user of an onboarded startup who
    /// has an email address and wants checkin emails. Returns how many were
    /// queued.
    pub async fn send_checkin_reminders(
        &self,
        kind: CheckinKind,
        now: DateTime<Utc>,
    ) -> ResultEngine<usize> {
        let onboarded: Vec<i64> = startups::Entity::find()
            .filter(startups::Column::Onboarded.eq(true))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|startup| startup.id)
            .collect();
        if onboarded.is_empty() {
            return Ok(0);
        }

        let recipients: Vec<User> = users::Entity::find()
            .filter(users::Column::Email.is_not_null())
            .filter(users::Column::StartupId.is_in(onboarded))
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(User::from)
            .filter(|user| user.has_email() && user.email_for(EmailPreference::DoCheckin))
            .collect();

        for user in &recipients {
            self.queue
                .schedule(ReminderJob::new(kind, user.id, now))
                .await?;
        }
        tracing::info!(
            kind = kind.as_str(),
            scheduled = recipients.len(),
            "checkin reminders queued"
        );
        Ok(recipients.len())
    }
}
