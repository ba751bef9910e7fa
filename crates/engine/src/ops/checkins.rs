use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    Action, Checkin, CheckinFields, EngineError, FieldErrors, Resource, ResultEngine, User,
    checkins, comments, notifications, startups,
};

use super::{Engine, with_tx};

impl Engine {
    pub async fn checkin(&self, actor: &User, id: i64) -> ResultEngine<Checkin> {
        let checkin = self.find_checkin(id).await?;
        self.authorize(
            actor,
            Resource::Checkin {
                id,
                startup_id: checkin.startup_id,
            },
            Action::Read,
        )?;
        Ok(checkin)
    }

    pub async fn create_checkin(
        &self,
        actor: &User,
        startup_id: i64,
        fields: CheckinFields,
        now: DateTime<Utc>,
    ) -> ResultEngine<Checkin> {
        self.authorize(actor, Resource::Startup(startup_id), Action::Create)?;
        startups::Entity::find_by_id(startup_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("startup {startup_id}")))?;

        let mut checkin = Checkin::new(startup_id, Some(actor.id), now);
        checkin.apply(fields);
        self.save_checkin(actor, checkin, now).await
    }

    pub async fn update_checkin(
        &self,
        actor: &User,
        id: i64,
        fields: CheckinFields,
        now: DateTime<Utc>,
    ) -> ResultEngine<Checkin> {
        let mut checkin = self.find_checkin(id).await?;
        self.authorize(
            actor,
            Resource::Checkin {
                id,
                startup_id: checkin.startup_id,
            },
            Action::Update,
        )?;
        checkin.apply(fields);
        self.save_checkin(actor, checkin, now).await
    }

    /// Validate, stamp and persist a checkin. The `new_checkin` notification
    /// is written in the same transaction, only on the save that completes it.
    async fn save_checkin(
        &self,
        actor: &User,
        mut checkin: Checkin,
        now: DateTime<Utc>,
    ) -> ResultEngine<Checkin> {
        checkin
            .validate(&self.clock, self.videos.as_ref(), now)
            .into_result()?;
        let stamped = checkin.stamp(now);
        let model = checkin.to_active_model();

        with_tx!(self, |db_tx| {
            let saved = match checkin.id {
                Some(_) => model.update(&db_tx).await?,
                None => model.insert(&db_tx).await?,
            };
            if stamped.completed {
                let recipient = saved.user_id.unwrap_or(actor.id);
                notifications::new_checkin(recipient, saved.id, now)
                    .insert(&db_tx)
                    .await?;
                tracing::info!(checkin_id = saved.id, "checkin completed");
            }
            Ok(Checkin::from(saved))
        })
    }

    /// The current checkin of each startup: the most recent one created since
    /// the current cycle opened. Startups without one are left out.
    pub async fn current_checkins_for_startups(
        &self,
        startup_ids: &[i64],
        now: DateTime<Utc>,
    ) -> ResultEngine<HashMap<i64, Checkin>> {
        if startup_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let since = self.clock.cycle_start(now);
        let rows = checkins::Entity::find()
            .filter(checkins::Column::StartupId.is_in(startup_ids.iter().copied()))
            .filter(checkins::Column::CreatedAt.gt(since))
            .order_by_asc(checkins::Column::CreatedAt)
            .order_by_asc(checkins::Column::Id)
            .all(&self.database)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.startup_id, Checkin::from(row)))
            .collect())
    }

    /// Checkins of a startup, newest first.
    pub async fn checkins_for_startup(
        &self,
        actor: &User,
        startup_id: i64,
        completed_only: bool,
    ) -> ResultEngine<Vec<Checkin>> {
        self.authorize(actor, Resource::Startup(startup_id), Action::Read)?;
        let mut query = checkins::Entity::find()
            .filter(checkins::Column::StartupId.eq(startup_id));
        if completed_only {
            query = query.filter(checkins::Column::CompletedAt.is_not_null());
        }
        let rows = query
            .order_by_desc(checkins::Column::CreatedAt)
            .order_by_desc(checkins::Column::Id)
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(Checkin::from).collect())
    }

    /// True if a checkin other than `exclude_id` already uses `url` as one of
    /// its videos.
    pub async fn video_url_taken(&self, url: &str, exclude_id: Option<i64>) -> ResultEngine<bool> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(false);
        }
        let mut query = checkins::Entity::find().filter(
            Condition::any()
                .add(checkins::Column::StartVideoUrl.eq(url))
                .add(checkins::Column::EndVideoUrl.eq(url)),
        );
        if let Some(id) = exclude_id {
            query = query.filter(checkins::Column::Id.ne(id));
        }
        Ok(query.count(&self.database).await? > 0)
    }

    pub async fn add_comment(
        &self,
        actor: &User,
        checkin_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<comments::Model> {
        let checkin = self.find_checkin(checkin_id).await?;
        self.authorize(
            actor,
            Resource::Checkin {
                id: checkin_id,
                startup_id: checkin.startup_id,
            },
            Action::Comment,
        )?;

        let content = content.trim();
        if content.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("content", "can't be blank");
            return Err(EngineError::Validation(errors));
        }

        let comment = comments::ActiveModel {
            id: ActiveValue::NotSet,
            checkin_id: ActiveValue::Set(checkin_id),
            user_id: ActiveValue::Set(actor.id),
            content: ActiveValue::Set(content.to_string()),
            created_at: ActiveValue::Set(now),
        }
        .insert(&self.database)
        .await?;

        if let Err(err) = self.refresh_comment_count(checkin_id).await {
            tracing::warn!(checkin_id, "could not refresh comment count: {err}");
        }
        Ok(comment)
    }

    /// Recount comments and store the cached count. Skips validation so it
    /// works inside a checkin window.
    pub async fn refresh_comment_count(&self, checkin_id: i64) -> ResultEngine<i32> {
        let count = comments::Entity::find()
            .filter(comments::Column::CheckinId.eq(checkin_id))
            .count(&self.database)
            .await?;
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        checkins::ActiveModel {
            id: ActiveValue::Unchanged(checkin_id),
            comment_count: ActiveValue::Set(count),
            ..Default::default()
        }
        .update(&self.database)
        .await?;
        Ok(count)
    }

    async fn find_checkin(&self, id: i64) -> ResultEngine<Checkin> {
        checkins::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .map(Checkin::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("checkin {id}")))
    }
}
