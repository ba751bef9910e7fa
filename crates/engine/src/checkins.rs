//! Weekly checkins.
//!
//! A checkin has a "before" part (focus and video, due in the before window)
//! and an "after" part (the end-of-week video, due in the after window).
//! Which fields are required depends on the window open at save time, so
//! validation always takes the current instant.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{CheckinClock, FieldErrors, VideoUrlValidator, users::is_blank, users::normalize};

const BLANK: &str = "can't be blank";
const BAD_VIDEO: &str = "invalid Youtube URL";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "checkins")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub startup_id: i64,
    pub user_id: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub start_focus: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub start_why: Option<String>,
    pub start_video_url: Option<String>,
    pub end_video_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub start_comments: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub end_comments: Option<String>,
    pub comment_count: i32,
    pub submitted_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::startups::Entity",
        from = "Column::StartupId",
        to = "super::startups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Startups,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::startups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Startups.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The user-editable part of a checkin.
///
/// On update, `None` leaves the stored value alone and a blank string clears
/// it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinFields {
    pub start_focus: Option<String>,
    pub start_why: Option<String>,
    pub start_video_url: Option<String>,
    pub end_video_url: Option<String>,
    pub start_comments: Option<String>,
    pub end_comments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkin {
    /// `None` until the checkin is first persisted.
    pub id: Option<i64>,
    pub startup_id: i64,
    pub user_id: Option<i64>,
    pub fields: CheckinFields,
    pub comment_count: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What changed when a checkin was stamped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stamped {
    pub submitted: bool,
    pub completed: bool,
}

impl Checkin {
    pub fn new(startup_id: i64, user_id: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            startup_id,
            user_id,
            fields: CheckinFields::default(),
            comment_count: 0,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, fields: CheckinFields) {
        let current = &mut self.fields;
        for (slot, value) in [
            (&mut current.start_focus, fields.start_focus),
            (&mut current.start_why, fields.start_why),
            (&mut current.start_video_url, fields.start_video_url),
            (&mut current.end_video_url, fields.end_video_url),
            (&mut current.start_comments, fields.start_comments),
            (&mut current.end_comments, fields.end_comments),
        ] {
            if value.is_some() {
                *slot = normalize(value);
            }
        }
    }

    pub fn submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// The "before" part has both a focus and a video.
    pub fn before_completed(&self) -> bool {
        !is_blank(self.fields.start_focus.as_deref())
            && !is_blank(self.fields.start_video_url.as_deref())
    }

    /// The "after" part has its video.
    pub fn after_completed(&self) -> bool {
        !is_blank(self.fields.end_video_url.as_deref())
    }

    pub fn time_label(&self, clock: &CheckinClock) -> String {
        clock.week_for_time(self.created_at)
    }

    /// Validate against the windows open at `now`.
    pub fn validate(
        &self,
        clock: &CheckinClock,
        videos: &dyn VideoUrlValidator,
        now: DateTime<Utc>,
    ) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let fields = &self.fields;

        if clock.in_before_window(now) {
            if is_blank(fields.start_focus.as_deref()) {
                errors.add("start_focus", BLANK);
            }
            if is_blank(fields.start_video_url.as_deref()) {
                errors.add("start_video_url", BLANK);
            }
        }
        if clock.in_after_window(now) && is_blank(fields.end_video_url.as_deref()) {
            errors.add("end_video_url", BLANK);
        }

        for (field, value) in [
            ("start_video_url", &fields.start_video_url),
            ("end_video_url", &fields.end_video_url),
        ] {
            if let Some(url) = value.as_deref()
                && !url.trim().is_empty()
                && !videos.is_valid(url)
            {
                errors.add(field, BAD_VIDEO);
            }
        }

        errors
    }

    /// Record the first submission and completion times. Only call after a
    /// successful validation.
    pub fn stamp(&mut self, now: DateTime<Utc>) -> Stamped {
        let mut stamped = Stamped::default();
        if !self.submitted() && self.before_completed() {
            self.submitted_at = Some(now);
            stamped.submitted = true;
        }
        if !self.completed() && self.after_completed() {
            self.completed_at = Some(now);
            stamped.completed = true;
        }
        self.updated_at = now;
        stamped
    }

    pub(crate) fn to_active_model(&self) -> ActiveModel {
        let fields = &self.fields;
        ActiveModel {
            id: match self.id {
                Some(id) => ActiveValue::Unchanged(id),
                None => ActiveValue::NotSet,
            },
            startup_id: ActiveValue::Set(self.startup_id),
            user_id: ActiveValue::Set(self.user_id),
            start_focus: ActiveValue::Set(fields.start_focus.clone()),
            start_why: ActiveValue::Set(fields.start_why.clone()),
            start_video_url: ActiveValue::Set(fields.start_video_url.clone()),
            end_video_url: ActiveValue::Set(fields.end_video_url.clone()),
            start_comments: ActiveValue::Set(fields.start_comments.clone()),
            end_comments: ActiveValue::Set(fields.end_comments.clone()),
            comment_count: ActiveValue::Set(self.comment_count),
            submitted_at: ActiveValue::Set(self.submitted_at),
            completed_at: ActiveValue::Set(self.completed_at),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
        }
    }
}

impl From<Model> for Checkin {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            startup_id: model.startup_id,
            user_id: model.user_id,
            fields: CheckinFields {
                start_focus: model.start_focus,
                start_why: model.start_why,
                start_video_url: model.start_video_url,
                end_video_url: model.end_video_url,
                start_comments: model.start_comments,
                end_comments: model.end_comments,
            },
            comment_count: model.comment_count,
            submitted_at: model.submitted_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
