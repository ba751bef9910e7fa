//! Notifications table.
//!
//! A notification points at the record it is about through
//! `attachable_type`/`attachable_id`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};

pub const NEW_CHECKIN: &str = "new_checkin";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub attachable_type: String,
    pub attachable_id: i64,
    pub read_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Row announcing a freshly completed checkin.
pub(crate) fn new_checkin(user_id: i64, checkin_id: i64, now: DateTime<Utc>) -> ActiveModel {
    ActiveModel {
        user_id: ActiveValue::Set(user_id),
        action: ActiveValue::Set(NEW_CHECKIN.to_string()),
        attachable_type: ActiveValue::Set("checkin".to_string()),
        attachable_id: ActiveValue::Set(checkin_id),
        read_at: ActiveValue::Set(None),
        created_at: ActiveValue::Set(now),
        ..Default::default()
    }
}
