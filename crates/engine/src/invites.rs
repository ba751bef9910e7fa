//! Invites table.
//!
//! Invites are created and accepted elsewhere; the engine only looks up the
//! pending invite addressed to a user.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "invites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_id: i64,
    pub to_id: Option<i64>,
    pub startup_id: Option<i64>,
    pub invite_type: String,
    pub accepted_at: Option<DateTimeUtc>,
    pub expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn accepted(&self) -> bool {
        self.accepted_at.is_some()
    }

    /// An invite can still be accepted until it expires.
    pub fn active(&self, now: DateTime<Utc>) -> bool {
        !self.accepted() && self.expires_at > now
    }
}
