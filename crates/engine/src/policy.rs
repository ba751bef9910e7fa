//! Authorization seam.
//!
//! The engine never decides who may do what. Every guarded operation asks the
//! [`Policy`] it was built with and turns a refusal into
//! [`EngineError::Forbidden`](crate::EngineError::Forbidden).

use crate::User;

/// What the actor wants to touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    User(i64),
    Startup(i64),
    Checkin { id: i64, startup_id: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    InviteMentor,
    Comment,
}

pub trait Policy: Send + Sync {
    fn can_access(&self, actor: &User, resource: Resource, action: Action) -> bool;
}
