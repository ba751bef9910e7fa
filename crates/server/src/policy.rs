//! Who may do what.

use engine::{Action, Policy, Resource, Role, User};

/// The community's access rules.
///
/// Admins may do anything. Everyone signed in may read profiles, startups
/// and checkins, and comment on checkins. Users edit only themselves;
/// startup members manage their own startup's checkins; entrepreneurs invite
/// mentors to their startup.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardPolicy;

impl Policy for StandardPolicy {
    fn can_access(&self, actor: &User, resource: Resource, action: Action) -> bool {
        if actor.is_admin() {
            return true;
        }
        match (resource, action) {
            (_, Action::Read) => true,
            (Resource::Checkin { .. }, Action::Comment) => true,
            (Resource::User(id), Action::Update) => actor.id == id,
            (Resource::Startup(id), Action::InviteMentor) => {
                member_of(actor, id) && actor.has_role(Role::Entrepreneur)
            }
            (Resource::Startup(id), Action::Create | Action::Update)
            | (Resource::Checkin { startup_id: id, .. }, Action::Update) => member_of(actor, id),
            _ => false,
        }
    }
}

fn member_of(actor: &User, startup_id: i64) -> bool {
    actor.startup_id == Some(startup_id)
}
