//! Users: the `users` table and the engine's view of an account.
//!
//! Roles, setup progress and email preferences are persisted as bitmask
//! columns and surfaced as [`FlagSet`](crate::FlagSet)s on [`User`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use url::Url;

use crate::{
    ChatCredentials, FieldErrors,
    flags::{EmailPreference, EmailPreferences, Role, Roles, Setup},
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub password: String,
    pub startup_id: Option<i64>,
    pub roles_mask: i64,
    pub setup_mask: i64,
    pub email_on_mask: i64,
    pub location: Option<String>,
    pub one_liner: Option<String>,
    pub bio: Option<String>,
    pub twitter: Option<String>,
    pub linkedin_url: Option<String>,
    pub chat_username: Option<String>,
    pub chat_password: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::startups::Entity",
        from = "Column::StartupId",
        to = "super::startups::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Startups,
}

impl Related<super::startups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Startups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Free-form profile fields a user edits on the profile form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    pub location: Option<String>,
    pub one_liner: Option<String>,
    pub bio: Option<String>,
    pub twitter: Option<String>,
    pub linkedin_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub startup_id: Option<i64>,
    pub roles: Roles,
    pub setup: Setup,
    pub email_on: EmailPreferences,
    pub profile: Profile,
    pub chat: Option<ChatCredentials>,
    pub created_at: DateTime<Utc>,
}

/// Elements counted by the profile completeness meter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileElement {
    Name,
    Email,
    Location,
    OneLiner,
    Bio,
    Twitter,
    LinkedinUrl,
}

impl ProfileElement {
    pub const ALL: [Self; 7] = [
        Self::Name,
        Self::Email,
        Self::Location,
        Self::OneLiner,
        Self::Bio,
        Self::Twitter,
        Self::LinkedinUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Location => "location",
            Self::OneLiner => "one_liner",
            Self::Bio => "bio",
            Self::Twitter => "twitter",
            Self::LinkedinUrl => "linkedin_url",
        }
    }
}

/// Changes submitted through the profile form.
///
/// `None` leaves a field untouched; a blank string clears an optional field.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub one_liner: Option<String>,
    pub bio: Option<String>,
    pub twitter: Option<String>,
    pub linkedin_url: Option<String>,
    pub email_on: Option<Vec<EmailPreference>>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    pub fn email_for(&self, preference: EmailPreference) -> bool {
        self.email_on.contains(preference)
    }

    pub fn has_chat(&self) -> bool {
        self.chat.is_some()
    }

    pub fn profile_elements(&self) -> Vec<(ProfileElement, bool)> {
        ProfileElement::ALL
            .into_iter()
            .map(|element| (element, self.element_filled(element)))
            .collect()
    }

    /// Share of filled profile elements, as a rounded percentage.
    pub fn profile_completeness_percent(&self) -> u8 {
        let elements = self.profile_elements();
        let filled = elements.iter().filter(|(_, filled)| *filled).count();
        ((filled as f64 / elements.len() as f64) * 100.0).round() as u8
    }

    fn element_filled(&self, element: ProfileElement) -> bool {
        let value = match element {
            ProfileElement::Name => Some(self.name.as_str()),
            ProfileElement::Email => self.email.as_deref(),
            ProfileElement::Location => self.profile.location.as_deref(),
            ProfileElement::OneLiner => self.profile.one_liner.as_deref(),
            ProfileElement::Bio => self.profile.bio.as_deref(),
            ProfileElement::Twitter => self.profile.twitter.as_deref(),
            ProfileElement::LinkedinUrl => self.profile.linkedin_url.as_deref(),
        };
        !is_blank(value)
    }

    /// Apply a profile form submission, returning any field errors.
    ///
    /// The user is modified even when errors are returned; callers discard it
    /// in that case.
    pub fn apply_profile(&mut self, update: ProfileUpdate) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                errors.add("name", "can't be blank");
            }
            self.name = name.to_string();
        }
        if let Some(email) = update.email {
            let email = normalize(Some(email));
            if let Some(address) = &email
                && !looks_like_email(address)
            {
                errors.add("email", "is invalid");
            }
            self.email = email;
        }
        if let Some(location) = update.location {
            self.profile.location = normalize(Some(location));
        }
        if let Some(one_liner) = update.one_liner {
            self.profile.one_liner = normalize(Some(one_liner));
        }
        if let Some(bio) = update.bio {
            self.profile.bio = normalize(Some(bio));
        }
        if let Some(twitter) = update.twitter {
            self.profile.twitter =
                normalize(Some(twitter.trim().trim_start_matches('@').to_string()));
        }
        if let Some(linkedin_url) = update.linkedin_url {
            let linkedin_url = normalize(Some(linkedin_url));
            if let Some(url) = &linkedin_url
                && !is_web_url(url)
            {
                errors.add("linkedin_url", "is not a valid URL");
            }
            self.profile.linkedin_url = linkedin_url;
        }
        if let Some(preferences) = update.email_on {
            self.email_on = preferences.into_iter().collect();
        }

        errors
    }

    /// Active model carrying every column the engine mutates.
    pub(crate) fn to_active_model(&self) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::Unchanged(self.id),
            name: ActiveValue::Set(self.name.clone()),
            email: ActiveValue::Set(self.email.clone()),
            startup_id: ActiveValue::Set(self.startup_id),
            roles_mask: ActiveValue::Set(self.roles.bits()),
            setup_mask: ActiveValue::Set(self.setup.bits()),
            email_on_mask: ActiveValue::Set(self.email_on.bits()),
            location: ActiveValue::Set(self.profile.location.clone()),
            one_liner: ActiveValue::Set(self.profile.one_liner.clone()),
            bio: ActiveValue::Set(self.profile.bio.clone()),
            twitter: ActiveValue::Set(self.profile.twitter.clone()),
            linkedin_url: ActiveValue::Set(self.profile.linkedin_url.clone()),
            chat_username: ActiveValue::Set(self.chat.as_ref().map(|c| c.username.clone())),
            chat_password: ActiveValue::Set(self.chat.as_ref().map(|c| c.password.clone())),
            ..Default::default()
        }
    }
}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        let chat = match (model.chat_username, model.chat_password) {
            (Some(username), Some(password)) => Some(ChatCredentials { username, password }),
            _ => None,
        };
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            startup_id: model.startup_id,
            roles: Roles::from_bits(model.roles_mask),
            setup: Setup::from_bits(model.setup_mask),
            email_on: EmailPreferences::from_bits(model.email_on_mask),
            profile: Profile {
                location: model.location,
                one_liner: model.one_liner,
                bio: model.bio,
                twitter: model.twitter,
                linkedin_url: model.linkedin_url,
            },
            chat,
            created_at: model.created_at,
        }
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

pub(crate) fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_web_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
