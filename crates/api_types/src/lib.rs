use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One-shot message shown after a redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

impl Flash {
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            notice: Some(message.into()),
            alert: None,
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            notice: None,
            alert: Some(message.into()),
        }
    }
}

/// Body of a `303 See Other` response; `location` mirrors the header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectBody {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
}

/// Body of a `422` response: the form to show again and what was wrong.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormErrors {
    pub form: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

pub mod user {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        Admin,
        Entrepreneur,
        Mentor,
        NreduceMentor,
        Investor,
        Spectator,
    }

    impl Role {
        /// Returns the canonical role string used by the engine/database.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Admin => "admin",
                Self::Entrepreneur => "entrepreneur",
                Self::Mentor => "mentor",
                Self::NreduceMentor => "nreduce_mentor",
                Self::Investor => "investor",
                Self::Spectator => "spectator",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SetupStep {
        AccountType,
        Profile,
        Startup,
        Welcome,
    }

    impl SetupStep {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::AccountType => "account_type",
                Self::Profile => "profile",
                Self::Startup => "startup",
                Self::Welcome => "welcome",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum EmailPreference {
        #[serde(rename = "docheckin")]
        DoCheckin,
        #[serde(rename = "comment")]
        Comment,
        #[serde(rename = "message")]
        Message,
    }

    impl EmailPreference {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::DoCheckin => "docheckin",
                Self::Comment => "comment",
                Self::Message => "message",
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct UserView {
        pub id: i64,
        pub name: String,
        pub email: Option<String>,
        pub startup_id: Option<i64>,
        pub roles: Vec<Role>,
        pub setup: Vec<SetupStep>,
        pub email_on: Vec<EmailPreference>,
        pub location: Option<String>,
        pub one_liner: Option<String>,
        pub bio: Option<String>,
        pub twitter: Option<String>,
        pub linkedin_url: Option<String>,
        pub has_chat: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct InviteView {
        pub id: i64,
        pub from_id: i64,
        pub startup_id: Option<i64>,
        pub invite_type: String,
        pub expires_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProfileView {
        pub user: UserView,
        pub current_invite: Option<InviteView>,
        pub can_invite_as_mentor: bool,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AccountTypeView {
        pub roles: Vec<Role>,
        pub setup: Vec<SetupStep>,
    }

    /// Account-type form.
    ///
    /// `roles` is kept as text so that an unknown value comes back as a
    /// field error rather than a rejected request.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct AccountTypeForm {
        #[serde(default)]
        pub reset: bool,
        pub roles: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProfileElementView {
        pub element: String,
        pub filled: bool,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EditProfileView {
        pub user: UserView,
        pub profile_elements: Vec<ProfileElementView>,
        /// Rounded, 0 to 100.
        pub profile_completeness_percent: u8,
    }

    /// Profile form. Absent fields are left alone; empty strings clear.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct ProfileUpdate {
        pub name: Option<String>,
        pub email: Option<String>,
        pub location: Option<String>,
        pub one_liner: Option<String>,
        pub bio: Option<String>,
        pub twitter: Option<String>,
        pub linkedin_url: Option<String>,
        pub email_on: Option<Vec<EmailPreference>>,
        /// Submitted from the "complete account" form rather than "edit".
        #[serde(default)]
        pub complete_account: bool,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatAccount {
        pub username: String,
        pub password: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WelcomeView {
        pub user: UserView,
        pub setup_complete: bool,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NotificationView {
        pub id: i64,
        pub action: String,
        pub attachable_type: String,
        pub attachable_id: i64,
        pub read: bool,
        pub created_at: DateTime<Utc>,
    }
}

pub mod checkin {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum CheckinKind {
        Before,
        After,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NextCheckinView {
        pub kind: CheckinKind,
        pub at: DateTime<Utc>,
        pub in_before_window: bool,
        pub in_after_window: bool,
        /// Label of the current checkin week, e.g. `"Jul 2-Jul 8"`.
        pub week: String,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CheckinFields {
        pub start_focus: Option<String>,
        pub start_why: Option<String>,
        pub start_video_url: Option<String>,
        pub end_video_url: Option<String>,
        pub start_comments: Option<String>,
        pub end_comments: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CheckinNew {
        pub startup_id: i64,
        #[serde(flatten)]
        pub fields: CheckinFields,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CheckinView {
        pub id: i64,
        pub startup_id: i64,
        pub user_id: Option<i64>,
        #[serde(flatten)]
        pub fields: CheckinFields,
        pub comment_count: i32,
        pub submitted: bool,
        pub completed: bool,
        pub submitted_at: Option<DateTime<Utc>>,
        pub completed_at: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub time_label: String,
    }

    /// `startup_ids` is a comma separated list, e.g. `1,2,3`.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct CurrentCheckinsQuery {
        #[serde(default)]
        pub startup_ids: String,
    }

    /// Current checkin per startup id; startups without one are absent.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CurrentCheckins {
        pub checkins: BTreeMap<i64, CheckinView>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct StartupCheckinsQuery {
        #[serde(default)]
        pub completed: bool,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CommentNew {
        pub content: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CommentView {
        pub id: i64,
        pub checkin_id: i64,
        pub user_id: i64,
        pub content: String,
        pub created_at: DateTime<Utc>,
    }
}
