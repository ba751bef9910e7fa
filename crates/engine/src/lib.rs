pub use chat::{ChatCredentials, ChatError, ChatProvisioner, HttpChatProvisioner};
pub use checkins::{Checkin, CheckinFields, Stamped};
pub use error::{EngineError, FieldErrors};
pub use flags::{
    EmailPreference, EmailPreferences, Flag, FlagSet, Role, Roles, Setup, SetupStep,
};
pub use jobs::{
    DbTaskQueue, HttpMailer, LogMailer, MailError, Mailer, ReminderJob, ReminderWorker, TaskQueue,
};
pub use ops::{Engine, EngineBuilder, NewUser, ProfileView};
pub use policy::{Action, Policy, Resource};
pub use schedule::{CheckinClock, CheckinKind, NextCheckin};
pub use users::{Profile, ProfileElement, ProfileUpdate, User};
pub use video::{VideoUrlValidator, YoutubeUrls};

pub mod checkins;
pub mod comments;
pub mod invites;
pub mod notifications;
pub mod reminder_jobs;
pub mod responses;
pub mod startups;
pub mod users;

mod chat;
mod error;
mod flags;
mod jobs;
mod ops;
mod policy;
mod schedule;
mod video;

pub type ResultEngine<T> = Result<T, EngineError>;
