//! Account endpoints: profile, account type, chat and onboarding.

use api_types::{
    Flash,
    user::{
        AccountTypeForm, AccountTypeView, ChatAccount, EditProfileView, EmailPreference,
        InviteView, NotificationView, ProfileElementView, ProfileUpdate, ProfileView, Role,
        SetupStep, UserView, WelcomeView,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use engine::{Setup, User};

use crate::{ServerError, page::Page, server::ServerState};

pub const ACCOUNT_UPDATED: &str = "Your account has been updated!";
pub const CHAT_RESET: &str = "Your chat account has been reset, please try logging in again.";
pub const CHAT_RESET_FAILED: &str =
    "Sorry but your chat account could not be reset. Please contact support@nreduce.com";

/// `me` stands for the signed-in user.
fn target(id: &str) -> Result<Option<i64>, ServerError> {
    if id == "me" {
        return Ok(None);
    }
    id.parse()
        .map(Some)
        .map_err(|_| ServerError::Engine(engine::EngineError::KeyNotFound(format!("user {id}"))))
}

fn map_role(role: engine::Role) -> Role {
    match role {
        engine::Role::Admin => Role::Admin,
        engine::Role::Entrepreneur => Role::Entrepreneur,
        engine::Role::Mentor => Role::Mentor,
        engine::Role::NreduceMentor => Role::NreduceMentor,
        engine::Role::Investor => Role::Investor,
        engine::Role::Spectator => Role::Spectator,
    }
}

fn map_setup_step(step: engine::SetupStep) -> SetupStep {
    match step {
        engine::SetupStep::AccountType => SetupStep::AccountType,
        engine::SetupStep::Profile => SetupStep::Profile,
        engine::SetupStep::Startup => SetupStep::Startup,
        engine::SetupStep::Welcome => SetupStep::Welcome,
    }
}

fn map_email_preference(preference: engine::EmailPreference) -> EmailPreference {
    match preference {
        engine::EmailPreference::DoCheckin => EmailPreference::DoCheckin,
        engine::EmailPreference::Comment => EmailPreference::Comment,
        engine::EmailPreference::Message => EmailPreference::Message,
    }
}

fn unmap_email_preference(preference: EmailPreference) -> engine::EmailPreference {
    match preference {
        EmailPreference::DoCheckin => engine::EmailPreference::DoCheckin,
        EmailPreference::Comment => engine::EmailPreference::Comment,
        EmailPreference::Message => engine::EmailPreference::Message,
    }
}

pub(crate) fn user_view(user: &User) -> UserView {
    UserView {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        startup_id: user.startup_id,
        roles: user.roles.iter().map(map_role).collect(),
        setup: user.setup.iter().map(map_setup_step).collect(),
        email_on: user.email_on.iter().map(map_email_preference).collect(),
        location: user.profile.location.clone(),
        one_liner: user.profile.one_liner.clone(),
        bio: user.profile.bio.clone(),
        twitter: user.profile.twitter.clone(),
        linkedin_url: user.profile.linkedin_url.clone(),
        has_chat: user.has_chat(),
        created_at: user.created_at,
    }
}

fn edit_view(user: &User) -> EditProfileView {
    EditProfileView {
        user: user_view(user),
        profile_elements: user
            .profile_elements()
            .into_iter()
            .map(|(element, filled)| ProfileElementView {
                element: element.as_str().to_string(),
                filled,
            })
            .collect(),
        profile_completeness_percent: user.profile_completeness_percent(),
    }
}

pub async fn index() -> Page<()> {
    Page::redirect("/")
}

pub async fn show(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Page<ProfileView>, ServerError> {
    let view = state
        .engine
        .profile(&user, target(&id)?, Utc::now())
        .await?;

    Ok(Page::Show(ProfileView {
        user: user_view(&view.user),
        current_invite: view.current_invite.map(|invite| InviteView {
            id: invite.id,
            from_id: invite.from_id,
            startup_id: invite.startup_id,
            invite_type: invite.invite_type,
            expires_at: invite.expires_at,
        }),
        can_invite_as_mentor: view.can_invite_as_mentor,
    }))
}

pub async fn account_type(Extension(user): Extension<User>) -> Page<AccountTypeView> {
    Page::Show(AccountTypeView {
        roles: user.roles.iter().map(map_role).collect(),
        setup: user.setup.iter().map(map_setup_step).collect(),
    })
}

pub async fn update_account_type(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountTypeForm>,
) -> Result<Page<AccountTypeView>, ServerError> {
    match state
        .engine
        .update_account_type(&user, payload.reset, payload.roles.as_deref())
        .await
    {
        Ok(_) => Ok(Page::redirect("/")),
        Err(err) => Page::form_on_invalid("account_type", err),
    }
}

pub async fn edit(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Page<EditProfileView>, ServerError> {
    let target = state.engine.editable_user(&user, target(&id)?).await?;
    Ok(Page::Show(edit_view(&target)))
}

pub async fn complete_account(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Page<EditProfileView>, ServerError> {
    let target = state.engine.editable_user(&user, target(&id)?).await?;
    Ok(Page::Show(edit_view(&target)))
}

pub async fn update(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Page<()>, ServerError> {
    let form = if payload.complete_account {
        "complete_account"
    } else {
        "edit"
    };
    let update = engine::ProfileUpdate {
        name: payload.name,
        email: payload.email,
        location: payload.location,
        one_liner: payload.one_liner,
        bio: payload.bio,
        twitter: payload.twitter,
        linkedin_url: payload.linkedin_url,
        email_on: payload
            .email_on
            .map(|prefs| prefs.into_iter().map(unmap_email_preference).collect()),
    };

    match state.engine.update_profile(&user, target(&id)?, update).await {
        Ok(updated) => Ok(Page::redirect_with(
            format!("/users/{}", updated.id),
            Flash::notice(ACCOUNT_UPDATED),
        )),
        Err(err) => Page::form_on_invalid(form, err),
    }
}

pub async fn chat(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Page<ChatAccount>, ServerError> {
    let credentials = state.engine.chat_account(&user).await?;
    Ok(Page::Show(ChatAccount {
        username: credentials.username,
        password: credentials.password,
    }))
}

pub async fn reset_chat(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Page<()> {
    let flash = match state.engine.reset_chat_account(&user).await {
        Ok(_) => Flash::notice(CHAT_RESET),
        Err(err) => {
            tracing::warn!(user_id = user.id, "chat reset failed: {err}");
            Flash::alert(CHAT_RESET_FAILED)
        }
    };
    Page::redirect_with("/users/me/chat", flash)
}

pub async fn welcome(Extension(user): Extension<User>) -> Page<WelcomeView> {
    let setup_complete = user.setup == Setup::all();
    Page::Show(WelcomeView {
        user: user_view(&user),
        setup_complete,
    })
}

pub async fn complete_welcome(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Page<()>, ServerError> {
    state.engine.complete_setup(&user).await?;
    Ok(Page::redirect("/"))
}

pub async fn notifications(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Page<Vec<NotificationView>>, ServerError> {
    let rows = state.engine.notifications(user.id).await?;
    Ok(Page::Show(
        rows.into_iter()
            .map(|row| NotificationView {
                id: row.id,
                action: row.action,
                attachable_type: row.attachable_type,
                attachable_id: row.attachable_id,
                read: row.read_at.is_some(),
                created_at: row.created_at,
            })
            .collect(),
    ))
}
