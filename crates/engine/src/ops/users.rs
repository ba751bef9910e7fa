use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Action, ChatCredentials, EmailPreferences, EngineError, FieldErrors, Profile, ProfileUpdate,
    Resource, ResultEngine, Role, Roles, Setup, SetupStep, User, invites, notifications,
    startups, users,
};

use super::{Engine, with_tx};

/// Account data for [`Engine::create_user`].
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password: String,
    pub startup_id: Option<i64>,
    pub roles: Roles,
    pub email_on: EmailPreferences,
}

/// What the profile page shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileView {
    pub user: User,
    /// Pending invite addressed to the viewer; only set on one's own page.
    pub current_invite: Option<invites::Model>,
    pub can_invite_as_mentor: bool,
}

impl Engine {
    pub async fn user(&self, id: i64) -> ResultEngine<User> {
        users::Entity::find_by_id(id)
            .one(&self.database)
            .await?
            .map(User::from)
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {id}")))
    }

    /// Look a user up by login credentials.
    pub async fn authenticate(&self, email: &str, password: &str) -> ResultEngine<Option<User>> {
        if email.trim().is_empty() || password.is_empty() {
            return Ok(None);
        }
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.trim()))
            .filter(users::Column::Password.eq(password))
            .one(&self.database)
            .await?;
        Ok(user.map(User::from))
    }

    pub async fn create_user(&self, new_user: NewUser, now: DateTime<Utc>) -> ResultEngine<User> {
        let mut user = User {
            id: 0,
            name: String::new(),
            email: None,
            startup_id: new_user.startup_id,
            roles: new_user.roles,
            setup: Setup::empty(),
            email_on: new_user.email_on,
            profile: Profile::default(),
            chat: None,
            created_at: now,
        };
        let mut errors = user.apply_profile(ProfileUpdate {
            name: Some(new_user.name),
            email: new_user.email,
            ..Default::default()
        });
        if new_user.password.is_empty() {
            errors.add("password", "can't be blank");
        }

        with_tx!(self, |db_tx| {
            if let Some(email) = &user.email
                && self.email_taken(&db_tx, email, None).await?
            {
                errors.add("email", "has already been taken");
            }
            if let Some(startup_id) = user.startup_id
                && startups::Entity::find_by_id(startup_id)
                    .one(&db_tx)
                    .await?
                    .is_none()
            {
                errors.add("startup_id", "does not exist");
            }
            errors.into_result()?;

            let mut model = user.to_active_model();
            model.id = ActiveValue::NotSet;
            model.password = ActiveValue::Set(new_user.password);
            model.created_at = ActiveValue::Set(now);
            let model = model.insert(&db_tx).await?;
            tracing::info!(user_id = model.id, "user created");
            Ok(User::from(model))
        })
    }

    pub async fn create_startup(
        &self,
        name: &str,
        onboarded: bool,
        now: DateTime<Utc>,
    ) -> ResultEngine<startups::Model> {
        let name = name.trim();
        if name.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("name", "can't be blank");
            return Err(EngineError::Validation(errors));
        }
        let startup = startups::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(name.to_string()),
            onboarded: ActiveValue::Set(onboarded),
            created_at: ActiveValue::Set(now),
        }
        .insert(&self.database)
        .await?;
        tracing::info!(startup_id = startup.id, "startup created");
        Ok(startup)
    }

    /// Profile page of `target_id`, or of the actor when `None`.
    pub async fn profile(
        &self,
        actor: &User,
        target_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> ResultEngine<ProfileView> {
        let target_id = target_id.unwrap_or(actor.id);
        self.authorize(actor, Resource::User(target_id), Action::Read)?;

        if target_id == actor.id {
            // Looked up by id only: matching on email would hand invites to
            // whoever registers an address they don't own.
            let current_invite = invites::Entity::find()
                .filter(invites::Column::ToId.eq(actor.id))
                .filter(invites::Column::AcceptedAt.is_null())
                .order_by_desc(invites::Column::CreatedAt)
                .order_by_desc(invites::Column::Id)
                .one(&self.database)
                .await?
                .filter(|invite| invite.active(now));
            return Ok(ProfileView {
                user: actor.clone(),
                current_invite,
                can_invite_as_mentor: false,
            });
        }

        let user = self.user(target_id).await?;
        let can_invite_as_mentor = match actor.startup_id {
            Some(startup_id) if user.has_role(Role::NreduceMentor) => self.policy.can_access(
                actor,
                Resource::Startup(startup_id),
                Action::InviteMentor,
            ),
            _ => false,
        };
        Ok(ProfileView {
            user,
            current_invite: None,
            can_invite_as_mentor,
        })
    }

    /// The user behind an edit form, after checking the actor may edit it.
    pub async fn editable_user(&self, actor: &User, target_id: Option<i64>) -> ResultEngine<User> {
        let target_id = target_id.unwrap_or(actor.id);
        self.authorize(actor, Resource::User(target_id), Action::Update)?;
        if target_id == actor.id {
            return Ok(actor.clone());
        }
        self.user(target_id).await
    }

    /// Account-type form submission.
    ///
    /// `reset` drops the spectator role and the account-type setup step;
    /// `role` is then added. Only self-assignable roles are accepted.
    pub async fn update_account_type(
        &self,
        actor: &User,
        reset: bool,
        role: Option<&str>,
    ) -> ResultEngine<User> {
        self.authorize(actor, Resource::User(actor.id), Action::Update)?;
        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            Some(name) => match Role::try_from(name) {
                Ok(role) if role.is_self_assignable() => Some(role),
                _ => {
                    let mut errors = FieldErrors::new();
                    errors.add("roles", "is not a valid account type");
                    return Err(EngineError::Validation(errors));
                }
            },
            None => None,
        };

        let mut user = actor.clone();
        if reset {
            user.roles.remove(Role::Spectator);
            user.setup.remove(SetupStep::AccountType);
        }
        if let Some(role) = role {
            user.roles.insert(role);
        }
        if user == *actor {
            return Ok(user);
        }

        let model = user.to_active_model().update(&self.database).await?;
        Ok(User::from(model))
    }

    pub async fn update_profile(
        &self,
        actor: &User,
        target_id: Option<i64>,
        update: ProfileUpdate,
    ) -> ResultEngine<User> {
        let mut user = self.editable_user(actor, target_id).await?;
        let mut errors = user.apply_profile(update);

        with_tx!(self, |db_tx| {
            if let Some(email) = &user.email
                && self.email_taken(&db_tx, email, Some(user.id)).await?
            {
                errors.add("email", "has already been taken");
            }
            errors.into_result()?;

            let model = user.to_active_model().update(&db_tx).await?;
            tracing::info!(user_id = model.id, "profile updated");
            Ok(User::from(model))
        })
    }

    /// Chat credentials of the actor, provisioning an account on first use.
    pub async fn chat_account(&self, actor: &User) -> ResultEngine<ChatCredentials> {
        self.authorize(actor, Resource::User(actor.id), Action::Update)?;
        if let Some(chat) = &actor.chat {
            return Ok(chat.clone());
        }
        let provisioner = self
            .chat
            .as_ref()
            .ok_or(EngineError::MissingCollaborator("chat"))?;
        let credentials = provisioner
            .provision(actor)
            .await
            .map_err(|err| EngineError::ChatService(err.to_string()))?;
        self.store_chat(actor, credentials).await
    }

    /// Replace the actor's chat account with a fresh one.
    pub async fn reset_chat_account(&self, actor: &User) -> ResultEngine<ChatCredentials> {
        self.authorize(actor, Resource::User(actor.id), Action::Update)?;
        let provisioner = self
            .chat
            .as_ref()
            .ok_or(EngineError::MissingCollaborator("chat"))?;
        let credentials = provisioner
            .reset(actor)
            .await
            .map_err(|err| EngineError::ChatService(err.to_string()))?;
        self.store_chat(actor, credentials).await
    }

    /// Mark every setup step done.
    pub async fn complete_setup(&self, actor: &User) -> ResultEngine<User> {
        self.authorize(actor, Resource::User(actor.id), Action::Update)?;
        let mut user = actor.clone();
        user.setup = Setup::all();
        let model = user.to_active_model().update(&self.database).await?;
        Ok(User::from(model))
    }

    /// Notifications of a user, newest first.
    pub async fn notifications(&self, user_id: i64) -> ResultEngine<Vec<notifications::Model>> {
        let rows = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .order_by_desc(notifications::Column::CreatedAt)
            .order_by_desc(notifications::Column::Id)
            .all(&self.database)
            .await?;
        Ok(rows)
    }

    async fn store_chat(
        &self,
        actor: &User,
        credentials: ChatCredentials,
    ) -> ResultEngine<ChatCredentials> {
        users::ActiveModel {
            id: ActiveValue::Unchanged(actor.id),
            chat_username: ActiveValue::Set(Some(credentials.username.clone())),
            chat_password: ActiveValue::Set(Some(credentials.password.clone())),
            ..Default::default()
        }
        .update(&self.database)
        .await?;
        Ok(credentials)
    }

    async fn email_taken<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        except: Option<i64>,
    ) -> ResultEngine<bool> {
        let mut query = users::Entity::find().filter(users::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id));
        }
        Ok(query.one(db).await?.is_some())
    }
}
