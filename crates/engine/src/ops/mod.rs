use std::{fmt, sync::Arc};

use sea_orm::DatabaseConnection;

use crate::{
    Action, ChatProvisioner, CheckinClock, DbTaskQueue, EngineError, Policy, Resource,
    ResultEngine, TaskQueue, User, VideoUrlValidator, YoutubeUrls,
};

mod checkins;
mod reminders;
mod users;

pub use users::{NewUser, ProfileView};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    clock: CheckinClock,
    policy: Arc<dyn Policy>,
    chat: Option<Arc<dyn ChatProvisioner>>,
    queue: Arc<dyn TaskQueue>,
    videos: Arc<dyn VideoUrlValidator>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("clock", &self.clock)
            .field("chat", &self.chat.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn clock(&self) -> &CheckinClock {
        &self.clock
    }

    /// Ask the policy, turning a refusal into [`EngineError::Forbidden`].
    fn authorize(&self, actor: &User, resource: Resource, action: Action) -> ResultEngine<()> {
        if self.policy.can_access(actor, resource, action) {
            return Ok(());
        }
        tracing::debug!(actor = actor.id, ?resource, ?action, "access denied");
        Err(EngineError::Forbidden(format!(
            "{action:?} on {resource:?} is not allowed"
        )))
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: Option<DatabaseConnection>,
    clock: CheckinClock,
    policy: Option<Arc<dyn Policy>>,
    chat: Option<Arc<dyn ChatProvisioner>>,
    queue: Option<Arc<dyn TaskQueue>>,
    videos: Option<Arc<dyn VideoUrlValidator>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = Some(db);
        self
    }

    /// Clock used for checkin windows. Defaults to Pacific time.
    pub fn clock(mut self, clock: CheckinClock) -> EngineBuilder {
        self.clock = clock;
        self
    }

    /// Pass the required authorization policy
    pub fn policy(mut self, policy: Arc<dyn Policy>) -> EngineBuilder {
        self.policy = Some(policy);
        self
    }

    /// Chat service client. Without one, chat operations fail with
    /// [`EngineError::MissingCollaborator`].
    pub fn chat(mut self, chat: Arc<dyn ChatProvisioner>) -> EngineBuilder {
        self.chat = Some(chat);
        self
    }

    /// Reminder queue. Defaults to [`DbTaskQueue`] on the engine database.
    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> EngineBuilder {
        self.queue = Some(queue);
        self
    }

    /// Video URL check. Defaults to [`YoutubeUrls`].
    pub fn videos(mut self, videos: Arc<dyn VideoUrlValidator>) -> EngineBuilder {
        self.videos = Some(videos);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let database = self
            .database
            .ok_or(EngineError::MissingCollaborator("database"))?;
        let policy = self
            .policy
            .ok_or(EngineError::MissingCollaborator("policy"))?;
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(DbTaskQueue::new(database.clone())));

        Ok(Engine {
            database,
            clock: self.clock,
            policy,
            chat: self.chat,
            queue,
            videos: self.videos.unwrap_or_else(|| Arc::new(YoutubeUrls)),
        })
    }
}
