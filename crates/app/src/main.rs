use std::{sync::Arc, time::Duration};

use engine::{
    CheckinClock, DbTaskQueue, Engine, HttpChatProvisioner, HttpMailer, LogMailer, Mailer,
    ReminderWorker,
};
use migration::{Migrator, MigratorTrait};
use server::StandardPolicy;
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "accelerator={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let Some(clock) = CheckinClock::from_name(&settings.checkin.timezone) else {
        return Err(format!("unknown checkin timezone: {}", settings.checkin.timezone).into());
    };

    let Some(server) = settings.server else {
        tracing::warn!("no server settings, nothing to run");
        return Ok(());
    };

    let db = parse_database(&server.database).await?;

    let mut builder = Engine::builder()
        .database(db.clone())
        .clock(clock)
        .policy(Arc::new(StandardPolicy))
        .queue(Arc::new(DbTaskQueue::new(db.clone())));
    if let Some(chat) = &settings.chat {
        tracing::info!("Found chat settings...");
        builder = builder.chat(Arc::new(HttpChatProvisioner::new(&chat.base_url, &chat.token)));
    }
    let engine = builder.build().await?;

    let mailer: Arc<dyn Mailer> = match &settings.mail {
        Some(mail) => {
            tracing::info!("Found mail settings...");
            Arc::new(HttpMailer::new(&mail.endpoint, &mail.token, &mail.from))
        }
        None => Arc::new(LogMailer),
    };
    let worker = ReminderWorker::new(db, mailer)
        .poll_interval(Duration::from_secs(settings.reminders.poll_seconds))
        .batch_size(settings.reminders.batch_size)
        .max_attempts(settings.reminders.max_attempts);
    tasks.spawn(worker.run());

    let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    tasks.spawn(async move { server::run(engine, &addr).await });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
