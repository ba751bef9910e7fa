use std::{error::Error, io::Write, sync::Arc};

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{
    Action, CheckinClock, CheckinKind, EmailPreference, Engine, NewUser, Policy, Resource, Role,
    User,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "accelerator_admin")]
#[command(about = "Admin utilities for the accelerator (bootstrap users/startups, reminders)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./accelerator.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(UserArgs),
    Startup(StartupArgs),
    Reminders(RemindersArgs),
}

#[derive(Args, Debug)]
struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    startup_id: Option<i64>,
    /// Roles to grant, e.g. `--role entrepreneur --role admin`.
    #[arg(long = "role")]
    roles: Vec<String>,
    /// Opt the user into checkin reminder emails.
    #[arg(long)]
    checkin_emails: bool,
}

#[derive(Args, Debug)]
struct StartupArgs {
    #[command(subcommand)]
    command: StartupCommand,
}

#[derive(Subcommand, Debug)]
enum StartupCommand {
    Create(StartupCreateArgs),
}

#[derive(Args, Debug)]
struct StartupCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    onboarded: bool,
}

#[derive(Args, Debug)]
struct RemindersArgs {
    #[command(subcommand)]
    command: RemindersCommand,
}

#[derive(Subcommand, Debug)]
enum RemindersCommand {
    /// Enqueue one reminder email per eligible user.
    Send {
        kind: KindArg,
        /// IANA timezone of the checkin schedule.
        #[arg(long, env = "ACCELERATOR__CHECKIN__TIMEZONE", default_value = "America/Los_Angeles")]
        timezone: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Before,
    After,
}

impl From<KindArg> for CheckinKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Before => CheckinKind::Before,
            KindArg::After => CheckinKind::After,
        }
    }
}

/// The admin tool never acts as a signed-in user.
struct OperatorPolicy;

impl Policy for OperatorPolicy {
    fn can_access(&self, _actor: &User, _resource: Resource, _action: Action) -> bool {
        false
    }
}

fn parse_roles(raw: &[String]) -> Result<Vec<Role>, Box<dyn Error + Send + Sync>> {
    raw.iter()
        .map(|name| Role::try_from(name.as_str()).map_err(Into::into))
        .collect()
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn build_engine(
    db: DatabaseConnection,
    clock: CheckinClock,
) -> Result<Engine, Box<dyn Error + Send + Sync>> {
    Ok(Engine::builder()
        .database(db)
        .clock(clock)
        .policy(Arc::new(OperatorPolicy))
        .build()
        .await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(UserArgs {
            command: UserCommand::Create(args),
        }) => {
            let roles = match parse_roles(&args.roles) {
                Ok(roles) => roles,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };
            let password = prompt_password_twice()?;

            let engine = build_engine(db, CheckinClock::default()).await?;
            let mut email_on = engine::EmailPreferences::empty();
            if args.checkin_emails {
                email_on.insert(EmailPreference::DoCheckin);
            }
            let user = match engine
                .create_user(
                    NewUser {
                        name: args.name,
                        email: Some(args.email),
                        password,
                        startup_id: args.startup_id,
                        roles: roles.into_iter().collect(),
                        email_on,
                    },
                    Utc::now(),
                )
                .await
            {
                Ok(user) => user,
                Err(err) => {
                    eprintln!("could not create user: {err}");
                    std::process::exit(1);
                }
            };

            println!("created user: {} ({})", user.name, user.id);
        }
        Command::Startup(StartupArgs {
            command: StartupCommand::Create(args),
        }) => {
            let engine = build_engine(db, CheckinClock::default()).await?;
            let startup = engine
                .create_startup(&args.name, args.onboarded, Utc::now())
                .await?;
            println!("created startup: {} ({})", startup.name, startup.id);
        }
        Command::Reminders(RemindersArgs {
            command: RemindersCommand::Send { kind, timezone },
        }) => {
            let Some(clock) = CheckinClock::from_name(&timezone) else {
                eprintln!("unknown timezone: {timezone}");
                std::process::exit(2);
            };
            let engine = build_engine(db, clock).await?;
            let queued = engine
                .send_checkin_reminders(kind.into(), Utc::now())
                .await?;
            println!("queued {queued} {} checkin reminders", CheckinKind::from(kind).as_str());
        }
    }

    Ok(())
}
