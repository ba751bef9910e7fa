//! Application settings.
//!
//! Read from an optional `settings.toml` in the working directory, then from
//! `ACCELERATOR__*` environment variables (e.g. `ACCELERATOR__SERVER__PORT`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Checkin {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for Checkin {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct Mail {
    pub endpoint: String,
    pub token: String,
    pub from: String,
}

#[derive(Debug, Deserialize)]
pub struct Reminders {
    pub poll_seconds: u64,
    pub batch_size: u64,
    pub max_attempts: i32,
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            poll_seconds: 30,
            batch_size: 50,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
    #[serde(default)]
    pub checkin: Checkin,
    pub chat: Option<Chat>,
    pub mail: Option<Mail>,
    #[serde(default)]
    pub reminders: Reminders,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("ACCELERATOR").separator("__"))
            .build()?
            .try_deserialize()
    }
}
