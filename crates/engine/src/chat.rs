//! Chat account provisioning.
//!
//! Every member gets an account on the community chat service. The engine
//! talks to it through [`ChatProvisioner`]; [`HttpChatProvisioner`] speaks the
//! HipChat-style REST API the community runs on.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::User;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("user has no email address")]
    MissingEmail,
    #[error("chat service responded with {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait ChatProvisioner: Send + Sync {
    /// Create a chat account for `user`.
    async fn provision(&self, user: &User) -> Result<ChatCredentials, ChatError>;

    /// Drop the existing account (if any) and create a fresh one.
    async fn reset(&self, user: &User) -> Result<ChatCredentials, ChatError>;
}

#[derive(Serialize)]
struct CreateChatUser<'a> {
    name: &'a str,
    email: &'a str,
    mention_name: &'a str,
    password: &'a str,
}

/// Client for the chat service REST API.
#[derive(Clone, Debug)]
pub struct HttpChatProvisioner {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpChatProvisioner {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn users_url(&self) -> String {
        format!("{}/v2/user", self.base_url)
    }
}

#[async_trait]
impl ChatProvisioner for HttpChatProvisioner {
    async fn provision(&self, user: &User) -> Result<ChatCredentials, ChatError> {
        let email = user.email.as_deref().ok_or(ChatError::MissingEmail)?;
        let credentials = ChatCredentials {
            username: mention_name(user),
            password: Uuid::new_v4().simple().to_string(),
        };

        let response = self
            .client
            .post(self.users_url())
            .bearer_auth(&self.token)
            .json(&CreateChatUser {
                name: &user.name,
                email,
                mention_name: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChatError::Status(response.status()));
        }

        tracing::info!(user_id = user.id, "chat account provisioned");
        Ok(credentials)
    }

    async fn reset(&self, user: &User) -> Result<ChatCredentials, ChatError> {
        let email = user.email.as_deref().ok_or(ChatError::MissingEmail)?;
        let response = self
            .client
            .delete(format!("{}/{}", self.users_url(), email))
            .bearer_auth(&self.token)
            .send()
            .await?;
        // A missing account is fine: we are about to create it anyway.
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(ChatError::Status(status));
        }

        self.provision(user).await
    }
}

/// Chat handle derived from the user's name, e.g. `AdaLovelace`.
fn mention_name(user: &User) -> String {
    let handle: String = user
        .name
        .split_whitespace()
        .flat_map(|word| {
            let mut chars = word.chars().filter(|c| c.is_ascii_alphanumeric());
            let first = chars.next().map(|c| c.to_ascii_uppercase());
            first.into_iter().chain(chars)
        })
        .collect();
    if handle.is_empty() {
        format!("user{}", user.id)
    } else {
        handle
    }
}
