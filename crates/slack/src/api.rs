use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use spinbot_core::config::SlackConfig;
use spinbot_core::domain::participant::{Message, Profile, Reaction};
use spinbot_core::errors::ApplicationError;

use crate::blocks::MessageTemplate;

const PAGE_LIMIT: u32 = 200;
const MAX_PAGES: usize = 50;
const MAX_RATE_LIMIT_RETRIES: usize = 2;
const MAX_RETRY_AFTER_SECS: u64 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack api {method} request failed: {message}")]
    Transport { method: String, message: String },
    #[error("slack api {method} returned http status {status}")]
    Status { method: String, status: u16 },
    #[error("slack api {method} failed: {error}")]
    Api { method: String, error: String },
    #[error("slack api {method} response could not be decoded: {message}")]
    Decode { method: String, message: String },
    #[error("slack api client could not be built: {0}")]
    Client(String),
}

impl From<SlackApiError> for ApplicationError {
    fn from(error: SlackApiError) -> Self {
        ApplicationError::Integration(error.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlackReaction {
    pub name: String,
    pub users: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlackMessage {
    pub ts: String,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    pub reactions: Vec<SlackReaction>,
}

impl SlackMessage {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }
}

impl From<SlackMessage> for Message {
    fn from(message: SlackMessage) -> Self {
        let is_from_bot = message.is_from_bot();
        Message {
            author: message.user.filter(|user| !user.is_empty()).map(Into::into),
            is_from_bot,
            reactions: message
                .reactions
                .into_iter()
                .map(|reaction| Reaction::new(reaction.name, reaction.users))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlackUserProfile {
    pub status_emoji: String,
    pub status_text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlackUser {
    pub id: String,
    pub is_bot: bool,
    pub deleted: bool,
    pub profile: SlackUserProfile,
}

impl From<SlackUser> for Profile {
    fn from(user: SlackUser) -> Self {
        Profile {
            id: user.id.into(),
            is_bot: user.is_bot,
            is_deleted: user.deleted,
            status_emoji: user.profile.status_emoji,
            status_text: user.profile.status_text,
        }
    }
}

/// The slice of the Slack Web API SpinBot relies on.
#[async_trait]
pub trait SlackWebApi: Send + Sync {
    /// Returns the bot's own user id.
    async fn auth_test(&self) -> Result<String, SlackApiError>;
    async fn conversation_members(&self, channel_id: &str) -> Result<Vec<String>, SlackApiError>;
    async fn conversation_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackApiError>;
    /// `Ok(None)` when Slack does not know the user.
    async fn user_info(&self, user_id: &str) -> Result<Option<SlackUser>, SlackApiError>;
    async fn conversation_name(&self, channel_id: &str) -> Result<Option<String>, SlackApiError>;
    /// Posts the message and returns its `ts`.
    async fn post_message(&self, message: &MessageTemplate) -> Result<String, SlackApiError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseMetadata {
    next_cursor: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthTestBody {
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MembersBody {
    members: Vec<String>,
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RepliesBody {
    messages: Vec<SlackMessage>,
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserInfoBody {
    user: Option<SlackUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChannelBody {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConversationInfoBody {
    channel: Option<ChannelBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostMessageBody {
    ts: Option<String>,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    blocks: &'a [crate::blocks::Block],
}

/// `reqwest` client for the Slack Web API authenticated with the bot token.
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spinbot/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout.max(Duration::from_secs(1)))
            .build()
            .map_err(|error| SlackApiError::Client(error.to_string()))?;
        let api_base = api_base.into().trim_end_matches('/').to_owned();

        Ok(Self { http, api_base, bot_token })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        Self::new(
            config.api_base_url.clone(),
            config.bot_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn get<T>(&self, method: &str, query: &[(&str, String)]) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.api_base);
        self.send(method, || self.http.get(&url).query(query)).await
    }

    async fn post<T>(&self, method: &str, body: &serde_json::Value) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.api_base);
        self.send(method, || self.http.post(&url).json(body)).await
    }

    async fn send<T, F>(&self, method: &str, build: F) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build()
                .bearer_auth(self.bot_token.expose_secret())
                .send()
                .await
                .map_err(|error| SlackApiError::Transport {
                    method: method.to_owned(),
                    message: error.to_string(),
                })?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                && attempt < MAX_RATE_LIMIT_RETRIES
            {
                attempt += 1;
                tokio::time::sleep(retry_after(response.headers())).await;
                continue;
            }
            if !status.is_success() {
                return Err(SlackApiError::Status {
                    method: method.to_owned(),
                    status: status.as_u16(),
                });
            }

            let parsed = response.json::<ApiResponse<T>>().await.map_err(|error| {
                SlackApiError::Decode { method: method.to_owned(), message: error.to_string() }
            })?;
            if !parsed.ok {
                return Err(SlackApiError::Api {
                    method: method.to_owned(),
                    error: parsed.error.unwrap_or_else(|| "unknown_error".to_owned()),
                });
            }
            return Ok(parsed.body);
        }
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(1);
    Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS))
}

#[async_trait]
impl SlackWebApi for SlackWebClient {
    async fn auth_test(&self) -> Result<String, SlackApiError> {
        let body: AuthTestBody = self.post("auth.test", &json!({})).await?;
        body.user_id.filter(|id| !id.trim().is_empty()).ok_or_else(|| SlackApiError::Decode {
            method: "auth.test".to_owned(),
            message: "response did not include user_id".to_owned(),
        })
    }

    async fn conversation_members(&self, channel_id: &str) -> Result<Vec<String>, SlackApiError> {
        let mut members = Vec::new();
        let mut cursor = String::new();
        for _ in 0..MAX_PAGES {
            let mut query =
                vec![("channel", channel_id.to_owned()), ("limit", PAGE_LIMIT.to_string())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }
            let page: MembersBody = self.get("conversations.members", &query).await?;
            members.extend(page.members);
            cursor = page.response_metadata.next_cursor;
            if cursor.is_empty() {
                break;
            }
        }
        Ok(members)
    }

    async fn conversation_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        let mut messages = Vec::new();
        let mut cursor = String::new();
        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("channel", channel_id.to_owned()),
                ("ts", thread_ts.to_owned()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }
            let page: RepliesBody = self.get("conversations.replies", &query).await?;
            messages.extend(page.messages);
            cursor = page.response_metadata.next_cursor;
            if cursor.is_empty() {
                break;
            }
        }
        Ok(messages)
    }

    async fn user_info(&self, user_id: &str) -> Result<Option<SlackUser>, SlackApiError> {
        let query = [("user", user_id.to_owned())];
        match self.get::<UserInfoBody>("users.info", &query).await {
            Ok(body) => Ok(body.user),
            Err(SlackApiError::Api { error, .. }) if error == "user_not_found" => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn conversation_name(&self, channel_id: &str) -> Result<Option<String>, SlackApiError> {
        let query = [("channel", channel_id.to_owned())];
        let body: ConversationInfoBody = self.get("conversations.info", &query).await?;
        Ok(body.channel.and_then(|channel| channel.name))
    }

    async fn post_message(&self, message: &MessageTemplate) -> Result<String, SlackApiError> {
        let request = PostMessageRequest {
            channel: &message.channel_id,
            text: &message.fallback_text,
            thread_ts: message.thread_ts.as_deref(),
            blocks: &message.blocks,
        };
        let payload = serde_json::to_value(&request).map_err(|error| SlackApiError::Decode {
            method: "chat.postMessage".to_owned(),
            message: error.to_string(),
        })?;
        let body: PostMessageBody = self.post("chat.postMessage", &payload).await?;
        Ok(body.ts.unwrap_or_default())
    }
}
