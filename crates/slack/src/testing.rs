use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{SlackApiError, SlackMessage, SlackUser, SlackWebApi};
use crate::blocks::MessageTemplate;

fn failure(method: &str) -> SlackApiError {
    SlackApiError::Api { method: method.to_owned(), error: "fatal_error".to_owned() }
}

/// Scripted Web API keyed by channel id (members, names) and thread ts (replies).
#[derive(Default)]
pub struct FakeSlackApi {
    pub bot_id: String,
    pub members: HashMap<String, Vec<String>>,
    pub replies: HashMap<String, Vec<SlackMessage>>,
    pub users: HashMap<String, SlackUser>,
    pub channel_names: HashMap<String, String>,
    pub fail_members: bool,
    pub fail_replies: bool,
    pub failing_users: HashSet<String>,
    pub fail_channel_info: bool,
    pub fail_post: bool,
    pub posted: Mutex<Vec<MessageTemplate>>,
}

impl FakeSlackApi {
    pub fn with_user(mut self, user: SlackUser) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn with_humans(mut self, ids: &[&str]) -> Self {
        for id in ids {
            let user = SlackUser { id: (*id).to_owned(), ..SlackUser::default() };
            self.users.insert(user.id.clone(), user);
        }
        self
    }

    pub fn with_members(mut self, channel_id: &str, ids: &[&str]) -> Self {
        let members = ids.iter().map(|id| (*id).to_owned()).collect();
        self.members.insert(channel_id.to_owned(), members);
        self
    }

    pub fn with_replies(mut self, thread_ts: &str, messages: Vec<SlackMessage>) -> Self {
        self.replies.insert(thread_ts.to_owned(), messages);
        self
    }

    pub fn posted(&self) -> Vec<MessageTemplate> {
        self.posted.lock().map(|posted| posted.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SlackWebApi for FakeSlackApi {
    async fn auth_test(&self) -> Result<String, SlackApiError> {
        Ok(self.bot_id.clone())
    }

    async fn conversation_members(&self, channel_id: &str) -> Result<Vec<String>, SlackApiError> {
        if self.fail_members {
            return Err(failure("conversations.members"));
        }
        Ok(self.members.get(channel_id).cloned().unwrap_or_default())
    }

    async fn conversation_replies(
        &self,
        _channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        if self.fail_replies {
            return Err(failure("conversations.replies"));
        }
        Ok(self.replies.get(thread_ts).cloned().unwrap_or_default())
    }

    async fn user_info(&self, user_id: &str) -> Result<Option<SlackUser>, SlackApiError> {
        if self.failing_users.contains(user_id) {
            return Err(failure("users.info"));
        }
        Ok(self.users.get(user_id).cloned())
    }

    async fn conversation_name(&self, channel_id: &str) -> Result<Option<String>, SlackApiError> {
        if self.fail_channel_info {
            return Err(failure("conversations.info"));
        }
        Ok(self.channel_names.get(channel_id).cloned())
    }

    async fn post_message(&self, message: &MessageTemplate) -> Result<String, SlackApiError> {
        if self.fail_post {
            return Err(failure("chat.postMessage"));
        }
        if let Ok(mut posted) = self.posted.lock() {
            posted.push(message.clone());
        }
        Ok("1700000000.999999".to_owned())
    }
}
