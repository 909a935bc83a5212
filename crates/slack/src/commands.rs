use thiserror::Error;

use crate::blocks::{self, MessageTemplate};

pub const SPINBOT_COMMAND: &str = "/spinbot";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub message_ts: Option<String>,
    pub request_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

/// `/spinbot` never picks anyone; slash commands cannot be issued inside a
/// thread, so the reply teaches the mention form instead. Any text after the
/// command is ignored.
pub fn respond_to_slash_command(
    payload: &SlashCommandPayload,
) -> Result<MessageTemplate, CommandParseError> {
    if !payload.command.trim().eq_ignore_ascii_case(SPINBOT_COMMAND) {
        return Err(CommandParseError::UnsupportedCommand(payload.command.clone()));
    }

    Ok(blocks::usage_tip_message(&payload.channel_id, payload.message_ts.as_deref()))
}
