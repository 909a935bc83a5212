//! Slack Integration - Socket Mode bot interface
//!
//! This crate connects SpinBot to Slack:
//! - **Socket Mode** (`socket`) - event loop with reconnection and reply delivery
//! - **Events** (`events`) - `app_mention` and `/spinbot` routing
//! - **Mentions** (`mention`) - task extraction and the selection run for a mention
//! - **Web API** (`api`) - `reqwest` client for members, replies, users, and posting
//! - **Directory** (`directory`) - `users.info` backed profile lookups
//! - **Block Kit** (`blocks`) - reply templates
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to the `app_mention` event
//! 3. Add the `/spinbot` slash command
//! 4. Grant `app_mentions:read`, `channels:history`, `channels:read`, `chat:write`, `users:read`
//! 5. Set env vars: `SPINBOT_SLACK_APP_TOKEN`, `SPINBOT_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → SpinMentionService → SelectionEngine
//!                    ↓
//!          chat.postMessage ← MessageTemplate
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod directory;
pub mod events;
pub mod mention;
pub mod socket;

#[cfg(test)]
mod testing;
