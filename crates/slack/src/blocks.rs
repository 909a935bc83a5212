use serde::Serialize;

use spinbot_core::domain::participant::Candidate;

pub const NO_THREAD_MESSAGES: &str = "❌ Could not find any messages in the thread.";
pub const NO_THREAD_HUMANS: &str =
    "❌ No other users found in the thread. I need at least one human to pick! 🤖";
pub const CHANNEL_MEMBERS_UNAVAILABLE: &str = "❌ Could not fetch channel members.";
pub const EVERYONE_BUSY: &str =
    "❌ No available users in the channel. Everyone seems to be busy! 😅";
pub const GENERIC_ERROR: &str = "❌ An error occurred. Please try again later.";
pub const USAGE_TIP: &str = "💡 *Tip:* Slash commands don't work in threads. Instead, mention me in a thread like this:\n`@SpinBot who has to pre-order lunch?`\nor\n`@SpinBot wer muss essen vorbestellen?`";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
}

/// A reply ready for `chat.postMessage`. Every SpinBot reply is threaded
/// under the triggering message when `thread_ts` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    channel_id: String,
    thread_ts: Option<String>,
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(channel_id: impl Into<String>, fallback_text: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts: None,
            fallback_text: fallback_text.into(),
            blocks: Vec::new(),
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            channel_id: self.channel_id,
            thread_ts: self.thread_ts,
            fallback_text: self.fallback_text,
            blocks: self.blocks,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

fn threaded_notice(
    channel_id: &str,
    thread_ts: &str,
    block_id: &str,
    text: &str,
) -> MessageTemplate {
    MessageBuilder::new(channel_id, text)
        .in_thread(thread_ts)
        .section(block_id, |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn selection_message(
    channel_id: &str,
    thread_ts: &str,
    selected: &Candidate,
    task: &str,
) -> MessageTemplate {
    let text = format!("🎲 <@{selected}> {task}");
    threaded_notice(channel_id, thread_ts, "spin.result.v1", &text)
}

pub fn no_thread_messages(channel_id: &str, thread_ts: &str) -> MessageTemplate {
    threaded_notice(channel_id, thread_ts, "spin.empty.thread_messages.v1", NO_THREAD_MESSAGES)
}

pub fn no_thread_humans(channel_id: &str, thread_ts: &str) -> MessageTemplate {
    threaded_notice(channel_id, thread_ts, "spin.empty.thread_humans.v1", NO_THREAD_HUMANS)
}

pub fn channel_members_unavailable(channel_id: &str, thread_ts: &str) -> MessageTemplate {
    threaded_notice(
        channel_id,
        thread_ts,
        "spin.empty.channel_members.v1",
        CHANNEL_MEMBERS_UNAVAILABLE,
    )
}

pub fn everyone_busy(channel_id: &str, thread_ts: &str) -> MessageTemplate {
    threaded_notice(channel_id, thread_ts, "spin.empty.everyone_busy.v1", EVERYONE_BUSY)
}

pub fn error_message(channel_id: &str, thread_ts: &str) -> MessageTemplate {
    threaded_notice(channel_id, thread_ts, "spin.error.v1", GENERIC_ERROR)
}

/// `thread_ts` is the slash command's message timestamp when Slack provides one.
pub fn usage_tip_message(channel_id: &str, thread_ts: Option<&str>) -> MessageTemplate {
    let builder = MessageBuilder::new(channel_id, USAGE_TIP);
    let builder = match thread_ts {
        Some(ts) => builder.in_thread(ts),
        None => builder,
    };
    builder
        .section("spin.usage_tip.v1", |section| {
            section.mrkdwn(USAGE_TIP);
        })
        .build()
}
