use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier (a Slack user id). Compared by exact value.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Candidate(pub String);

impl Candidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Candidate {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Candidate {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji_name: String,
    pub reactors: BTreeSet<Candidate>,
}

impl Reaction {
    pub fn new<I, C>(emoji_name: impl Into<String>, reactors: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Candidate>,
    {
        Self {
            emoji_name: emoji_name.into(),
            reactors: reactors.into_iter().map(Into::into).collect(),
        }
    }
}

/// A conversation message as seen by the collector. `author` is ignored when
/// `is_from_bot` is set, even if present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: Option<Candidate>,
    pub is_from_bot: bool,
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn from_user(author: impl Into<Candidate>) -> Self {
        Self { author: Some(author.into()), is_from_bot: false, reactions: Vec::new() }
    }

    pub fn from_bot() -> Self {
        Self { author: None, is_from_bot: true, reactions: Vec::new() }
    }

    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Candidate,
    pub is_bot: bool,
    pub is_deleted: bool,
    pub status_emoji: String,
    pub status_text: String,
}

impl Profile {
    pub fn human(id: impl Into<Candidate>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn with_status(mut self, emoji: impl Into<String>, text: impl Into<String>) -> Self {
        self.status_emoji = emoji.into();
        self.status_text = text.into();
        self
    }
}
