use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::participant::Candidate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Pool comes from the authors (and allowed reactors) of a thread.
    Thread,
    /// Pool comes from the channel roster; status exclusions apply.
    Channel,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Channel => "channel",
        }
    }
}

/// Conversation context that selection history is tracked against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionScope(pub String);

impl fmt::Display for SelectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionRecordId(pub String);

impl SelectionRecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Append-only audit entry written once per completed selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub id: SelectionRecordId,
    pub scope: SelectionScope,
    pub selected: Candidate,
    pub invoked_by: Option<Candidate>,
    pub thread_ts: Option<String>,
    pub channel_name: Option<String>,
    pub task: Option<String>,
    pub participants_count: u32,
    pub created_at: DateTime<Utc>,
}

impl SelectionRecord {
    pub fn new(scope: SelectionScope, selected: Candidate, participants_count: u32) -> Self {
        Self {
            id: SelectionRecordId::generate(),
            scope,
            selected,
            invoked_by: None,
            thread_ts: None,
            channel_name: None,
            task: None,
            participants_count,
            created_at: Utc::now(),
        }
    }
}
