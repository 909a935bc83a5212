use async_trait::async_trait;

use crate::domain::participant::Candidate;
use crate::domain::selection::{SelectionRecord, SelectionScope};
use crate::errors::ApplicationError;

/// Durable, append-only log of past selections.
///
/// `recent_selections` must return at most `limit` entries ordered
/// most-recent-first. Failures are reported as
/// [`ApplicationError::HistoryUnavailable`] for reads and
/// [`ApplicationError::RecordWriteFailed`] for appends.
#[async_trait]
pub trait SelectionHistoryStore: Send + Sync {
    async fn recent_selections(
        &self,
        scope: &SelectionScope,
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError>;

    async fn append(&self, record: SelectionRecord) -> Result<(), ApplicationError>;
}
