use std::collections::HashMap;

use tokio::sync::RwLock;

use spinbot_core::domain::participant::Candidate;
use spinbot_core::domain::selection::{SelectionRecord, SelectionScope};
use spinbot_core::errors::ApplicationError;
use spinbot_core::history::SelectionHistoryStore;

/// Process-local history, used by tests and the `weights` CLI dry run.
/// Records are kept in append order per scope.
#[derive(Default)]
pub struct InMemorySelectionHistory {
    records: RwLock<HashMap<String, Vec<SelectionRecord>>>,
}

impl InMemorySelectionHistory {
    pub async fn len(&self, scope: &SelectionScope) -> usize {
        self.records.read().await.get(&scope.0).map_or(0, Vec::len)
    }

    pub async fn records(&self, scope: &SelectionScope) -> Vec<SelectionRecord> {
        self.records.read().await.get(&scope.0).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SelectionHistoryStore for InMemorySelectionHistory {
    async fn recent_selections(
        &self,
        scope: &SelectionScope,
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let records = self.records.read().await;
        Ok(records
            .get(&scope.0)
            .map(|entries| {
                entries.iter().rev().take(limit).map(|record| record.selected.clone()).collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, record: SelectionRecord) -> Result<(), ApplicationError> {
        let mut records = self.records.write().await;
        records.entry(record.scope.0.clone()).or_default().push(record);
        Ok(())
    }
}
