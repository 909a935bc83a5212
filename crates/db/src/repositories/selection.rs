use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use spinbot_core::domain::participant::Candidate;
use spinbot_core::domain::selection::{SelectionRecord, SelectionRecordId, SelectionScope};
use spinbot_core::errors::ApplicationError;
use spinbot_core::history::SelectionHistoryStore;

use super::RepositoryError;
use crate::DbPool;

const RECORD_COLUMNS: &str = "id, channel_id, channel_name, thread_ts, invoked_by, \
                              selected_user_id, task, participants_count, created_at";

pub struct SqlSelectionHistoryRepository {
    pool: DbPool,
}

impl SqlSelectionHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Full records for a scope, newest first.
    pub async fn recent_records(
        &self,
        scope: &SelectionScope,
        limit: usize,
    ) -> Result<Vec<SelectionRecord>, RepositoryError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM selection_record
             WHERE channel_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?"
        );
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&query)
            .bind(&scope.0)
            .bind(clamp_limit(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }

    async fn insert(&self, record: &SelectionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO selection_record (id, channel_id, channel_name, thread_ts, invoked_by,
                                           selected_user_id, task, participants_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(&record.scope.0)
        .bind(&record.channel_name)
        .bind(&record.thread_ts)
        .bind(record.invoked_by.as_ref().map(Candidate::as_str))
        .bind(record.selected.as_str())
        .bind(&record.task)
        .bind(i64::from(record.participants_count))
        .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn selected_ids(
        &self,
        scope: &SelectionScope,
        limit: usize,
    ) -> Result<Vec<Candidate>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT selected_user_id FROM selection_record
             WHERE channel_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(&scope.0)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("selected_user_id")
                    .map(Candidate)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .collect()
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<SelectionRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let channel_id: String =
        row.try_get("channel_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let channel_name: Option<String> =
        row.try_get("channel_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let thread_ts: Option<String> =
        row.try_get("thread_ts").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let invoked_by: Option<String> =
        row.try_get("invoked_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let selected_user_id: String =
        row.try_get("selected_user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let task: Option<String> =
        row.try_get("task").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let participants_count: i64 =
        row.try_get("participants_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at `{created_at_str}`: {e}")))?;
    let participants_count = u32::try_from(participants_count)
        .map_err(|_| RepositoryError::Decode(format!("participants_count {participants_count}")))?;

    Ok(SelectionRecord {
        id: SelectionRecordId(id),
        scope: SelectionScope(channel_id),
        selected: Candidate(selected_user_id),
        invoked_by: invoked_by.map(Candidate),
        thread_ts,
        channel_name,
        task,
        participants_count,
        created_at,
    })
}

#[async_trait::async_trait]
impl SelectionHistoryStore for SqlSelectionHistoryRepository {
    async fn recent_selections(
        &self,
        scope: &SelectionScope,
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.selected_ids(scope, limit).await.map_err(RepositoryError::into_history_unavailable)
    }

    async fn append(&self, record: SelectionRecord) -> Result<(), ApplicationError> {
        self.insert(&record).await.map_err(RepositoryError::into_record_write_failed)
    }
}
