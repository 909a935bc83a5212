use thiserror::Error;

use spinbot_core::errors::ApplicationError;

pub mod memory;
pub mod selection;

pub use memory::InMemorySelectionHistory;
pub use selection::SqlSelectionHistoryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn into_history_unavailable(self) -> ApplicationError {
        ApplicationError::HistoryUnavailable(self.to_string())
    }

    pub fn into_record_write_failed(self) -> ApplicationError {
        ApplicationError::RecordWriteFailed(self.to_string())
    }
}
