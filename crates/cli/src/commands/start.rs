use spinbot_core::{SelectionHistoryStore, SelectionScope};
use spinbot_db::{DbPool, SqlSelectionHistoryRepository};

use crate::commands::{open_database, prepare, CommandResult, StepFailure};

/// Preflight for `spinbot-server`: config validates, the database opens and
/// the selection history can be read.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let read = check_history_readable(&pool).await;
        pool.close().await;
        read
    });

    match result {
        Ok(()) => {
            let bot = config.slack.bot_user_id.as_deref().unwrap_or("<resolved at startup>");
            let window = config.selection.history_window;
            CommandResult::success(
                "start",
                format!("preflight passed; bot user {bot}; history window {window}"),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}

async fn check_history_readable(pool: &DbPool) -> Result<(), StepFailure> {
    SqlSelectionHistoryRepository::new(pool.clone())
        .recent_selections(&SelectionScope("preflight".to_string()), 1)
        .await
        .map(|_| ())
        .map_err(|error| ("history_read", error.to_string(), 6u8))
}
