use chrono::SecondsFormat;
use serde::Serialize;
use spinbot_core::SelectionScope;
use spinbot_db::SqlSelectionHistoryRepository;

use crate::commands::{open_database, prepare, CommandResult};

#[derive(Debug, Serialize)]
struct HistoryReport {
    command: &'static str,
    status: &'static str,
    channel: String,
    records: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    id: String,
    selected_user_id: String,
    invoked_by: Option<String>,
    channel_name: Option<String>,
    thread_ts: Option<String>,
    task: Option<String>,
    participants_count: u32,
    created_at: String,
}

pub fn run(channel: &str, limit: usize) -> CommandResult {
    let (config, runtime) = match prepare("history") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let records = SqlSelectionHistoryRepository::new(pool.clone())
            .recent_records(&SelectionScope(channel.to_string()), limit)
            .await
            .map_err(|error| ("history_read", error.to_string(), 6u8));
        pool.close().await;
        records
    });

    let records = match result {
        Ok(records) => records,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("history", error_class, message, exit_code);
        }
    };

    let report = HistoryReport {
        command: "history",
        status: "ok",
        channel: channel.to_string(),
        records: records
            .into_iter()
            .map(|record| HistoryEntry {
                id: record.id.0,
                selected_user_id: record.selected.0,
                invoked_by: record.invoked_by.map(|user| user.0),
                channel_name: record.channel_name,
                thread_ts: record.thread_ts,
                task: record.task,
                participants_count: record.participants_count,
                created_at: record.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            })
            .collect(),
    };
    CommandResult::report("history", &report)
}
