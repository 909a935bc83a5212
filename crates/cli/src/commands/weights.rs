use std::collections::BTreeSet;

use serde::Serialize;
use spinbot_core::{Candidate, FairnessPolicy, SelectionScope};
use spinbot_db::{DbPool, SqlSelectionHistoryRepository};

use crate::commands::{open_database, prepare, CommandResult, StepFailure};

#[derive(Debug, Serialize)]
pub struct WeightsReport {
    pub command: &'static str,
    pub status: &'static str,
    pub channel: String,
    pub history_window: usize,
    /// Most recent pick first.
    pub recent: Vec<String>,
    pub candidates: Vec<CandidateWeight>,
}

#[derive(Debug, Serialize)]
pub struct CandidateWeight {
    pub user_id: String,
    pub weight: f64,
    pub probability: f64,
    pub recent_picks: usize,
}

pub fn run(channel: &str, users: &[String]) -> CommandResult {
    let (config, runtime) = match prepare("weights") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let policy = config.selection.fairness_policy();
    let window = config.selection.history_window;
    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let report = build_report(&pool, &policy, window, channel, users).await;
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::report("weights", &report),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("weights", error_class, message, exit_code)
        }
    }
}

/// Computes the weights the next spin in `channel` would use. With no
/// explicit `users` the candidates are everyone picked inside the window.
pub async fn build_report(
    pool: &DbPool,
    policy: &FairnessPolicy,
    window: usize,
    channel: &str,
    users: &[String],
) -> Result<WeightsReport, StepFailure> {
    let repository = SqlSelectionHistoryRepository::new(pool.clone());
    let records = repository
        .recent_records(&SelectionScope(channel.to_string()), window)
        .await
        .map_err(|error| ("history_read", error.to_string(), 6u8))?;
    let recent: Vec<Candidate> = records.into_iter().map(|record| record.selected).collect();

    let eligible: Vec<Candidate> = if users.is_empty() {
        recent.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect()
    } else {
        users.iter().map(|user| Candidate::new(user.trim())).collect()
    };

    let table = policy.weights(&eligible, &recent);
    let candidates = table
        .iter()
        .map(|(candidate, weight)| CandidateWeight {
            user_id: candidate.to_string(),
            weight,
            probability: table.probability(candidate),
            recent_picks: recent.iter().filter(|picked| *picked == candidate).count(),
        })
        .collect();

    Ok(WeightsReport {
        command: "weights",
        status: "ok",
        channel: channel.to_string(),
        history_window: window,
        recent: recent.iter().map(ToString::to_string).collect(),
        candidates,
    })
}
