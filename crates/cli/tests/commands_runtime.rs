use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use spinbot_cli::commands::{doctor, history, migrate, start, weights};
use spinbot_core::{
    Candidate, FairnessPolicy, SelectionHistoryStore, SelectionRecord, SelectionScope,
};
use spinbot_db::{connect_with_settings, migrations, SqlSelectionHistoryRepository};

const VALID_ENV: &[(&str, &str)] = &[
    ("SPINBOT_SLACK_APP_TOKEN", "xapp-test"),
    ("SPINBOT_SLACK_BOT_TOKEN", "xoxb-test"),
    ("SPINBOT_SLACK_BOT_USER_ID", "UBOT"),
    ("SPINBOT_DATABASE_URL", "sqlite::memory:"),
    ("SPINBOT_DATABASE_MAX_CONNECTIONS", "1"),
];

#[test]
fn start_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().contains("bot user UBOT"));
    });
}

#[test]
fn start_returns_config_failure_without_tokens() {
    with_env(&[], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn weights_for_fresh_channel_are_uniform_base_weights() {
    with_env(VALID_ENV, || {
        let result = weights::run("C1", &["U1".to_string(), "U2".to_string()]);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "weights");
        assert_eq!(payload["history_window"], 20);
        let candidates = payload["candidates"].as_array().expect("candidates array");
        assert_eq!(candidates.len(), 2);
        for candidate in candidates {
            assert_eq!(candidate["weight"], 100.0);
            assert_eq!(candidate["probability"], 0.5);
            assert_eq!(candidate["recent_picks"], 0);
        }
    });
}

#[test]
fn weights_reports_config_failure_without_tokens() {
    with_env(&[], || {
        let result = weights::run("C1", &[]);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn history_for_fresh_channel_is_empty() {
    with_env(VALID_ENV, || {
        let result = history::run("C1", 5);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "history");
        assert_eq!(payload["channel"], "C1");
        assert_eq!(payload["records"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn doctor_json_lists_every_check() {
    with_env(VALID_ENV, || {
        let payload = parse_payload(&doctor::run(true));

        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "config_validation",
                "slack_token_readiness",
                "selection_policy",
                "database_connectivity"
            ]
        );
        assert_eq!(payload["checks"][1]["status"], "pass");
    });
}

#[tokio::test]
async fn weights_report_penalizes_recent_picks_most_recent_first() {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    let repository = SqlSelectionHistoryRepository::new(pool.clone());
    let scope = SelectionScope("C1".to_string());
    for picked in ["U1", "U2"] {
        repository
            .append(SelectionRecord::new(scope.clone(), Candidate::from(picked), 3))
            .await
            .expect("append");
    }

    let users = ["U1", "U2", "U3"].map(String::from);
    let report = weights::build_report(&pool, &FairnessPolicy::default(), 20, "C1", &users)
        .await
        .expect("report");

    assert_eq!(report.recent, vec!["U2".to_string(), "U1".to_string()]);
    let weight_of = |user: &str| {
        report
            .candidates
            .iter()
            .find(|candidate| candidate.user_id == user)
            .map(|candidate| candidate.weight)
            .expect("candidate present")
    };
    assert_eq!(weight_of("U2"), 50.0);
    assert_eq!(weight_of("U1"), 52.5);
    assert_eq!(weight_of("U3"), 100.0);

    let total: f64 = report.candidates.iter().map(|candidate| candidate.probability).sum();
    assert!((total - 1.0).abs() < 1e-9);

    pool.close().await;
}

#[tokio::test]
async fn weights_report_defaults_candidates_to_recent_picks() {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    let repository = SqlSelectionHistoryRepository::new(pool.clone());
    let scope = SelectionScope("C9".to_string());
    for picked in ["U5", "U5", "U4"] {
        repository
            .append(SelectionRecord::new(scope.clone(), Candidate::from(picked), 2))
            .await
            .expect("append");
    }

    let report = weights::build_report(&pool, &FairnessPolicy::default(), 20, "C9", &[])
        .await
        .expect("report");

    let ids: Vec<&str> = report.candidates.iter().map(|c| c.user_id.as_str()).collect();
    assert_eq!(ids, vec!["U4", "U5"]);
    assert_eq!(report.candidates[1].recent_picks, 2);

    pool.close().await;
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SPINBOT_DATABASE_URL",
        "SPINBOT_DATABASE_MAX_CONNECTIONS",
        "SPINBOT_DATABASE_TIMEOUT_SECS",
        "SPINBOT_SLACK_APP_TOKEN",
        "SPINBOT_SLACK_BOT_TOKEN",
        "SPINBOT_SLACK_BOT_USER_ID",
        "SPINBOT_SLACK_API_BASE_URL",
        "SPINBOT_SLACK_REQUEST_TIMEOUT_SECS",
        "SPINBOT_SELECTION_EXCLUDED_STATUS_MARKERS",
        "SPINBOT_SELECTION_ALLOWED_REACTION_EMOJIS",
        "SPINBOT_SELECTION_HISTORY_WINDOW",
        "SPINBOT_SELECTION_BASE_WEIGHT",
        "SPINBOT_SELECTION_MAX_PENALTY",
        "SPINBOT_SELECTION_PENALTY_STEP",
        "SPINBOT_SELECTION_MIN_WEIGHT",
        "SPINBOT_EXCLUDED_STATUS_EMOJIS",
        "SPINBOT_ALLOWED_REACTION_EMOJIS",
        "SPINBOT_DIRECTORY_CACHE_TTL_SECS",
        "SPINBOT_SERVER_BIND_ADDRESS",
        "SPINBOT_SERVER_HEALTH_CHECK_PORT",
        "SPINBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SPINBOT_LOGGING_LEVEL",
        "SPINBOT_LOGGING_FORMAT",
        "SPINBOT_LOG_LEVEL",
        "SPINBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
