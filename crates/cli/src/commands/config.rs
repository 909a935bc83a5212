use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use spinbot_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct FileDoc {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let path = detect_config_path();
    let file = FileDoc { doc: load_config_file_doc(path.as_deref()), path };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: &str, env_keys: &[&str]| {
        lines.push(render_line(key, value, field_source(key, env_keys, &file)));
    };

    push("database.url", &config.database.url, &["SPINBOT_DATABASE_URL"]);
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["SPINBOT_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["SPINBOT_DATABASE_TIMEOUT_SECS"],
    );

    push(
        "slack.app_token",
        &redact_token(config.slack.app_token.expose_secret()),
        &["SPINBOT_SLACK_APP_TOKEN"],
    );
    push(
        "slack.bot_token",
        &redact_token(config.slack.bot_token.expose_secret()),
        &["SPINBOT_SLACK_BOT_TOKEN"],
    );
    push(
        "slack.bot_user_id",
        config.slack.bot_user_id.as_deref().unwrap_or("<auth.test>"),
        &["SPINBOT_SLACK_BOT_USER_ID"],
    );
    push("slack.api_base_url", &config.slack.api_base_url, &["SPINBOT_SLACK_API_BASE_URL"]);
    push(
        "slack.request_timeout_secs",
        &config.slack.request_timeout_secs.to_string(),
        &["SPINBOT_SLACK_REQUEST_TIMEOUT_SECS"],
    );

    push(
        "selection.excluded_status_markers",
        &render_list(&config.selection.excluded_status_markers),
        &["SPINBOT_SELECTION_EXCLUDED_STATUS_MARKERS", "SPINBOT_EXCLUDED_STATUS_EMOJIS"],
    );
    push(
        "selection.allowed_reaction_emojis",
        &render_list(&config.selection.allowed_reaction_emojis),
        &["SPINBOT_SELECTION_ALLOWED_REACTION_EMOJIS", "SPINBOT_ALLOWED_REACTION_EMOJIS"],
    );
    push(
        "selection.history_window",
        &config.selection.history_window.to_string(),
        &["SPINBOT_SELECTION_HISTORY_WINDOW"],
    );
    push(
        "selection.base_weight",
        &config.selection.base_weight.to_string(),
        &["SPINBOT_SELECTION_BASE_WEIGHT"],
    );
    push(
        "selection.max_penalty",
        &config.selection.max_penalty.to_string(),
        &["SPINBOT_SELECTION_MAX_PENALTY"],
    );
    push(
        "selection.penalty_step",
        &config.selection.penalty_step.to_string(),
        &["SPINBOT_SELECTION_PENALTY_STEP"],
    );
    push(
        "selection.min_weight",
        &config.selection.min_weight.to_string(),
        &["SPINBOT_SELECTION_MIN_WEIGHT"],
    );

    push(
        "directory.cache_ttl_secs",
        &config.directory.cache_ttl_secs.to_string(),
        &["SPINBOT_DIRECTORY_CACHE_TTL_SECS"],
    );

    push("server.bind_address", &config.server.bind_address, &["SPINBOT_SERVER_BIND_ADDRESS"]);
    push(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        &["SPINBOT_SERVER_HEALTH_CHECK_PORT"],
    );

    push("logging.level", &config.logging.level, &["SPINBOT_LOGGING_LEVEL", "SPINBOT_LOG_LEVEL"]);
    push(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["SPINBOT_LOGGING_FORMAT", "SPINBOT_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("spinbot.toml"), PathBuf::from("config/spinbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], file: &FileDoc) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = &file.doc {
        if contains_path(doc, key_path) {
            let file_path = file
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn render_list(values: &[String]) -> String {
    if values.is_empty() {
        return "<none>".to_string();
    }
    values.join(",")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
