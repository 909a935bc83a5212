use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::participant::Candidate;
use crate::selection::{FairnessPolicy, SelectionSettings};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub selection: SelectionConfig,
    pub directory: DirectoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    /// Resolved through `auth.test` at startup when unset.
    pub bot_user_id: Option<String>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectionConfig {
    pub excluded_status_markers: Vec<String>,
    pub allowed_reaction_emojis: Vec<String>,
    pub history_window: usize,
    pub base_weight: f64,
    pub max_penalty: f64,
    pub penalty_step: f64,
    pub min_weight: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_bot_user_id: Option<String>,
    pub excluded_status_markers: Option<Vec<String>>,
    pub allowed_reaction_emojis: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let fairness = FairnessPolicy::default();
        Self {
            excluded_status_markers: Vec::new(),
            allowed_reaction_emojis: Vec::new(),
            history_window: fairness.history_window(),
            base_weight: fairness.base_weight,
            max_penalty: fairness.max_penalty,
            penalty_step: fairness.penalty_step,
            min_weight: fairness.min_weight,
        }
    }
}

impl SelectionConfig {
    pub fn fairness_policy(&self) -> FairnessPolicy {
        FairnessPolicy {
            base_weight: self.base_weight,
            max_penalty: self.max_penalty,
            penalty_step: self.penalty_step,
            min_weight: self.min_weight,
        }
    }

    pub fn settings(&self, bot_id: Candidate) -> SelectionSettings {
        SelectionSettings {
            bot_id,
            excluded_status_markers: self.excluded_status_markers.clone(),
            allowed_reaction_emojis: self.allowed_reaction_emojis.iter().cloned().collect(),
            history_window: self.history_window,
            fairness: self.fairness_policy(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://spinbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                bot_user_id: None,
                api_base_url: "https://slack.com/api".to_string(),
                request_timeout_secs: 10,
            },
            selection: SelectionConfig::default(),
            directory: DirectoryConfig { cache_ttl_secs: 300 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("spinbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = secret_value(app_token);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(bot_user_id) = slack.bot_user_id {
                self.slack.bot_user_id = Some(bot_user_id);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = slack.request_timeout_secs {
                self.slack.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(selection) = patch.selection {
            if let Some(markers) = selection.excluded_status_markers {
                self.selection.excluded_status_markers = markers;
            }
            if let Some(emojis) = selection.allowed_reaction_emojis {
                self.selection.allowed_reaction_emojis = emojis;
            }
            if let Some(history_window) = selection.history_window {
                self.selection.history_window = history_window;
            }
            if let Some(base_weight) = selection.base_weight {
                self.selection.base_weight = base_weight;
            }
            if let Some(max_penalty) = selection.max_penalty {
                self.selection.max_penalty = max_penalty;
            }
            if let Some(penalty_step) = selection.penalty_step {
                self.selection.penalty_step = penalty_step;
            }
            if let Some(min_weight) = selection.min_weight {
                self.selection.min_weight = min_weight;
            }
        }

        if let Some(directory) = patch.directory {
            if let Some(cache_ttl_secs) = directory.cache_ttl_secs {
                self.directory.cache_ttl_secs = cache_ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SPINBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SPINBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("SPINBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SPINBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("SPINBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SPINBOT_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("SPINBOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("SPINBOT_SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = Some(value);
        }
        if let Some(value) = read_env("SPINBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("SPINBOT_SLACK_REQUEST_TIMEOUT_SECS") {
            self.slack.request_timeout_secs =
                parse_env("SPINBOT_SLACK_REQUEST_TIMEOUT_SECS", &value)?;
        }

        let markers = read_env("SPINBOT_SELECTION_EXCLUDED_STATUS_MARKERS")
            .or_else(|| read_env("SPINBOT_EXCLUDED_STATUS_EMOJIS"));
        if let Some(value) = markers {
            self.selection.excluded_status_markers = split_list(&value);
        }
        let emojis = read_env("SPINBOT_SELECTION_ALLOWED_REACTION_EMOJIS")
            .or_else(|| read_env("SPINBOT_ALLOWED_REACTION_EMOJIS"));
        if let Some(value) = emojis {
            self.selection.allowed_reaction_emojis = split_list(&value);
        }
        if let Some(value) = read_env("SPINBOT_SELECTION_HISTORY_WINDOW") {
            self.selection.history_window = parse_env("SPINBOT_SELECTION_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("SPINBOT_SELECTION_BASE_WEIGHT") {
            self.selection.base_weight = parse_env("SPINBOT_SELECTION_BASE_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("SPINBOT_SELECTION_MAX_PENALTY") {
            self.selection.max_penalty = parse_env("SPINBOT_SELECTION_MAX_PENALTY", &value)?;
        }
        if let Some(value) = read_env("SPINBOT_SELECTION_PENALTY_STEP") {
            self.selection.penalty_step = parse_env("SPINBOT_SELECTION_PENALTY_STEP", &value)?;
        }
        if let Some(value) = read_env("SPINBOT_SELECTION_MIN_WEIGHT") {
            self.selection.min_weight = parse_env("SPINBOT_SELECTION_MIN_WEIGHT", &value)?;
        }

        if let Some(value) = read_env("SPINBOT_DIRECTORY_CACHE_TTL_SECS") {
            self.directory.cache_ttl_secs = parse_env("SPINBOT_DIRECTORY_CACHE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("SPINBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SPINBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_env("SPINBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("SPINBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("SPINBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SPINBOT_LOGGING_LEVEL").or_else(|| read_env("SPINBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SPINBOT_LOGGING_FORMAT").or_else(|| read_env("SPINBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(bot_user_id) = overrides.slack_bot_user_id {
            self.slack.bot_user_id = Some(bot_user_id);
        }
        if let Some(markers) = overrides.excluded_status_markers {
            self.selection.excluded_status_markers = markers;
        }
        if let Some(emojis) = overrides.allowed_reaction_emojis {
            self.selection.allowed_reaction_emojis = emojis;
        }
    }

    fn normalize(&mut self) {
        self.selection.excluded_status_markers = self
            .selection
            .excluded_status_markers
            .iter()
            .map(|marker| marker.trim().to_string())
            .filter(|marker| !marker.is_empty())
            .collect();
        self.selection.allowed_reaction_emojis = self
            .selection
            .allowed_reaction_emojis
            .iter()
            .map(|emoji| normalize_emoji_name(emoji))
            .filter(|emoji| !emoji.is_empty())
            .collect();
        self.slack.bot_user_id = self
            .slack
            .bot_user_id
            .take()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_selection(&self.selection)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Reaction names arrive from Slack without colons (`raised_hand`); config
/// values are accepted either way.
pub fn normalize_emoji_name(value: &str) -> String {
    value.trim().trim_matches(':').to_string()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("spinbot.toml"), PathBuf::from("config/spinbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if !slack.api_base_url.starts_with("http://") && !slack.api_base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if slack.request_timeout_secs == 0 || slack.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "slack.request_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_selection(selection: &SelectionConfig) -> Result<(), ConfigError> {
    if selection.history_window == 0 || selection.history_window > 1_000 {
        return Err(ConfigError::Validation(
            "selection.history_window must be in range 1..=1000".to_string(),
        ));
    }

    selection
        .fairness_policy()
        .validate()
        .map_err(|error| ConfigError::Validation(format!("selection weights: {error}")))
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    selection: Option<SelectionPatch>,
    directory: Option<DirectoryPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    bot_user_id: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SelectionPatch {
    excluded_status_markers: Option<Vec<String>>,
    allowed_reaction_emojis: Option<Vec<String>>,
    history_window: Option<usize>,
    base_weight: Option<f64>,
    max_penalty: Option<f64>,
    penalty_step: Option<f64>,
    min_weight: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryPatch {
    cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
