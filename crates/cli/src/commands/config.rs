use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use maitred_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_token = redact_token(config.provider.api_token.expose_secret());
    let planner_key = if config.planner.api_key.is_some() { "<redacted>" } else { "<unset>" };

    // (key path, rendered value, env override if the loader honors one)
    let entries: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("MAITRED_DATABASE_URL")),
        ("database.max_connections", config.database.max_connections.to_string(), None),
        ("database.timeout_secs", config.database.timeout_secs.to_string(), None),
        ("provider.base_url", config.provider.base_url.clone(), Some("MAITRED_PROVIDER_BASE_URL")),
        ("provider.restaurant", config.provider.restaurant.clone(), Some("MAITRED_RESTAURANT")),
        ("provider.api_token", api_token, Some("MAITRED_PROVIDER_TOKEN")),
        ("provider.timeout_secs", config.provider.timeout_secs.to_string(), None),
        ("planner.base_url", config.planner.base_url.clone(), Some("MAITRED_PLANNER_BASE_URL")),
        ("planner.model", config.planner.model.clone(), Some("MAITRED_PLANNER_MODEL")),
        ("planner.api_key", planner_key.to_string(), Some("MAITRED_PLANNER_API_KEY")),
        ("planner.timeout_secs", config.planner.timeout_secs.to_string(), None),
        (
            "agent.max_iterations",
            config.agent.max_iterations.to_string(),
            Some("MAITRED_MAX_ITERATIONS"),
        ),
        ("agent.turn_budget_secs", config.agent.turn_budget_secs.to_string(), None),
        (
            "agent.max_availability_search_days",
            config.agent.max_availability_search_days.to_string(),
            Some("MAITRED_MAX_SEARCH_DAYS"),
        ),
        (
            "agent.reject_unknown_cancellation_reason",
            config.agent.reject_unknown_cancellation_reason.to_string(),
            None,
        ),
        ("server.bind_address", config.server.bind_address.clone(), None),
        ("server.port", config.server.port.to_string(), None),
        (
            "server.include_trace_in_responses",
            config.server.include_trace_in_responses.to_string(),
            None,
        ),
        ("logging.level", config.logging.level.clone(), Some("MAITRED_LOG_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), None),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        let source = field_source(
            key,
            env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {key} = {value} (source: {source})"));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("MAITRED_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let root = PathBuf::from("maitred.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/maitred.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    "<redacted>".to_string()
}
