use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub planner: PlannerConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// External booking provider endpoint.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: String,
    pub restaurant: String,
    pub api_token: SecretString,
    pub timeout_secs: u64,
}

/// OpenAI-compatible chat-completions endpoint driving the planner.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub turn_budget_secs: u64,
    pub max_availability_search_days: u32,
    pub reject_unknown_cancellation_reason: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub include_trace_in_responses: bool,
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
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://maitred.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            provider: ProviderConfig {
                base_url: "http://localhost:8547".to_string(),
                restaurant: "TheHungryUnicorn".to_string(),
                api_token: String::new().into(),
                timeout_secs: 10,
            },
            planner: PlannerConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "llama3.1".to_string(),
                timeout_secs: 30,
            },
            agent: AgentConfig {
                max_iterations: 15,
                turn_budget_secs: 60,
                max_availability_search_days: 20,
                reject_unknown_cancellation_reason: false,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                include_trace_in_responses: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the TOML file (if any), overlaid with
    /// `MAITRED_*` environment variables, then validated.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = options
            .config_path
            .or_else(|| env::var("MAITRED_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("maitred.toml"));

        match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: FileConfig = toml::from_str(&raw)
                    .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                file.apply(&mut config);
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        }

        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".into()));
        }
        if self.provider.restaurant.is_empty() {
            return Err(ConfigError::Validation("provider.restaurant must not be empty".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Validation("agent.max_iterations must be positive".into()));
        }
        if !(1..=365).contains(&self.agent.max_availability_search_days) {
            return Err(ConfigError::Validation(
                "agent.max_availability_search_days must be between 1 and 365".into(),
            ));
        }
        Ok(())
    }
}

/// Serde mirror of the TOML file; every field optional so partial files
/// overlay cleanly onto defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    database: FileDatabase,
    provider: FileProvider,
    planner: FilePlanner,
    agent: FileAgent,
    server: FileServer,
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileProvider {
    base_url: Option<String>,
    restaurant: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilePlanner {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileAgent {
    max_iterations: Option<u32>,
    turn_budget_secs: Option<u64>,
    max_availability_search_days: Option<u32>,
    reject_unknown_cancellation_reason: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileServer {
    bind_address: Option<String>,
    port: Option<u16>,
    include_trace_in_responses: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl FileConfig {
    fn apply(self, config: &mut AppConfig) {
        let Self { database, provider, planner, agent, server, logging } = self;

        if let Some(url) = database.url {
            config.database.url = url;
        }
        if let Some(max) = database.max_connections {
            config.database.max_connections = max;
        }
        if let Some(secs) = database.timeout_secs {
            config.database.timeout_secs = secs;
        }

        if let Some(base_url) = provider.base_url {
            config.provider.base_url = base_url;
        }
        if let Some(restaurant) = provider.restaurant {
            config.provider.restaurant = restaurant;
        }
        if let Some(token) = provider.api_token {
            config.provider.api_token = token.into();
        }
        if let Some(secs) = provider.timeout_secs {
            config.provider.timeout_secs = secs;
        }

        if let Some(base_url) = planner.base_url {
            config.planner.base_url = base_url;
        }
        if let Some(api_key) = planner.api_key {
            config.planner.api_key = Some(api_key.into());
        }
        if let Some(model) = planner.model {
            config.planner.model = model;
        }
        if let Some(secs) = planner.timeout_secs {
            config.planner.timeout_secs = secs;
        }

        if let Some(iterations) = agent.max_iterations {
            config.agent.max_iterations = iterations;
        }
        if let Some(secs) = agent.turn_budget_secs {
            config.agent.turn_budget_secs = secs;
        }
        if let Some(days) = agent.max_availability_search_days {
            config.agent.max_availability_search_days = days;
        }
        if let Some(reject) = agent.reject_unknown_cancellation_reason {
            config.agent.reject_unknown_cancellation_reason = reject;
        }

        if let Some(bind) = server.bind_address {
            config.server.bind_address = bind;
        }
        if let Some(port) = server.port {
            config.server.port = port;
        }
        if let Some(trace) = server.include_trace_in_responses {
            config.server.include_trace_in_responses = trace;
        }

        if let Some(level) = logging.level {
            config.logging.level = level;
        }
        if let Some(format) = logging.format {
            config.logging.format = format;
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Ok(url) = env::var("MAITRED_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(base_url) = env::var("MAITRED_PROVIDER_BASE_URL") {
        config.provider.base_url = base_url;
    }
    if let Ok(restaurant) = env::var("MAITRED_RESTAURANT") {
        config.provider.restaurant = restaurant;
    }
    if let Ok(token) = env::var("MAITRED_PROVIDER_TOKEN") {
        config.provider.api_token = token.into();
    }
    if let Ok(base_url) = env::var("MAITRED_PLANNER_BASE_URL") {
        config.planner.base_url = base_url;
    }
    if let Ok(api_key) = env::var("MAITRED_PLANNER_API_KEY") {
        config.planner.api_key = Some(api_key.into());
    }
    if let Ok(model) = env::var("MAITRED_PLANNER_MODEL") {
        config.planner.model = model;
    }
    if let Ok(value) = env::var("MAITRED_MAX_ITERATIONS") {
        config.agent.max_iterations = value.parse().map_err(|_| {
            ConfigError::InvalidEnvOverride { key: "MAITRED_MAX_ITERATIONS".into(), value }
        })?;
    }
    if let Ok(value) = env::var("MAITRED_MAX_SEARCH_DAYS") {
        config.agent.max_availability_search_days = value.parse().map_err(|_| {
            ConfigError::InvalidEnvOverride { key: "MAITRED_MAX_SEARCH_DAYS".into(), value }
        })?;
    }
    if let Ok(level) = env::var("MAITRED_LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{AppConfig, LoadOptions};

    #[test]
    fn defaults_match_the_documented_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.agent.max_availability_search_days, 20);
        assert!(!config.agent.reject_unknown_cancellation_reason);
        assert_eq!(config.provider.restaurant, "TheHungryUnicorn");
        assert_eq!(config.provider.timeout_secs, 10);
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            "[provider]\nrestaurant = \"TheGildedSnail\"\n\n[agent]\nmax_iterations = 8\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
        })
        .expect("load");

        assert_eq!(config.provider.restaurant, "TheGildedSnail");
        assert_eq!(config.agent.max_iterations, 8);
        // untouched sections keep defaults
        assert_eq!(config.agent.max_availability_search_days, 20);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("/nonexistent/maitred.toml".into()),
            require_file: true,
        });
        assert!(result.is_err());
    }

    #[test]
    fn zero_iterations_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "[agent]\nmax_iterations = 0\n").expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
        });
        assert!(result.is_err());
    }
}
