//! Configuration management for autoops
//!
//! Loads the JSON config file and resolves it, together with command-line
//! overrides, into the immutable [`Settings`] value handed to the runner.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;
pub mod settings;

pub use paths::{config_path, data_dir, history_dir, sandbox_dir};
pub use settings::{Elevation, Overrides, Settings};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("no goal supplied (use --goal or GOAL)")]
    MissingGoal,

    #[error("no decision service API key configured")]
    MissingApiKey,

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// What the runner does when the decision service returns an unusable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// Abort the run on the first failure
    #[default]
    FailFast,
    /// Retry with linear backoff before giving up
    Retry { max_attempts: u32, backoff_ms: u64 },
}

/// Decision service (chat completions) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub policy: DecisionPolicy,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            policy: DecisionPolicy::default(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

/// Web search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub cse_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cse_id: String::new(),
            api_base: None,
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

/// Agent runtime parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
    #[serde(default = "default_stop_signal")]
    pub stop_signal: String,
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: String,
    #[serde(default = "default_agent_user")]
    pub agent_user: String,
    #[serde(default = "default_true")]
    pub elevate: bool,
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,
    #[serde(default = "default_escalate_after")]
    pub escalate_after: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    #[serde(default = "default_script_interpreter")]
    pub script_interpreter: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_dir: default_history_dir(),
            stop_signal: default_stop_signal(),
            sandbox_root: default_sandbox_root(),
            agent_user: default_agent_user(),
            elevate: true,
            cycle_delay_ms: default_cycle_delay_ms(),
            escalate_after: default_escalate_after(),
            command_timeout_secs: None,
            script_interpreter: default_script_interpreter(),
        }
    }
}

fn default_history_dir() -> String {
    "~/.autoops/history".to_string()
}

fn default_stop_signal() -> String {
    "stop-agent.signal".to_string()
}

fn default_sandbox_root() -> String {
    "~/.autoops/sandbox".to_string()
}

fn default_agent_user() -> String {
    "root".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cycle_delay_ms() -> u64 {
    1000
}

fn default_escalate_after() -> u32 {
    2
}

fn default_script_interpreter() -> String {
    "/bin/bash".to_string()
}

/// Web fetch limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_max_chars: default_fetch_max_chars(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_fetch_max_chars() -> usize {
    5000
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("◆ reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Decision service API key, falling back to `OPENAI_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        non_empty(&self.decision.api_key).or_else(|| env_non_empty("OPENAI_API_KEY"))
    }

    /// Decision service API key, or a configuration error
    pub fn require_api_key(&self) -> Result<String> {
        self.api_key().ok_or(ConfigError::MissingApiKey)
    }

    /// Search API key, falling back to `GOOGLE_API_KEY`
    pub fn search_api_key(&self) -> Option<String> {
        non_empty(&self.search.api_key).or_else(|| env_non_empty("GOOGLE_API_KEY"))
    }

    /// Search engine id, falling back to `CSE_ID`
    pub fn search_cse_id(&self) -> Option<String> {
        non_empty(&self.search.cse_id).or_else(|| env_non_empty("CSE_ID"))
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Write the default config (if absent) and create the agent directories
pub async fn init_at(config_file: &Path) -> Result<Config> {
    if config_file.exists() {
        warn!("◆ config already exists at {:?}", config_file);
    } else {
        Config::default().save_to(config_file).await?;
        info!("◆ config written to {:?}", config_file);
    }

    let config = Config::load_from(config_file).await?;
    for dir in [&config.agent.history_dir, &config.agent.sandbox_root] {
        let dir = paths::absolutize(dir)?;
        paths::ensure_dir(&dir).await?;
        info!("◆ directory ready at {:?}", dir);
    }

    Ok(config)
}

/// Initialize at the default config location
pub async fn init() -> Result<Config> {
    init_at(&config_path()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_serialization() {
        let json = serde_json::to_value(DecisionPolicy::FailFast).unwrap();
        assert_eq!(json["mode"], "fail_fast");

        let policy: DecisionPolicy =
            serde_json::from_str(r#"{"mode":"retry","max_attempts":3,"backoff_ms":250}"#).unwrap();
        assert_eq!(
            policy,
            DecisionPolicy::Retry {
                max_attempts: 3,
                backoff_ms: 250
            }
        );
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("k"), Some("k".to_string()));
    }
}
