//! Immutable runtime settings resolved once at startup

use std::path::PathBuf;
use std::time::Duration;

use crate::paths::absolutize;
use crate::{Config, ConfigError, DecisionPolicy, Result};

/// Values supplied on the command line or through the environment.
/// Each one wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub goal: Option<String>,
    pub history_id: Option<String>,
    pub stop_signal: Option<PathBuf>,
    pub sandbox_root: Option<PathBuf>,
    pub agent_user: Option<String>,
}

/// Identity used for privileged actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elevation {
    pub agent_user: String,
    pub enabled: bool,
}

impl Elevation {
    /// Prefix for actions run as the agent user
    pub fn prefix(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        if self.agent_user == "root" {
            vec!["sudo".to_string()]
        } else {
            vec![
                "sudo".to_string(),
                "-u".to_string(),
                self.agent_user.clone(),
            ]
        }
    }

    /// Prefix for actions that always need root (user management)
    pub fn root_prefix(&self) -> Vec<String> {
        if self.enabled {
            vec!["sudo".to_string()]
        } else {
            Vec::new()
        }
    }
}

impl Default for Elevation {
    fn default() -> Self {
        Self {
            agent_user: "root".to_string(),
            enabled: true,
        }
    }
}

/// Everything the runner and executor need, fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct Settings {
    pub goal: String,
    pub history_id: String,
    pub history_dir: PathBuf,
    pub stop_signal: PathBuf,
    pub sandbox_root: PathBuf,
    pub elevation: Elevation,
    pub cycle_delay: Duration,
    pub escalate_after: u32,
    pub command_timeout: Option<Duration>,
    pub script_interpreter: PathBuf,
    pub fetch_timeout: Duration,
    pub fetch_max_chars: usize,
    pub search_max_results: usize,
    pub decision_policy: DecisionPolicy,
}

pub const DEFAULT_HISTORY_ID: &str = "history";

impl Settings {
    /// Merge the config file with overrides and validate the result.
    ///
    /// A blank or absent goal is a configuration error. Relative paths are
    /// anchored at the current directory so the sandbox check always works
    /// against an absolute root.
    pub fn resolve(config: &Config, overrides: Overrides) -> Result<Self> {
        let goal = overrides
            .goal
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .ok_or(ConfigError::MissingGoal)?;

        let history_id = overrides
            .history_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HISTORY_ID.to_string());

        let stop_signal = match overrides.stop_signal {
            Some(path) => absolutize(&path.to_string_lossy())?,
            None => absolutize(&config.agent.stop_signal)?,
        };
        let sandbox_root = match overrides.sandbox_root {
            Some(path) => absolutize(&path.to_string_lossy())?,
            None => absolutize(&config.agent.sandbox_root)?,
        };

        let agent_user = overrides
            .agent_user
            .unwrap_or_else(|| config.agent.agent_user.clone());
        if agent_user.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "agent_user",
                reason: "must not be empty".to_string(),
            });
        }

        if config.search.max_results == 0 || config.search.max_results > 10 {
            return Err(ConfigError::Invalid {
                name: "search.max_results",
                reason: format!("{} is outside 1..=10", config.search.max_results),
            });
        }

        if let DecisionPolicy::Retry { max_attempts: 0, .. } = config.decision.policy {
            return Err(ConfigError::Invalid {
                name: "decision.policy.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            goal,
            history_id,
            history_dir: absolutize(&config.agent.history_dir)?,
            stop_signal,
            sandbox_root,
            elevation: Elevation {
                agent_user,
                enabled: config.agent.elevate,
            },
            cycle_delay: Duration::from_millis(config.agent.cycle_delay_ms),
            escalate_after: config.agent.escalate_after.max(1),
            command_timeout: config.agent.command_timeout_secs.map(Duration::from_secs),
            script_interpreter: PathBuf::from(&config.agent.script_interpreter),
            fetch_timeout: Duration::from_secs(config.web.fetch_timeout_secs),
            fetch_max_chars: config.web.fetch_max_chars,
            search_max_results: config.search.max_results,
            decision_policy: config.decision.policy.clone(),
        })
    }

    /// Settings for a test or embedded run rooted in one directory
    pub fn for_root(goal: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            goal: goal.into(),
            history_id: DEFAULT_HISTORY_ID.to_string(),
            history_dir: root.join("history"),
            stop_signal: root.join("stop-agent.signal"),
            sandbox_root: root.join("sandbox"),
            elevation: Elevation {
                agent_user: "root".to_string(),
                enabled: false,
            },
            cycle_delay: Duration::ZERO,
            escalate_after: 2,
            command_timeout: None,
            script_interpreter: PathBuf::from("/bin/bash"),
            fetch_timeout: Duration::from_secs(15),
            fetch_max_chars: 5000,
            search_max_results: 5,
            decision_policy: DecisionPolicy::FailFast,
        }
    }
}
