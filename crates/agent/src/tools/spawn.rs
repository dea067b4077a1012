//! Sub-agent spawning
//!
//! A sub-agent is a fresh process of the same binary running `run` with its
//! own goal and history id. It inherits the parent's resolved agent user,
//! sandbox root and stop signal. The parent does not wait for it or stop it.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use autoops_config::Settings;
use tracing::info;

/// Goal and history id handed to a new agent process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAgentSpec {
    pub goal: String,
    pub history_id: String,
}

impl SubAgentSpec {
    /// Sub-agent with a time-based history id
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            history_id: format!("agent-{}", chrono::Utc::now().timestamp_millis()),
        }
    }
}

/// Capability to start an independent agent
pub trait Spawner: Send + Sync {
    /// Start the agent and return its process id
    fn spawn(&self, spec: &SubAgentSpec) -> std::io::Result<u32>;
}

/// Re-invokes an agent binary as a detached process
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    leading_args: Vec<String>,
    inherited_args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            inherited_args: Vec::new(),
        }
    }

    /// Spawner for the running executable
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Arguments placed before the `run` subcommand, e.g. `--config <path>`
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    /// Pass the parent's resolved identity and paths to every child `run`
    pub fn inherit(mut self, settings: &Settings) -> Self {
        self.inherited_args = vec![
            "--agent-user".to_string(),
            settings.elevation.agent_user.clone(),
            "--sandbox-root".to_string(),
            settings.sandbox_root.to_string_lossy().into_owned(),
            "--stop-signal".to_string(),
            settings.stop_signal.to_string_lossy().into_owned(),
        ];
        self
    }

    pub fn command_line(&self, spec: &SubAgentSpec) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "run".to_string(),
            "--goal".to_string(),
            spec.goal.clone(),
            "--history-id".to_string(),
            spec.history_id.clone(),
        ]);
        args.extend(self.inherited_args.iter().cloned());
        args
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&self, spec: &SubAgentSpec) -> std::io::Result<u32> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.command_line(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();
        info!("◆ spawned sub-agent {} (pid {})", spec.history_id, pid);

        // Reap the child when it exits; the parent never blocks on it
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_id_is_time_based() {
        let spec = SubAgentSpec::new("install monitoring");
        let millis: i64 = spec.history_id.strip_prefix("agent-").unwrap().parse().unwrap();
        assert!(millis > 0);
    }

    #[test]
    fn test_command_line() {
        let spawner = ProcessSpawner::new("/usr/local/bin/autoops")
            .with_leading_args(vec!["--config".to_string(), "/etc/autoops.json".to_string()]);
        let spec = SubAgentSpec {
            goal: "set up fail2ban".to_string(),
            history_id: "agent-1".to_string(),
        };
        assert_eq!(
            spawner.command_line(&spec),
            vec![
                "--config",
                "/etc/autoops.json",
                "run",
                "--goal",
                "set up fail2ban",
                "--history-id",
                "agent-1"
            ]
        );
    }

    #[test]
    fn test_command_line_inherits_parent_settings() {
        let mut settings = Settings::for_root("parent goal", "/srv/autoops");
        settings.elevation.agent_user = "deploy".to_string();

        let spawner = ProcessSpawner::new("/usr/local/bin/autoops").inherit(&settings);
        let spec = SubAgentSpec {
            goal: "rotate logs".to_string(),
            history_id: "agent-2".to_string(),
        };
        assert_eq!(
            spawner.command_line(&spec),
            vec![
                "run",
                "--goal",
                "rotate logs",
                "--history-id",
                "agent-2",
                "--agent-user",
                "deploy",
                "--sandbox-root",
                "/srv/autoops/sandbox",
                "--stop-signal",
                "/srv/autoops/stop-agent.signal"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_detached_process() {
        let spawner = ProcessSpawner::new("true");
        let pid = spawner.spawn(&SubAgentSpec::new("g")).unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn test_spawn_missing_program() {
        let spawner = ProcessSpawner::new("/nonexistent/autoops-binary");
        assert!(spawner.spawn(&SubAgentSpec::new("g")).is_err());
    }
}
