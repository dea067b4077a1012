//! Common test utilities for autoops integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated home, config and agent directories
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".autoops");
        std::fs::create_dir_all(&config_dir)?;
        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.temp_dir.path().join("history")
    }

    pub fn sandbox_dir(&self) -> PathBuf {
        self.temp_dir.path().join("sandbox")
    }

    pub fn stop_file(&self) -> PathBuf {
        self.temp_dir.path().join("stop-agent.signal")
    }

    /// Command with HOME pointed at the temp dir and no ambient secrets
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_autoops"));
        cmd.env("HOME", self.temp_dir.path())
            .env_remove("OPENAI_API_KEY")
            .env_remove("GOOGLE_API_KEY")
            .env_remove("CSE_ID")
            .env_remove("GOAL")
            .env_remove("HISTORY_ID")
            .env_remove("AGENT_USER")
            .env_remove("RUST_LOG")
            .current_dir(self.temp_dir.path());
        cmd
    }

    /// Command that already carries `--config <file>`
    pub fn with_config(&self) -> Command {
        let mut cmd = self.command();
        cmd.arg("--config").arg(self.config_file());
        cmd
    }

    /// Config with every agent path inside the temp dir
    pub fn create_config(&self) -> anyhow::Result<()> {
        let config = serde_json::json!({
            "decision": { "api_base": "http://127.0.0.1:9" },
            "agent": {
                "history_dir": self.history_dir(),
                "stop_signal": self.stop_file(),
                "sandbox_root": self.sandbox_dir(),
                "elevate": false,
                "cycle_delay_ms": 0
            }
        });
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    pub fn write_history(&self, id: &str, content: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.history_dir())?;
        std::fs::write(self.history_dir().join(format!("{}.json", id)), content)?;
        Ok(())
    }
}
