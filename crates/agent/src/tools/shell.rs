//! Command execution and privileged argument vectors

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use autoops_config::Elevation;
use autoops_history::ResultEnvelope;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("command timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}

/// Captured result of one finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Success carries stdout (and stderr when non-empty); failure carries
    /// the exit code and both streams.
    pub fn into_envelope(self, failure_label: &str) -> ResultEnvelope {
        if self.success() {
            let envelope = ResultEnvelope::success().with("stdout", self.stdout);
            if self.stderr.is_empty() {
                envelope
            } else {
                envelope.with("stderr", self.stderr)
            }
        } else {
            let message = match self.exit_code {
                Some(code) => format!("{} failed with exit code {}", failure_label, code),
                None => format!("{} was terminated by a signal", failure_label),
            };
            ResultEnvelope::error(message)
                .with("exit_code", self.exit_code)
                .with("stdout", self.stdout)
                .with("stderr", self.stderr)
        }
    }
}

impl From<CommandError> for ResultEnvelope {
    fn from(err: CommandError) -> Self {
        ResultEnvelope::error(err.to_string())
    }
}

/// Run an argument vector to completion, capturing both streams.
///
/// Never goes through a shell. With a timeout the child is killed when
/// the deadline passes.
pub async fn run(
    argv: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
    debug!("◆ exec: {}", argv.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(result) => result,
            Err(_) => return Err(CommandError::Timeout(limit)),
        },
        None => cmd.output().await,
    }
    .map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run and fold every outcome into an envelope
pub async fn run_to_envelope(
    argv: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> ResultEnvelope {
    match run(argv, cwd, timeout).await {
        Ok(output) => output.into_envelope("Command"),
        Err(e) => e.into(),
    }
}

fn with_prefix(prefix: Vec<String>, rest: &[&str]) -> Vec<String> {
    let mut argv = prefix;
    argv.extend(rest.iter().map(|s| s.to_string()));
    argv
}

/// `apt-get update` then `apt-get -y upgrade`
pub fn update_system_argvs(elevation: &Elevation) -> [Vec<String>; 2] {
    [
        with_prefix(elevation.prefix(), &["apt-get", "update"]),
        with_prefix(elevation.prefix(), &["apt-get", "-y", "upgrade"]),
    ]
}

pub fn install_package_argv(elevation: &Elevation, packages: &[String]) -> Vec<String> {
    let mut argv = with_prefix(elevation.prefix(), &["apt-get", "install", "-y"]);
    argv.extend(packages.iter().cloned());
    argv
}

/// User management always needs root
pub fn create_user_argv(elevation: &Elevation, user: &str, home: &str) -> Vec<String> {
    with_prefix(elevation.root_prefix(), &["useradd", "-m", "-d", home, user])
}

pub fn enable_service_argv(elevation: &Elevation, service: &str) -> Vec<String> {
    with_prefix(elevation.prefix(), &["systemctl", "enable", "--now", service])
}

pub fn open_port_argv(elevation: &Elevation, port: u16) -> Vec<String> {
    with_prefix(elevation.prefix(), &["ufw", "allow", &port.to_string()])
}

/// Arbitrary command text, run through `sh -c`
pub fn shell_argv(cmd: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), cmd.to_string()]
}

/// Run commands in order, stopping at the first failure
pub async fn run_sequence(argvs: &[Vec<String>], timeout: Option<Duration>) -> ResultEnvelope {
    let mut stdout = String::new();
    let mut stderr = String::new();

    for argv in argvs {
        let output = match run(argv, None, timeout).await {
            Ok(output) => output,
            Err(e) => return e.into(),
        };
        if !output.success() {
            return CommandOutput {
                exit_code: output.exit_code,
                stdout: stdout + &output.stdout,
                stderr: stderr + &output.stderr,
            }
            .into_envelope(&format!("'{}'", argv.join(" ")));
        }
        stdout.push_str(&output.stdout);
        stderr.push_str(&output.stderr);
    }

    CommandOutput {
        exit_code: Some(0),
        stdout,
        stderr,
    }
    .into_envelope("Command")
}

/// Disk, memory and load in one envelope
pub async fn system_stats(timeout: Option<Duration>) -> ResultEnvelope {
    let probe = |argv: &'static [&'static str]| async move {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        match run(&argv, None, timeout).await {
            Ok(output) if output.success() => output.stdout,
            Ok(output) => output.stderr,
            Err(e) => e.to_string(),
        }
    };

    let (disk, memory, load) = tokio::join!(
        probe(&["df", "-h"]),
        probe(&["free", "-h"]),
        probe(&["uptime"]),
    );

    ResultEnvelope::success()
        .with("disk", disk)
        .with("memory", memory)
        .with("load", load)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn as_user(user: &str) -> Elevation {
        Elevation {
            agent_user: user.to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_update_system_argvs() {
        let [update, upgrade] = update_system_argvs(&Elevation::default());
        assert_eq!(update, argv(&["sudo", "apt-get", "update"]));
        assert_eq!(upgrade, argv(&["sudo", "apt-get", "-y", "upgrade"]));
    }

    #[test]
    fn test_install_package_argv_as_user() {
        let packages = argv(&["ufw", "fail2ban"]);
        assert_eq!(
            install_package_argv(&as_user("ops"), &packages),
            argv(&["sudo", "-u", "ops", "apt-get", "install", "-y", "ufw", "fail2ban"])
        );
    }

    #[test]
    fn test_create_user_always_root() {
        assert_eq!(
            create_user_argv(&as_user("ops"), "deploy", "/home/deploy"),
            argv(&["sudo", "useradd", "-m", "-d", "/home/deploy", "deploy"])
        );
    }

    #[test]
    fn test_elevation_disabled() {
        let off = Elevation {
            agent_user: "root".to_string(),
            enabled: false,
        };
        assert_eq!(open_port_argv(&off, 22), argv(&["ufw", "allow", "22"]));
        assert_eq!(
            enable_service_argv(&off, "nginx"),
            argv(&["systemctl", "enable", "--now", "nginx"])
        );
    }

    #[test]
    fn test_detail_values_stay_single_arguments() {
        let cmd = enable_service_argv(&Elevation::default(), "nginx; rm -rf /");
        assert_eq!(cmd.len(), 5);
        assert_eq!(cmd[4], "nginx; rm -rf /");
    }

    #[test]
    fn test_failure_envelope() {
        let output = CommandOutput {
            exit_code: Some(100),
            stdout: String::new(),
            stderr: "E: Unable to locate package apache".to_string(),
        };
        let envelope = output.into_envelope("Command");
        assert!(!envelope.is_success());
        assert_eq!(envelope.message(), Some("Command failed with exit code 100"));
        assert_eq!(envelope.get("exit_code"), Some(&serde_json::json!(100)));
    }

    #[tokio::test]
    async fn test_run_captures_output() {
        let output = run(&shell_argv("echo out; echo err >&2"), None, None)
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let result = run(&argv(&["definitely-not-a-real-binary-autoops"]), None, None).await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let result = run(&argv(&["sleep", "5"]), None, Some(Duration::from_millis(100))).await;
        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_sequence_stops_at_first_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let argvs = vec![
            shell_argv("exit 3"),
            shell_argv(&format!("touch {}", marker.display())),
        ];
        let envelope = run_sequence(&argvs, None).await;
        assert!(!envelope.is_success());
        assert!(!marker.exists());
    }
}
