//! Script sandbox
//!
//! Generated scripts live in one fixed directory. A requested filename is
//! reduced to its final component before it is joined to the root, and the
//! resolved path must still sit under the canonical root. Symlinks are
//! refused outright, dangling ones included, so writes and executions never
//! follow a link out of the root.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use autoops_history::ResultEnvelope;
use thiserror::Error;
use tracing::{debug, warn};

use super::shell;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Security violation: '{0}' does not name a file")]
    NoFileName(String),

    #[error("Security violation: {path} is outside the sandbox {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Security violation: {0} is a symlink")]
    Symlink(PathBuf),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    interpreter: PathBuf,
    timeout: Option<Duration>,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>, interpreter: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interpreter: interpreter.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a requested script name to its path inside the sandbox,
    /// creating the sandbox directory if needed.
    pub async fn resolve(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        let file_name = Path::new(requested)
            .file_name()
            .ok_or_else(|| SandboxError::NoFileName(requested.to_string()))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let root = tokio::fs::canonicalize(&self.root).await?;

        let candidate = root.join(file_name);
        match tokio::fs::symlink_metadata(&candidate).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(SandboxError::Symlink(candidate));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if candidate == root || !is_path_within(&candidate, &root) {
            return Err(SandboxError::OutsideRoot {
                path: candidate,
                root,
            });
        }
        Ok(candidate)
    }

    /// Write an executable script into the sandbox
    pub async fn create_script(&self, filename: Option<&str>, content: &str) -> ResultEnvelope {
        let requested = filename.map(str::to_string).unwrap_or_else(generated_name);

        let path = match self.resolve(&requested).await {
            Ok(path) => path,
            Err(e) => {
                warn!("◆ rejected script '{}': {}", requested, e);
                return ResultEnvelope::error(e.to_string());
            }
        };
        let name = display_name(&path);

        if let Err(e) = write_executable(&path, content).await {
            return ResultEnvelope::error(format!("Failed to create script '{}': {}", name, e));
        }
        debug!("◆ script created: {}", path.display());

        ResultEnvelope::success()
            .with("filename", name.clone())
            .with("message", format!("Script '{}' created.", name))
    }

    /// Run a sandboxed script with the fixed interpreter
    pub async fn execute_script(&self, filename: &str) -> ResultEnvelope {
        let path = match self.resolve(filename).await {
            Ok(path) => path,
            Err(e) => {
                warn!("◆ rejected script '{}': {}", filename, e);
                return ResultEnvelope::error(e.to_string());
            }
        };
        let name = display_name(&path);

        if !path.is_file() {
            return ResultEnvelope::error(format!("Script '{}' not found in sandbox", name));
        }

        let argv = vec![
            self.interpreter.to_string_lossy().into_owned(),
            path.to_string_lossy().into_owned(),
        ];
        match shell::run(&argv, Some(&self.root), self.timeout).await {
            Ok(output) => output.into_envelope(&format!("Script '{}'", name)),
            Err(e) => ResultEnvelope::error(format!("Script '{}': {}", name, e)),
        }
    }
}

/// `script_<8 hex>.sh`
pub fn generated_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("script_{}.sh", &id[..8])
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn write_executable(path: &Path, content: &str) -> std::io::Result<()> {
    tokio::fs::write(path, content).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

/// Component-wise prefix check
pub fn is_path_within(path: &Path, root: &Path) -> bool {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
    {
        return false;
    }
    path.starts_with(root)
}
