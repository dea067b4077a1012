//! File-based stop signal

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

/// Graceful shutdown is requested by creating a file at a known path
#[derive(Debug, Clone)]
pub struct StopSignal {
    path: PathBuf,
}

impl StopSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }

    /// Create the sentinel file
    pub async fn raise(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, b"").await
    }

    /// True if the sentinel was present. It is deleted on the way out.
    pub async fn poll_and_consume(&self) -> std::io::Result<bool> {
        if !self.is_raised() {
            return Ok(false);
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        info!("◆ stop signal detected at {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_poll_without_signal() {
        let dir = TempDir::new().unwrap();
        let signal = StopSignal::new(dir.path().join("stop-agent.signal"));
        assert!(!signal.poll_and_consume().await.unwrap());
    }

    #[tokio::test]
    async fn test_consumed_exactly_once() {
        let dir = TempDir::new().unwrap();
        let signal = StopSignal::new(dir.path().join("run/stop-agent.signal"));
        signal.raise().await.unwrap();
        assert!(signal.is_raised());

        assert!(signal.poll_and_consume().await.unwrap());
        assert!(!signal.path().exists());
        assert!(!signal.poll_and_consume().await.unwrap());
    }
}
