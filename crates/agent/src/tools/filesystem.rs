//! Direct file reads and writes

use std::path::Path;

use autoops_history::ResultEnvelope;
use tracing::debug;

/// Write `content` to `path`, creating missing parent directories
pub async fn configure_file(path: &str, content: &str) -> ResultEnvelope {
    let target = Path::new(path);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return ResultEnvelope::error(format!("Failed to create {}: {}", parent.display(), e));
        }
    }

    match tokio::fs::write(target, content).await {
        Ok(()) => {
            debug!("◆ wrote {} bytes to {}", content.len(), path);
            ResultEnvelope::success().with("message", format!("File {} written", path))
        }
        Err(e) => ResultEnvelope::error(format!("Failed to write {}: {}", path, e)),
    }
}

pub async fn read_file(path: &str) -> ResultEnvelope {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            ResultEnvelope::success().with("content", String::from_utf8_lossy(&bytes).into_owned())
        }
        Err(e) => ResultEnvelope::error(format!("Failed to read {}: {}", path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/motd");
        let path = path.to_str().unwrap();

        let written = configure_file(path, "Authorized access only\n").await;
        assert!(written.is_success());
        assert_eq!(written.message(), Some(format!("File {} written", path).as_str()));

        let read = read_file(path).await;
        assert_eq!(read.get_str("content"), Some("Authorized access only\n"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.conf");
        let envelope = read_file(path.to_str().unwrap()).await;
        assert!(!envelope.is_success());
        assert!(envelope.message().unwrap().starts_with("Failed to read"));
    }

    #[tokio::test]
    async fn test_write_to_directory_fails() {
        let dir = TempDir::new().unwrap();
        let envelope = configure_file(dir.path().to_str().unwrap(), "x").await;
        assert!(!envelope.is_success());
    }
}
