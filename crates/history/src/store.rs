//! One pretty-printed JSON file per history id

use std::path::{Path, PathBuf};

use autoops_config::paths::safe_filename;
use tracing::debug;

use crate::{History, Result};

/// Durable history storage rooted in one directory
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a history id
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_filename(id)))
    }

    /// Write the whole history, replacing any previous file
    pub async fn save(&self, id: &str, history: &History) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(id);
        let content = serde_json::to_string_pretty(history)?;
        tokio::fs::write(&path, content).await?;
        debug!("◆ saved history {} ({} entries)", id, history.len());
        Ok(())
    }

    /// Read a history; a missing file is an empty history
    pub async fn load(&self, id: &str) -> Result<History> {
        let path = self.path_for(id);
        if !path.exists() {
            debug!("◆ no stored history for {}, starting fresh", id);
            return Ok(History::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let history: History = serde_json::from_str(&content)?;
        debug!("◆ loaded history {} ({} entries)", id, history.len());
        Ok(history)
    }

    pub async fn exists(&self, id: &str) -> bool {
        tokio::fs::try_exists(self.path_for(id))
            .await
            .unwrap_or(false)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Stored ids (file stems), sorted
    pub async fn list(&self) -> Vec<String> {
        let mut ids = Vec::new();

        if let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(stem) = name.strip_suffix(".json") {
                        ids.push(stem.to_string());
                    }
                }
            }
        }

        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_sanitizes_id() {
        let store = HistoryStore::new("/var/lib/autoops");
        assert_eq!(
            store.path_for("agent:1/2"),
            PathBuf::from("/var/lib/autoops/agent_1_2.json")
        );
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        assert!(store.load("nothing").await.unwrap().is_empty());
        assert!(!store.exists("nothing").await);
    }

    #[tokio::test]
    async fn test_save_creates_dir() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/history"));
        store.save("h", &History::new()).await.unwrap();
        assert!(store.exists("h").await);
    }
}
