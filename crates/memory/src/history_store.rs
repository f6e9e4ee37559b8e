use crate::types::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bounded, file-backed request history. Oldest entries are dropped first.
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P, max_entries: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries oldest first. A missing file is an empty history.
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, MemoryError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let file: HistoryFile = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} history entries from {:?}", file.entries.len(), self.path);
        Ok(file.entries)
    }

    /// Like `load`, but a corrupted file reads as empty history.
    async fn load_or_empty(&self) -> Result<Vec<HistoryEntry>, MemoryError> {
        match self.load().await {
            Ok(entries) => Ok(entries),
            Err(MemoryError::Serialization(e)) => {
                tracing::warn!("History file {:?} is corrupted, ignoring it: {}", self.path, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn append(&self, entry: HistoryEntry) -> Result<(), MemoryError> {
        let mut entries = self.load_or_empty().await?;

        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        self.save(entries).await
    }

    /// Most recent `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, MemoryError> {
        let mut entries = self.load_or_empty().await?;
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    pub async fn clear(&self) -> Result<(), MemoryError> {
        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
            tracing::info!("Cleared history at {:?}", self.path);
        }
        Ok(())
    }

    async fn save(&self, entries: Vec<HistoryEntry>) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(&HistoryFile { entries })?;

        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("Saved history to {:?}", self.path);
        Ok(())
    }
}
