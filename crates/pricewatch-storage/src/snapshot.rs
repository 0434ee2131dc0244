use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pricewatch_core::ProductRecord;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot {path} is not a JSON array of products: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serializing snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("snapshot io on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Cumulative JSON array of every accepted record, unique by title.
///
/// There is no file locking: callers must serialize merges, and two processes
/// must not share one snapshot path.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing file reads as empty.
    pub async fn load(&self) -> Result<Vec<ProductRecord>, SnapshotError> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(SnapshotError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Appends the records whose title is not yet in the file and returns how
    /// many were added. The file is only rewritten when something was added,
    /// or created when it did not exist.
    pub async fn merge(&self, records: &[ProductRecord]) -> Result<usize, SnapshotError> {
        let exists = fs::try_exists(&self.path)
            .await
            .map_err(|source| SnapshotError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut entries = if exists { self.load().await? } else { Vec::new() };

        let mut titles: HashSet<String> = entries.iter().map(|e| e.title.clone()).collect();
        let before = entries.len();
        for record in records {
            if titles.insert(record.title.clone()) {
                entries.push(record.clone());
            }
        }
        let added = entries.len() - before;

        if added > 0 || !exists {
            self.write(&entries).await?;
            info!(path = %self.path.display(), added, total = entries.len(), "snapshot merged");
        }
        Ok(added)
    }

    async fn write(&self, entries: &[ProductRecord]) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "snapshot".to_string());
        let temp_path = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        fs::write(&temp_path, json).await.map_err(io_err)?;
        if let Err(err) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(err));
        }
        Ok(())
    }
}
