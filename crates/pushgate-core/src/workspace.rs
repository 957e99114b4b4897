//! Temporary workspace manager
//!
//! Each push gets its own directory `{root}/{action id}` holding a bare clone
//! of the upstream repository. The directory is created with a single
//! `create_dir`, so two concurrent requests for the same id cannot both own
//! it.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Errors from workspace operations
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The directory for this id is already in use
    #[error("workspace {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// The id cannot be used as a directory name
    #[error("invalid workspace key: {0}")]
    InvalidKey(String),

    /// Filesystem failure
    #[error("workspace I/O error at {}: {source}", path.display())]
    Io {
        /// Path being operated on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    fn io(path: &Path, source: io::Error) -> Self {
        WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Creates and removes per-push directories under one root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Manage directories under `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        WorkspaceManager { root: root.into() }
    }

    /// Parent directory of all workspaces
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that `prepare(id)` would create
    pub fn path_for(&self, id: &str) -> Result<PathBuf, WorkspaceError> {
        if id.is_empty()
            || id == "."
            || id.contains("..")
            || id.contains('/')
            || id.contains('\\')
        {
            return Err(WorkspaceError::InvalidKey(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    /// Create the workspace for `id`, failing if it already exists
    pub async fn prepare(&self, id: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| WorkspaceError::io(&self.root, e))?;

        match fs::create_dir(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Created workspace");
                Ok(path)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(WorkspaceError::AlreadyExists(path))
            }
            Err(e) => Err(WorkspaceError::io(&path, e)),
        }
    }

    /// Recursively delete a workspace. Returns false when it was already gone.
    pub async fn remove(&self, path: &Path) -> Result<bool, WorkspaceError> {
        match fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed workspace");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WorkspaceError::io(path, e)),
        }
    }

    /// Delete every workspace left behind by a previous process.
    ///
    /// Only called at startup, before any request can own a directory.
    pub async fn sweep(&self) -> Result<usize, WorkspaceError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WorkspaceError::io(&self.root, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WorkspaceError::io(&self.root, e))?
        {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale workspace"),
            }
        }

        if removed > 0 {
            info!(removed, root = %self.root.display(), "Swept stale workspaces");
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_and_remove() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path().join(".remote"));

        let path = manager.prepare("a__b").await.unwrap();
        assert!(path.is_dir());
        assert!(path.starts_with(manager.root()));

        assert!(manager.remove(&path).await.unwrap());
        assert!(!path.exists());
        assert!(!manager.remove(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_twice_collides() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        manager.prepare("same").await.unwrap();
        let err = manager.prepare("same").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
    }

    #[test]
    fn test_rejects_traversal() {
        let manager = WorkspaceManager::new("/tmp/ws");
        assert!(manager.path_for("../etc").is_err());
        assert!(manager.path_for("a/b").is_err());
        assert!(manager.path_for("").is_err());
        assert!(manager.path_for("1700000000000").is_ok());
    }

    #[tokio::test]
    async fn test_sweep() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path());
        manager.prepare("one").await.unwrap();
        manager.prepare("two").await.unwrap();

        assert_eq!(manager.sweep().await.unwrap(), 2);
        assert_eq!(manager.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_missing_root() {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(dir.path().join("absent"));
        assert_eq!(manager.sweep().await.unwrap(), 0);
    }
}
