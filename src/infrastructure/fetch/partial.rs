use std::path::{Path, PathBuf};

use tracing::warn;

/// Removes a half-written file or directory when dropped, unless the work
/// that fills it was committed. Dropping covers cancellation too: a
/// per-artifact timeout drops the fetch future mid-write.
#[derive(Debug)]
pub(crate) struct PartialPath {
    path: PathBuf,
    armed: bool,
}

impl PartialPath {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Move the partial path to `target` and stop guarding it
    pub(crate) async fn commit(mut self, target: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, target).await?;
        self.armed = false;
        Ok(())
    }

    /// The path is complete where it is; stop guarding it
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }

    /// Remove the partial path now instead of on drop
    pub(crate) async fn discard(mut self) {
        self.armed = false;
        let removed = match tokio::fs::symlink_metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&self.path).await,
            Ok(_) => tokio::fs::remove_file(&self.path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = removed {
            warn!(path = %self.path.display(), error = %e, "Failed to remove partial artifact");
        }
    }
}

impl Drop for PartialPath {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let removed = match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&self.path),
            Ok(_) => std::fs::remove_file(&self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = removed {
            warn!(path = %self.path.display(), error = %e, "Failed to remove partial artifact");
        }
    }
}
