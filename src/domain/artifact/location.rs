use std::fmt;
use std::path::{Path, PathBuf};

use super::request::{RepositoryRequest, WeightRequest};
use super::validation::{repository_dir_name, validate_destination, weight_file_name};
use crate::domain::error::ProvisionError;

/// Resolved on-disk path of an artifact.
///
/// A weight counts as present iff a regular file exists at this path; no size
/// or checksum is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactLocation {
    path: PathBuf,
}

impl ArtifactLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<models_root>/<destination>/<filename>`
    pub fn for_weight(models_root: &Path, request: &WeightRequest) -> Result<Self, ProvisionError> {
        let destination = validate_destination(&request.destination)?;
        let filename = weight_file_name(&request.source_url, request.explicit_filename())?;

        Ok(Self::new(models_root.join(destination).join(filename)))
    }

    /// `<nodes_root>/<repo>`
    pub fn for_repository(
        nodes_root: &Path,
        request: &RepositoryRequest,
        host_prefix: &str,
    ) -> Result<Self, ProvisionError> {
        let name = repository_dir_name(&request.url, host_prefix)?;
        Ok(Self::new(nodes_root.join(name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Final path component, used in status messages
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Key under which concurrent pulls of this location are deduplicated
    pub fn key(&self) -> String {
        self.path.display().to_string()
    }

    pub async fn is_present_file(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    pub async fn is_present_dir(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
