//! Provisioning requests, shared by the manifest and the pull endpoints

use serde::{Deserialize, Serialize};

/// Clone-or-update request for a plugin repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRequest {
    #[serde(rename = "repo_url", alias = "url")]
    pub url: String,
}

impl RepositoryRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Download request for a single weight file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRequest {
    #[serde(rename = "hugging_face_url", alias = "url")]
    pub source_url: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl WeightRequest {
    pub fn new(source_url: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            destination: destination.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Explicit filename, with an empty string treated as absent
    pub fn explicit_filename(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Weight extracted out of a cloned repository rather than downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryWeightRequest {
    #[serde(rename = "hugging_face_url", alias = "url")]
    pub repository_url: String,
    pub destination: String,
    /// File inside the repository. Defaults to `<repo>.safetensors`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl RepositoryWeightRequest {
    pub fn explicit_filename(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
