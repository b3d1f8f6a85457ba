use thiserror::Error;

/// Errors raised while provisioning a single artifact or starting the backend.
///
/// The enum is `Clone` so one outcome can be handed to every caller that
/// joined the same in-flight pull.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Invalid source '{url}': {reason}")]
    InvalidSource { url: String, reason: String },

    #[error("Fetch of '{url}' failed: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Installing dependencies of '{name}' failed: {message}")]
    InstallFailed { name: String, message: String },

    #[error("Remote '{url}' returned status {status}")]
    Remote { url: String, status: u16 },

    #[error("Storage error at '{path}': {message}")]
    Storage { path: String, message: String },

    #[error("File '{path}' already exists")]
    AlreadyExists { path: String },

    #[error("'{path}' is not a regular file")]
    NotRegularFile { path: String },

    #[error("Pull of '{url}' timed out after {after:?}")]
    Timeout { url: String, after: std::time::Duration },

    #[error("Manifest '{path}' could not be loaded: {message}")]
    Manifest { path: String, message: String },

    #[error("Backend process error: {message}")]
    Backend { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProvisionError {
    pub fn invalid_source(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn install_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InstallFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn remote(url: impl Into<String>, status: u16) -> Self {
        Self::Remote {
            url: url.into(),
            status,
        }
    }

    pub fn storage(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        Self::Storage {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    pub fn already_exists(path: impl AsRef<std::path::Path>) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().display().to_string(),
        }
    }

    pub fn not_regular_file(path: impl AsRef<std::path::Path>) -> Self {
        Self::NotRegularFile {
            path: path.as_ref().display().to_string(),
        }
    }

    pub fn timeout(url: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            after,
        }
    }

    pub fn manifest(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        Self::Manifest {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
