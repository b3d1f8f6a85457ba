use std::path::Path;

use serde::{Deserialize, Serialize};

/// Body returned by the pull endpoints on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    pub message: String,
    pub path: String,
}

impl PullResponse {
    pub fn new(message: impl Into<String>, path: &Path) -> Self {
        Self {
            message: message.into(),
            path: path.display().to_string(),
        }
    }
}
