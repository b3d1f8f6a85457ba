//! Startup manifest: plugin repositories and model descriptors

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use super::artifact::{RepositoryRequest, WeightRequest};
use super::error::ProvisionError;

/// Artifacts provisioned at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub repositories: Vec<RepositoryRequest>,
    pub models: Vec<WeightRequest>,
}

impl Manifest {
    /// Read both manifest files. A missing or malformed file is an error.
    pub async fn load(nodes_path: &Path, models_path: &Path) -> Result<Self, ProvisionError> {
        let nodes = tokio::fs::read_to_string(nodes_path)
            .await
            .map_err(|e| ProvisionError::manifest(nodes_path, e))?;
        let models = tokio::fs::read_to_string(models_path)
            .await
            .map_err(|e| ProvisionError::manifest(models_path, e))?;

        let manifest = Self {
            repositories: parse_repository_list(&nodes),
            models: parse_model_descriptors(&models)
                .map_err(|e| ProvisionError::manifest(models_path, e))?,
        };

        info!(
            repositories = manifest.repositories.len(),
            models = manifest.models.len(),
            "Loaded provisioning manifest"
        );

        Ok(manifest)
    }
}

/// One repository URL per line; blank lines and `#` comments are skipped.
pub fn parse_repository_list(text: &str) -> Vec<RepositoryRequest> {
    let mut seen = HashSet::new();
    let mut repositories = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !seen.insert(line.to_string()) {
            warn!(url = %line, "Duplicate repository in manifest, skipping");
            continue;
        }

        repositories.push(RepositoryRequest::new(line));
    }

    repositories
}

/// JSON array of model descriptors. Exact duplicates are dropped.
pub fn parse_model_descriptors(json: &str) -> Result<Vec<WeightRequest>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let descriptors: Vec<WeightRequest> = serde_json::from_str(json)?;
    let mut models: Vec<WeightRequest> = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        if models.contains(&descriptor) {
            warn!(url = %descriptor.source_url, "Duplicate model in manifest, skipping");
            continue;
        }
        models.push(descriptor);
    }

    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_list_skips_comments_and_blanks() {
        let text = "\
# core nodes
https://github.com/a/one


https://github.com/b/two\r
#https://github.com/c/disabled
";
        let repositories = parse_repository_list(text);

        assert_eq!(
            repositories,
            vec![
                RepositoryRequest::new("https://github.com/a/one"),
                RepositoryRequest::new("https://github.com/b/two"),
            ]
        );
    }

    #[test]
    fn test_parse_repository_list_deduplicates() {
        let repositories =
            parse_repository_list("https://github.com/a/one\nhttps://github.com/a/one\n");
        assert_eq!(repositories.len(), 1);
    }

    #[test]
    fn test_parse_model_descriptors() {
        let json = r#"[
            {"hugging_face_url": "https://host/weights.bin", "destination": "checkpoints"},
            {"hugging_face_url": "https://host/dl?id=1", "destination": "vae", "filename": "vae.pt"}
        ]"#;
        let models = parse_model_descriptors(json).unwrap();

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].filename, None);
        assert_eq!(models[1].explicit_filename(), Some("vae.pt"));
    }

    #[test]
    fn test_parse_model_descriptors_empty_input() {
        assert!(parse_model_descriptors("").unwrap().is_empty());
        assert!(parse_model_descriptors("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_model_descriptors_rejects_malformed() {
        assert!(parse_model_descriptors("{not json").is_err());
        assert!(parse_model_descriptors(r#"[{"destination": "x"}]"#).is_err());
    }

    #[tokio::test]
    async fn test_load_missing_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("custom_models.json");
        std::fs::write(&models, "[]").unwrap();

        let result = Manifest::load(&dir.path().join("custom_nodes.txt"), &models).await;
        assert!(matches!(result, Err(ProvisionError::Manifest { .. })));
    }

    #[tokio::test]
    async fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("custom_nodes.txt");
        let models = dir.path().join("custom_models.json");
        std::fs::write(&nodes, "https://github.com/a/one\n").unwrap();
        std::fs::write(
            &models,
            r#"[{"hugging_face_url": "https://host/w.bin", "destination": "x"}]"#,
        )
        .unwrap();

        let manifest = Manifest::load(&nodes, &models).await.unwrap();
        assert_eq!(manifest.repositories.len(), 1);
        assert_eq!(manifest.models.len(), 1);
    }
}
