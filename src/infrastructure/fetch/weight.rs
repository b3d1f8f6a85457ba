//! Weight file acquisition: streamed downloads and repository extraction

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use super::copy::copy_regular_file;
use super::partial::PartialPath;
use super::repository::git_clone;
use crate::domain::artifact::{model_repository_name, validate_destination, validate_file_name};
use crate::domain::{
    ArtifactLocation, CommandRunner, ProvisionError, RepositoryWeightRequest, StatusTracker,
    WeightRequest,
};
use crate::infrastructure::http::{ByteStream, HttpClientTrait};

/// Ensures single weight files exist under the models root
pub struct WeightFetcher {
    http: Arc<dyn HttpClientTrait>,
    runner: Arc<dyn CommandRunner>,
    status: Arc<StatusTracker>,
    models_root: PathBuf,
    scratch_root: PathBuf,
    copy_buffer_size: usize,
}

impl WeightFetcher {
    pub fn new(
        http: Arc<dyn HttpClientTrait>,
        runner: Arc<dyn CommandRunner>,
        status: Arc<StatusTracker>,
        models_root: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
        copy_buffer_size: usize,
    ) -> Self {
        Self {
            http,
            runner,
            status,
            models_root: models_root.into(),
            scratch_root: scratch_root.into(),
            copy_buffer_size,
        }
    }

    pub fn locate(&self, request: &WeightRequest) -> Result<ArtifactLocation, ProvisionError> {
        ArtifactLocation::for_weight(&self.models_root, request)
    }

    pub async fn fetch(&self, request: &WeightRequest) -> Result<PathBuf, ProvisionError> {
        let location = self.locate(request)?;
        self.fetch_into(request, &location).await
    }

    /// Download `request` to `location` unless a file is already there.
    ///
    /// The body is streamed into `<name>.part` and renamed into place once
    /// complete. The partial file is removed on failure and on cancellation.
    #[instrument(skip(self, request), fields(url = %request.source_url))]
    pub async fn fetch_into(
        &self,
        request: &WeightRequest,
        location: &ArtifactLocation,
    ) -> Result<PathBuf, ProvisionError> {
        let name = location.name();
        let dir = parent_dir(location.path());

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProvisionError::storage(&dir, e))?;

        if location.is_present_file().await {
            self.status
                .append_message(format!("Model {} already present", name));
            return Ok(location.path().to_path_buf());
        }

        let body = self.http.get_stream(&request.source_url).await?;
        self.status
            .append_message(format!("Successfully started download of {}", name));

        let partial = PartialPath::new(dir.join(format!("{}.part", name)));
        self.status.append_message(format!("Writing model {}", name));

        let written = write_stream(body, partial.path()).await?;

        partial
            .commit(location.path())
            .await
            .map_err(|e| ProvisionError::storage(location.path(), e))?;

        info!(path = %location, bytes = written, "Model downloaded");
        self.status
            .append_message(format!("Successfully downloaded model {}", name));

        Ok(location.path().to_path_buf())
    }

    /// Resolve `<models_root>/<destination>/<filename>` for a repository-derived
    /// weight, together with the repository name and the file to extract.
    pub fn locate_in_repository(
        &self,
        request: &RepositoryWeightRequest,
    ) -> Result<(String, String, ArtifactLocation), ProvisionError> {
        let repo = model_repository_name(&request.repository_url)?;
        let filename = match request.explicit_filename() {
            Some(name) => name.to_string(),
            None => format!("{}.safetensors", repo),
        };
        validate_file_name(&filename)
            .map_err(|reason| ProvisionError::invalid_source(&request.repository_url, reason))?;

        let destination = validate_destination(&request.destination)?;
        let location = ArtifactLocation::new(self.models_root.join(destination).join(&filename));

        Ok((repo, filename, location))
    }

    pub async fn fetch_from_repository(
        &self,
        request: &RepositoryWeightRequest,
    ) -> Result<PathBuf, ProvisionError> {
        let (repo, filename, location) = self.locate_in_repository(request)?;
        self.fetch_from_repository_into(request, &repo, &filename, &location)
            .await
    }

    /// Shallow-clone the repository into a scratch directory and copy one
    /// file out of it. Refuses to overwrite an existing destination.
    #[instrument(skip(self, request, location), fields(url = %request.repository_url))]
    pub async fn fetch_from_repository_into(
        &self,
        request: &RepositoryWeightRequest,
        repo: &str,
        filename: &str,
        location: &ArtifactLocation,
    ) -> Result<PathBuf, ProvisionError> {
        let dir = parent_dir(location.path());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProvisionError::storage(&dir, e))?;

        if fs::try_exists(location.path()).await.unwrap_or(false) {
            return Err(ProvisionError::already_exists(location.path()));
        }

        fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(|e| ProvisionError::storage(&self.scratch_root, e))?;
        let scratch = PartialPath::new(
            self.scratch_root
                .join(format!("{}-{}", repo, uuid::Uuid::new_v4())),
        );

        self.status.append_message(format!(
            "Cloning {} to extract {}",
            request.repository_url, filename
        ));

        let result = self
            .extract(&request.repository_url, scratch.path(), filename, location)
            .await;
        scratch.discard().await;

        let copied = result?;
        info!(path = %location, bytes = copied, "Model copied from repository");
        self.status
            .append_message(format!("Successfully copied model {}", filename));

        Ok(location.path().to_path_buf())
    }

    async fn extract(
        &self,
        url: &str,
        scratch: &Path,
        filename: &str,
        location: &ArtifactLocation,
    ) -> Result<u64, ProvisionError> {
        git_clone(self.runner.as_ref(), url, scratch, true).await?;
        copy_regular_file(&scratch.join(filename), location.path(), self.copy_buffer_size).await
    }
}

async fn write_stream(mut body: ByteStream, path: &Path) -> Result<u64, ProvisionError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| ProvisionError::storage(path, e))?;
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ProvisionError::storage(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| ProvisionError::storage(path, e))?;

    Ok(written)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommandOutput;
    use crate::infrastructure::command::fake::FakeCommandRunner;
    use crate::infrastructure::http::mock::MockHttpClient;
    use crate::infrastructure::http::HttpClient;
    use bytes::Bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        fetcher: WeightFetcher,
        status: Arc<StatusTracker>,
        models: tempfile::TempDir,
        scratch: tempfile::TempDir,
    }

    fn harness(http: Arc<dyn HttpClientTrait>, runner: Arc<dyn CommandRunner>) -> Harness {
        let models = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let status = Arc::new(StatusTracker::new());
        let fetcher = WeightFetcher::new(
            http,
            runner,
            status.clone(),
            models.path(),
            scratch.path(),
            4096,
        );
        Harness {
            fetcher,
            status,
            models,
            scratch,
        }
    }

    #[tokio::test]
    async fn test_downloads_to_destination_with_derived_name() {
        let url = "https://host/files/weights.bin";
        let http = Arc::new(MockHttpClient::new().with_stream_response(
            url,
            vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def")],
        ));
        let h = harness(http, Arc::new(FakeCommandRunner::new()));

        let path = h
            .fetcher
            .fetch(&WeightRequest::new(url, "checkpoints"))
            .await
            .unwrap();

        assert_eq!(path, h.models.path().join("checkpoints/weights.bin"));
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
        assert!(!h.models.path().join("checkpoints/weights.bin.part").exists());
        assert_eq!(
            h.status.snapshot().messages.last().unwrap(),
            "Successfully downloaded model weights.bin"
        );
    }

    #[tokio::test]
    async fn test_present_file_skips_network() {
        let url = "https://host/files/weights.bin";
        let http = Arc::new(MockHttpClient::new());
        let h = harness(http.clone(), Arc::new(FakeCommandRunner::new()));
        std::fs::create_dir_all(h.models.path().join("checkpoints")).unwrap();
        std::fs::write(h.models.path().join("checkpoints/weights.bin"), b"old").unwrap();

        let path = h
            .fetcher
            .fetch(&WeightRequest::new(url, "checkpoints"))
            .await
            .unwrap();

        assert!(http.requests().is_empty());
        assert_eq!(std::fs::read(path).unwrap(), b"old");
        assert_eq!(
            h.status.snapshot().messages,
            vec!["Model weights.bin already present"]
        );
    }

    #[tokio::test]
    async fn test_query_string_is_stripped_from_file_name() {
        let url = "https://host/path/to/file.bin?token=abc";
        let http = Arc::new(
            MockHttpClient::new().with_stream_response(url, vec![Bytes::from_static(b"x")]),
        );
        let h = harness(http, Arc::new(FakeCommandRunner::new()));

        let path = h.fetcher.fetch(&WeightRequest::new(url, "X")).await.unwrap();

        assert_eq!(path, h.models.path().join("X/file.bin"));
    }

    #[tokio::test]
    async fn test_remote_error_leaves_nothing_behind() {
        let url = "https://host/gated.bin";
        let http = Arc::new(MockHttpClient::new().with_error(url, ProvisionError::remote(url, 401)));
        let h = harness(http, Arc::new(FakeCommandRunner::new()));

        let result = h.fetcher.fetch(&WeightRequest::new(url, "vae")).await;

        assert!(matches!(result, Err(ProvisionError::Remote { status: 401, .. })));
        assert_eq!(std::fs::read_dir(h.models.path().join("vae")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_transfer_removes_partial_file() {
        let url = "https://host/big.bin";
        let http = Arc::new(
            MockHttpClient::new().with_broken_stream(url, vec![Bytes::from_static(b"half")]),
        );
        let h = harness(http, Arc::new(FakeCommandRunner::new()));

        let result = h.fetcher.fetch(&WeightRequest::new(url, "unet")).await;

        assert!(matches!(result, Err(ProvisionError::FetchFailed { .. })));
        assert!(!h.models.path().join("unet/big.bin").exists());
        assert!(!h.models.path().join("unet/big.bin.part").exists());
    }

    #[tokio::test]
    async fn test_cancelled_transfer_removes_partial_file() {
        let url = "https://host/slow.bin";
        let http = Arc::new(
            MockHttpClient::new().with_stalled_stream(url, vec![Bytes::from_static(b"partial")]),
        );
        let h = harness(http, Arc::new(FakeCommandRunner::new()));
        let request = WeightRequest::new(url, "unet");

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            h.fetcher.fetch(&request),
        )
        .await;

        assert!(result.is_err());
        assert!(!h.models.path().join("unet/slow.bin").exists());
        assert!(!h.models.path().join("unet/slow.bin.part").exists());
    }

    #[tokio::test]
    async fn test_invalid_destination_is_rejected() {
        let h = harness(
            Arc::new(MockHttpClient::new()),
            Arc::new(FakeCommandRunner::new()),
        );

        let result = h
            .fetcher
            .fetch(&WeightRequest::new("https://host/a.bin", "../escape"))
            .await;

        assert!(matches!(result, Err(ProvisionError::InvalidSource { .. })));
    }

    #[tokio::test]
    async fn test_downloads_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/resolve/main/weights.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64 * 1024]))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(Arc::new(HttpClient::new()), Arc::new(FakeCommandRunner::new()));
        let request = WeightRequest::new(
            format!("{}/repo/resolve/main/weights.bin?download=true", server.uri()),
            "checkpoints",
        );

        let first = h.fetcher.fetch(&request).await.unwrap();
        let second = h.fetcher.fetch(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::metadata(first).unwrap().len(), 64 * 1024);
    }

    #[tokio::test]
    async fn test_copies_default_file_out_of_repository() {
        let runner = Arc::new(
            FakeCommandRunner::new().with_clone_file("sdxl-vae.safetensors", b"tensor".to_vec()),
        );
        let h = harness(Arc::new(MockHttpClient::new()), runner.clone());
        let request = RepositoryWeightRequest {
            repository_url: "https://huggingface.co/stabilityai/sdxl-vae".to_string(),
            destination: "vae".to_string(),
            filename: None,
        };

        let path = h.fetcher.fetch_from_repository(&request).await.unwrap();

        assert_eq!(path, h.models.path().join("vae/sdxl-vae.safetensors"));
        assert_eq!(std::fs::read(&path).unwrap(), b"tensor");
        assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);

        let clone = &runner.calls()[0];
        assert_eq!(clone.args[..3], ["clone", "--depth", "1"]);
    }

    #[tokio::test]
    async fn test_repository_copy_refuses_existing_destination() {
        let runner = Arc::new(FakeCommandRunner::new());
        let h = harness(Arc::new(MockHttpClient::new()), runner.clone());
        std::fs::create_dir_all(h.models.path().join("vae")).unwrap();
        std::fs::write(h.models.path().join("vae/model.safetensors"), b"keep").unwrap();
        let request = RepositoryWeightRequest {
            repository_url: "https://huggingface.co/org/model".to_string(),
            destination: "vae".to_string(),
            filename: None,
        };

        let result = h.fetcher.fetch_from_repository(&request).await;

        assert!(matches!(result, Err(ProvisionError::AlreadyExists { .. })));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repository_copy_requires_regular_file() {
        let runner = Arc::new(FakeCommandRunner::new());
        let h = harness(Arc::new(MockHttpClient::new()), runner);
        let request = RepositoryWeightRequest {
            repository_url: "https://huggingface.co/org/model".to_string(),
            destination: "vae".to_string(),
            filename: Some("missing.safetensors".to_string()),
        };

        let result = h.fetcher.fetch_from_repository(&request).await;

        assert!(matches!(result, Err(ProvisionError::Storage { .. })));
        assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_repository_clone_failure_is_fetch_failed() {
        let runner = Arc::new(
            FakeCommandRunner::new()
                .with_outcome("git clone", CommandOutput::failure(128, "Repository not found")),
        );
        let h = harness(Arc::new(MockHttpClient::new()), runner);
        let request = RepositoryWeightRequest {
            repository_url: "https://huggingface.co/org/model".to_string(),
            destination: "vae".to_string(),
            filename: None,
        };

        let result = h.fetcher.fetch_from_repository(&request).await;

        assert!(matches!(result, Err(ProvisionError::FetchFailed { .. })));
        assert!(!h.models.path().join("vae/model.safetensors").exists());
    }
}
