//! Provisioning service shared by the startup orchestrator and the API

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{info, instrument, warn};

use crate::domain::{
    ArtifactLocation, ProvisionError, RepositoryRequest, RepositoryWeightRequest, StatusTracker,
    WeightRequest,
};
use crate::infrastructure::fetch::{Dispatch, InFlightRegistry, RepositoryFetcher, WeightFetcher};
use crate::infrastructure::orchestrator::join_all_tasks;

/// Result of provisioning one artifact in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOutcome {
    pub source: String,
    pub result: Result<PathBuf, ProvisionError>,
}

impl ArtifactOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Trait for the provisioning service (for dynamic dispatch in AppState)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProvisioningServiceTrait: Send + Sync {
    /// Clone or update a plugin repository and install its dependencies
    async fn pull_repository(&self, request: RepositoryRequest) -> Result<PathBuf, ProvisionError>;

    /// Download a weight file unless it is already present
    async fn pull_weight(&self, request: WeightRequest) -> Result<PathBuf, ProvisionError>;

    /// Copy a weight file out of a model repository
    async fn clone_weight(
        &self,
        request: RepositoryWeightRequest,
    ) -> Result<PathBuf, ProvisionError>;
}

/// Runs fetches under a per-artifact deadline, deduplicating concurrent pulls
/// of the same location and recording outcomes on the status tracker.
pub struct ProvisioningService {
    repositories: Arc<RepositoryFetcher>,
    weights: Arc<WeightFetcher>,
    status: Arc<StatusTracker>,
    in_flight: InFlightRegistry<PathBuf>,
    timeout: Duration,
}

impl ProvisioningService {
    pub fn new(
        repositories: RepositoryFetcher,
        weights: WeightFetcher,
        status: Arc<StatusTracker>,
        timeout: Duration,
    ) -> Self {
        Self {
            repositories: Arc::new(repositories),
            weights: Arc::new(weights),
            status,
            in_flight: InFlightRegistry::new(),
            timeout,
        }
    }

    /// Pull every repository concurrently and wait for all of them
    pub async fn pull_repositories(
        self: &Arc<Self>,
        requests: Vec<RepositoryRequest>,
    ) -> Vec<ArtifactOutcome> {
        let sources: Vec<String> = requests.iter().map(|r| r.url.clone()).collect();
        let results = join_all_tasks(requests, |request| {
            let service = Arc::clone(self);
            async move { service.pull_repository(request).await }
        })
        .await;

        collect_outcomes(sources, results)
    }

    /// Pull every weight concurrently and wait for all of them
    pub async fn pull_weights(self: &Arc<Self>, requests: Vec<WeightRequest>) -> Vec<ArtifactOutcome> {
        let sources: Vec<String> = requests.iter().map(|r| r.source_url.clone()).collect();
        let results = join_all_tasks(requests, |request| {
            let service = Arc::clone(self);
            async move { service.pull_weight(request).await }
        })
        .await;

        collect_outcomes(sources, results)
    }

    fn report_failure(&self, source: &str, error: &ProvisionError) {
        warn!(source = %source, error = %error, "Pull failed");
        self.status
            .append_message(format!("Failed to pull {}: {}", source, error));
    }

    /// Run `work` for `location`, or join the run already in flight for it.
    /// Status bookkeeping happens once per execution, not once per caller.
    async fn dispatch<F>(
        &self,
        source: &str,
        location: &ArtifactLocation,
        work: F,
        on_success: fn(&StatusTracker),
    ) -> Result<PathBuf, ProvisionError>
    where
        F: Future<Output = Result<PathBuf, ProvisionError>> + Send + 'static,
    {
        let status = Arc::clone(&self.status);
        let deadline = self.timeout;
        let url = source.to_string();

        let guarded = async move {
            let result = match tokio::time::timeout(deadline, work).await {
                Ok(result) => result,
                Err(_) => Err(ProvisionError::timeout(url.clone(), deadline)),
            };

            match &result {
                Ok(path) => {
                    info!(source = %url, path = %path.display(), "Pull finished");
                    on_success(&status);
                }
                Err(e) => {
                    warn!(source = %url, error = %e, "Pull failed");
                    status.append_message(format!("Failed to pull {}: {}", url, e));
                }
            }

            result
        };

        let (result, dispatch) = self.in_flight.run(location.key(), guarded).await;

        if dispatch == Dispatch::Joined {
            self.status.append_message(format!(
                "Pull of {} was already in flight, sharing its outcome",
                location.name()
            ));
        }

        result
    }
}

#[async_trait]
impl ProvisioningServiceTrait for ProvisioningService {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn pull_repository(&self, request: RepositoryRequest) -> Result<PathBuf, ProvisionError> {
        let location = self
            .repositories
            .locate(&request)
            .inspect_err(|e| self.report_failure(&request.url, e))?;

        let fetcher = Arc::clone(&self.repositories);
        let target = location.clone();
        let source = request.url.clone();
        let work = async move { fetcher.fetch_into(&request, &target).await };

        self.dispatch(&source, &location, work, StatusTracker::record_nodes_pull)
            .await
    }

    #[instrument(skip(self, request), fields(url = %request.source_url))]
    async fn pull_weight(&self, request: WeightRequest) -> Result<PathBuf, ProvisionError> {
        let location = self
            .weights
            .locate(&request)
            .inspect_err(|e| self.report_failure(&request.source_url, e))?;

        let fetcher = Arc::clone(&self.weights);
        let target = location.clone();
        let source = request.source_url.clone();
        let work = async move { fetcher.fetch_into(&request, &target).await };

        self.dispatch(&source, &location, work, StatusTracker::record_model_pull)
            .await
    }

    #[instrument(skip(self, request), fields(url = %request.repository_url))]
    async fn clone_weight(
        &self,
        request: RepositoryWeightRequest,
    ) -> Result<PathBuf, ProvisionError> {
        let (repo, filename, location) = self
            .weights
            .locate_in_repository(&request)
            .inspect_err(|e| self.report_failure(&request.repository_url, e))?;

        let fetcher = Arc::clone(&self.weights);
        let target = location.clone();
        let source = request.repository_url.clone();
        let work = async move {
            fetcher
                .fetch_from_repository_into(&request, &repo, &filename, &target)
                .await
        };

        self.dispatch(&source, &location, work, StatusTracker::record_model_pull)
            .await
    }
}

fn collect_outcomes(
    sources: Vec<String>,
    results: Vec<Result<PathBuf, ProvisionError>>,
) -> Vec<ArtifactOutcome> {
    sources
        .into_iter()
        .zip(results)
        .map(|(source, result)| ArtifactOutcome { source, result })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallerConfig;
    use crate::domain::CommandRunner;
    use crate::infrastructure::command::fake::FakeCommandRunner;
    use crate::infrastructure::http::mock::MockHttpClient;
    use bytes::Bytes;

    const REPO: &str = "https://github.com/owner/cool-nodes";

    struct Harness {
        service: Arc<ProvisioningService>,
        status: Arc<StatusTracker>,
        runner: Arc<FakeCommandRunner>,
        root: tempfile::TempDir,
    }

    fn harness(runner: FakeCommandRunner, http: MockHttpClient, timeout: Duration) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let status = Arc::new(StatusTracker::new());
        let runner = Arc::new(runner);
        let command_runner: Arc<dyn CommandRunner> = runner.clone();

        let repositories = RepositoryFetcher::new(
            command_runner.clone(),
            status.clone(),
            root.path().join("custom_nodes"),
            "https://github.com/",
            InstallerConfig::default(),
        );
        let weights = WeightFetcher::new(
            Arc::new(http),
            command_runner,
            status.clone(),
            root.path().join("models"),
            root.path().join("scratch"),
            1024,
        );
        let service = Arc::new(ProvisioningService::new(
            repositories,
            weights,
            status.clone(),
            timeout,
        ));

        Harness {
            service,
            status,
            runner,
            root,
        }
    }

    fn count_messages(status: &StatusTracker, needle: &str) -> usize {
        status
            .snapshot()
            .messages
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }

    #[tokio::test]
    async fn test_concurrent_identical_pulls_clone_once() {
        let h = harness(
            FakeCommandRunner::new().with_delay(Duration::from_millis(100)),
            MockHttpClient::new(),
            Duration::from_secs(10),
        );

        let (a, b) = tokio::join!(
            h.service.pull_repository(RepositoryRequest::new(REPO)),
            h.service.pull_repository(RepositoryRequest::new(REPO)),
        );

        assert_eq!(a, b);
        assert!(a.is_ok());
        assert_eq!(h.runner.count("git clone"), 1);
        assert_eq!(count_messages(&h.status, "pulled successfully"), 1);
        assert_eq!(count_messages(&h.status, "already in flight"), 1);
        assert!(h.status.snapshot().last_nodes_pull.is_some());
    }

    #[tokio::test]
    async fn test_sequential_pulls_update_the_second_time() {
        let h = harness(
            FakeCommandRunner::new(),
            MockHttpClient::new(),
            Duration::from_secs(10),
        );

        h.service
            .pull_repository(RepositoryRequest::new(REPO))
            .await
            .unwrap();
        h.service
            .pull_repository(RepositoryRequest::new(REPO))
            .await
            .unwrap();

        assert_eq!(h.runner.count("git clone"), 1);
        assert_eq!(h.runner.count("git pull"), 1);
    }

    #[tokio::test]
    async fn test_slow_pull_times_out() {
        let h = harness(
            FakeCommandRunner::new().with_delay(Duration::from_secs(5)),
            MockHttpClient::new(),
            Duration::from_millis(50),
        );

        let result = h
            .service
            .pull_repository(RepositoryRequest::new(REPO))
            .await;

        assert!(matches!(result, Err(ProvisionError::Timeout { .. })));
        assert_eq!(count_messages(&h.status, "Failed to pull"), 1);
        assert!(h.status.snapshot().last_nodes_pull.is_none());
    }

    #[tokio::test]
    async fn test_invalid_request_is_reported() {
        let h = harness(
            FakeCommandRunner::new(),
            MockHttpClient::new(),
            Duration::from_secs(10),
        );

        let result = h
            .service
            .pull_weight(WeightRequest::new("https://host/a.bin", "../../etc"))
            .await;

        assert!(matches!(result, Err(ProvisionError::InvalidSource { .. })));
        assert_eq!(count_messages(&h.status, "Failed to pull https://host/a.bin"), 1);
    }

    #[tokio::test]
    async fn test_weight_batch_continues_past_failures() {
        let http = MockHttpClient::new()
            .with_stream_response("https://host/a.bin", vec![Bytes::from_static(b"a")])
            .with_error(
                "https://host/b.bin",
                ProvisionError::remote("https://host/b.bin", 500),
            );
        let h = harness(FakeCommandRunner::new(), http, Duration::from_secs(10));

        let outcomes = h
            .service
            .pull_weights(vec![
                WeightRequest::new("https://host/b.bin", "checkpoints"),
                WeightRequest::new("https://host/a.bin", "checkpoints"),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].source, "https://host/b.bin");
        assert!(!outcomes[0].is_success());
        assert!(outcomes[1].is_success());
        assert!(h.root.path().join("models/checkpoints/a.bin").is_file());
        assert!(h.status.snapshot().last_model_pull.is_some());
    }

    #[tokio::test]
    async fn test_clone_weight_records_model_pull() {
        let h = harness(
            FakeCommandRunner::new().with_clone_file("model.safetensors", b"w".to_vec()),
            MockHttpClient::new(),
            Duration::from_secs(10),
        );

        let path = h
            .service
            .clone_weight(RepositoryWeightRequest {
                repository_url: "https://huggingface.co/org/model".to_string(),
                destination: "vae".to_string(),
                filename: None,
            })
            .await
            .unwrap();

        assert_eq!(path, h.root.path().join("models/vae/model.safetensors"));
        assert!(h.status.snapshot().last_model_pull.is_some());
    }
}
