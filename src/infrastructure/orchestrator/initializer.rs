//! Startup provisioning followed by the backend launch

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::supervisor::SupervisedProcess;
use crate::config::BackendConfig;
use crate::domain::{LifecycleState, Manifest, ProvisionError, StatusTracker};
use crate::infrastructure::services::{ArtifactOutcome, ProvisioningService};

/// Per-artifact outcomes of both fetch phases
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub repositories: Vec<ArtifactOutcome>,
    pub models: Vec<ArtifactOutcome>,
}

impl ProvisionReport {
    pub fn failures(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.repositories
            .iter()
            .chain(self.models.iter())
            .filter(|outcome| !outcome.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

/// Drives `uninitialized -> initializing -> initialized` and then starts the
/// backend exactly once.
pub struct Initializer {
    provisioning: Arc<ProvisioningService>,
    status: Arc<StatusTracker>,
    manifest: Manifest,
}

impl Initializer {
    pub fn new(
        provisioning: Arc<ProvisioningService>,
        status: Arc<StatusTracker>,
        manifest: Manifest,
    ) -> Self {
        Self {
            provisioning,
            status,
            manifest,
        }
    }

    /// Repositories first, then weights. Each phase is a join barrier and
    /// individual failures never abort it.
    #[instrument(skip(self), fields(
        repositories = self.manifest.repositories.len(),
        models = self.manifest.models.len()
    ))]
    pub async fn provision(&self) -> ProvisionReport {
        let repositories = self
            .provisioning
            .pull_repositories(self.manifest.repositories.clone())
            .await;
        let models = self
            .provisioning
            .pull_weights(self.manifest.models.clone())
            .await;

        let report = ProvisionReport {
            repositories,
            models,
        };

        for failure in report.failures() {
            if let Err(e) = &failure.result {
                warn!(source = %failure.source, error = %e, "Artifact not provisioned");
            }
        }

        info!(failures = report.failure_count(), "Provisioning phases complete");
        report
    }

    /// Provision everything, mark the sidecar initialized and start the
    /// backend. Only a failed backend start is an error.
    pub async fn run(
        self,
        backend: &BackendConfig,
    ) -> Result<(ProvisionReport, SupervisedProcess), ProvisionError> {
        self.status.set_state(LifecycleState::Initializing);

        let report = self.provision().await;

        self.status.set_state(LifecycleState::Initialized);
        self.status.append_message("Initialization Finished!");
        self.status.append_message("Starting backend");

        let process = SupervisedProcess::start(backend)?;
        Ok((report, process))
    }
}
