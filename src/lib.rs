//! Comfy provisioning sidecar
//!
//! Prepares the filesystem for a generative-media backend and then fronts it:
//! - Clones or updates custom node repositories and installs their dependencies
//! - Downloads model weights, or extracts them from model repositories
//! - Reports progress through a status endpoint
//! - Starts the backend once and reverse-proxies it under `/proxy`

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::proxy::ProxyTarget;
use api::state::AppState;
use domain::{CommandRunner, StatusTracker};
use infrastructure::{
    command::ProcessCommandRunner,
    fetch::{RepositoryFetcher, WeightFetcher},
    http::HttpClient,
    services::{ProvisioningService, ProvisioningServiceTrait},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire the fetchers to the real `git`/installer processes and HTTP client
pub fn create_provisioning_service(
    config: &AppConfig,
    status: Arc<StatusTracker>,
) -> anyhow::Result<Arc<ProvisioningService>> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessCommandRunner::new());
    let http = Arc::new(HttpClient::with_connect_timeout(CONNECT_TIMEOUT)?);

    let repositories = RepositoryFetcher::new(
        runner.clone(),
        status.clone(),
        &config.paths.custom_nodes_dir,
        &config.fetch.repository_host,
        config.installer.clone(),
    );
    let weights = WeightFetcher::new(
        http,
        runner,
        status.clone(),
        &config.paths.models_dir,
        &config.paths.scratch_dir,
        config.fetch.copy_buffer_size,
    );

    Ok(Arc::new(ProvisioningService::new(
        repositories,
        weights,
        status,
        config.fetch.timeout(),
    )))
}

/// Create the application state shared by the HTTP handlers
pub fn create_app_state(
    config: &AppConfig,
    status: Arc<StatusTracker>,
    provisioning: Arc<dyn ProvisioningServiceTrait>,
) -> anyhow::Result<AppState> {
    let proxy = ProxyTarget::new(&config.backend.proxy_url)?;
    Ok(AppState::new(status, provisioning, proxy))
}
