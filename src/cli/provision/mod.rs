//! Provision command - runs both fetch phases and exits

use std::sync::Arc;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::domain::{Manifest, StatusTracker};
use crate::infrastructure::logging;
use crate::infrastructure::orchestrator::Initializer;

/// Fails when any artifact could not be provisioned
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let manifest = Manifest::load(&config.paths.nodes_manifest, &config.paths.models_manifest).await?;
    let status = Arc::new(StatusTracker::new());
    let provisioning = crate::create_provisioning_service(&config, status.clone())?;

    let report = Initializer::new(provisioning, status, manifest)
        .provision()
        .await;

    let failed = report.failure_count();
    if failed > 0 {
        for failure in report.failures() {
            if let Err(e) = &failure.result {
                error!(source = %failure.source, error = %e, "Artifact failed");
            }
        }
        anyhow::bail!("{} artifact(s) failed to provision", failed);
    }

    info!(
        repositories = report.repositories.len(),
        models = report.models.len(),
        "All artifacts provisioned"
    );

    Ok(())
}
