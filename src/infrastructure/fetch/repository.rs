//! Clone-or-update of plugin repositories plus dependency installation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::partial::PartialPath;
use crate::config::InstallerConfig;
use crate::domain::{
    ArtifactLocation, CommandRunner, CommandSpec, ProvisionError, RepositoryRequest, StatusTracker,
};

/// Ensures `<nodes_root>/<repo>` mirrors a remote repository and that its
/// declared dependencies are installed.
pub struct RepositoryFetcher {
    runner: Arc<dyn CommandRunner>,
    status: Arc<StatusTracker>,
    nodes_root: PathBuf,
    host_prefix: String,
    installer: InstallerConfig,
}

impl RepositoryFetcher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        status: Arc<StatusTracker>,
        nodes_root: impl Into<PathBuf>,
        host_prefix: impl Into<String>,
        installer: InstallerConfig,
    ) -> Self {
        Self {
            runner,
            status,
            nodes_root: nodes_root.into(),
            host_prefix: host_prefix.into(),
            installer,
        }
    }

    pub fn locate(&self, request: &RepositoryRequest) -> Result<ArtifactLocation, ProvisionError> {
        ArtifactLocation::for_repository(&self.nodes_root, request, &self.host_prefix)
    }

    pub async fn fetch(&self, request: &RepositoryRequest) -> Result<PathBuf, ProvisionError> {
        let location = self.locate(request)?;
        self.fetch_into(request, &location).await
    }

    /// Update in place when the directory exists, clone otherwise, then install
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn fetch_into(
        &self,
        request: &RepositoryRequest,
        location: &ArtifactLocation,
    ) -> Result<PathBuf, ProvisionError> {
        let name = location.name();
        self.status
            .append_message(format!("Pulling nodes from {}", request.url));

        tokio::fs::create_dir_all(&self.nodes_root)
            .await
            .map_err(|e| ProvisionError::storage(&self.nodes_root, e))?;

        if location.is_present_dir().await {
            info!(dir = %location, "Repository present, updating");
            self.update(&request.url, location.path()).await?;
        } else {
            info!(dir = %location, "Cloning repository");
            self.clone_into_place(&request.url, &name, location.path())
                .await?;
        }

        self.install(&name, location.path()).await?;

        self.status
            .append_message(format!("Nodes {} pulled successfully", name));
        Ok(location.path().to_path_buf())
    }

    /// Clone next to `target` and rename into place once git succeeds, so an
    /// interrupted clone never leaves a checkout that later pulls would update
    async fn clone_into_place(
        &self,
        url: &str,
        name: &str,
        target: &Path,
    ) -> Result<(), ProvisionError> {
        let partial = PartialPath::new(
            self.nodes_root
                .join(format!(".{}.partial-{}", name, uuid::Uuid::new_v4())),
        );

        if let Err(e) = git_clone(self.runner.as_ref(), url, partial.path(), false).await {
            partial.discard().await;
            return Err(e);
        }

        partial
            .commit(target)
            .await
            .map_err(|e| ProvisionError::storage(target, e))
    }

    async fn update(&self, url: &str, dir: &Path) -> Result<(), ProvisionError> {
        let spec = CommandSpec::new("git")
            .arg("pull")
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0");

        run_step(self.runner.as_ref(), &spec)
            .await
            .map_err(|reason| ProvisionError::fetch_failed(url, reason))
    }

    /// Primary installer over the requirements file, falling back to the
    /// repository's install script. Repositories declaring neither are done.
    async fn install(&self, name: &str, dir: &Path) -> Result<(), ProvisionError> {
        let has_requirements = is_file(&dir.join(&self.installer.requirements_file)).await;
        let has_script = is_file(&dir.join(&self.installer.fallback_script)).await;

        if !has_requirements && !has_script {
            self.status
                .append_message(format!("No dependencies declared by nodes {}", name));
            return Ok(());
        }

        self.status
            .append_message(format!("Running install of nodes from {}", name));

        let primary_failure = if has_requirements {
            match self.primary_installer(dir) {
                Some(spec) => match run_step(self.runner.as_ref(), &spec).await {
                    Ok(()) => return Ok(()),
                    Err(reason) => reason,
                },
                None => "no primary installer configured".to_string(),
            }
        } else {
            format!("{} not found", self.installer.requirements_file)
        };

        if !has_script {
            return Err(ProvisionError::install_failed(name, primary_failure));
        }

        warn!(nodes = %name, reason = %primary_failure, "Primary installer failed, running fallback");

        let fallback = CommandSpec::new(&self.installer.fallback_interpreter)
            .arg(&self.installer.fallback_script)
            .current_dir(dir);

        run_step(self.runner.as_ref(), &fallback)
            .await
            .map_err(|reason| {
                ProvisionError::install_failed(
                    name,
                    format!("{}; fallback: {}", primary_failure, reason),
                )
            })
    }

    fn primary_installer(&self, dir: &Path) -> Option<CommandSpec> {
        let (program, args) = self.installer.pip.split_first()?;

        Some(
            CommandSpec::new(program)
                .args(args.iter().cloned())
                .arg(&self.installer.requirements_file)
                .current_dir(dir),
        )
    }
}

/// `git clone [--depth 1] <url> <target>` without interactive prompts
pub(crate) async fn git_clone(
    runner: &dyn CommandRunner,
    url: &str,
    target: &Path,
    shallow: bool,
) -> Result<(), ProvisionError> {
    let mut spec = CommandSpec::new("git").arg("clone");
    if shallow {
        spec = spec.args(["--depth", "1"]);
    }
    let spec = spec
        .arg(url)
        .path_arg(target)
        .env("GIT_TERMINAL_PROMPT", "0");

    run_step(runner, &spec)
        .await
        .map_err(|reason| ProvisionError::fetch_failed(url, reason))
}

async fn run_step(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<(), String> {
    match runner.run(spec).await {
        Ok(output) if output.is_success() => Ok(()),
        Ok(output) => Err(format!("`{}` failed with {}", spec, output.describe_failure())),
        Err(e) => Err(format!("`{}` could not be started: {}", spec, e)),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
