//! The long-running backend process

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::domain::ProvisionError;

/// Handle to the backend started once provisioning completes. Output is
/// inherited so the backend logs straight to the sidecar's stdout/stderr.
#[derive(Debug)]
pub struct SupervisedProcess {
    child: Child,
    command: String,
}

impl SupervisedProcess {
    pub fn start(config: &BackendConfig) -> Result<Self, ProvisionError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| {
            ProvisionError::backend(format!("failed to start '{}': {}", config.command, e))
        })?;

        info!(command = %config.command, pid = ?child.id(), "Backend process started");

        Ok(Self {
            child,
            command: config.command.clone(),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Block until the backend exits on its own
    pub async fn wait(&mut self) -> Result<ExitStatus, ProvisionError> {
        let status = self.child.wait().await.map_err(|e| {
            ProvisionError::backend(format!("failed to wait on '{}': {}", self.command, e))
        })?;

        info!(command = %self.command, status = %status, "Backend process exited");
        Ok(status)
    }

    /// Ask the backend to terminate, give it `grace` to exit, then kill it
    pub async fn shutdown(mut self, grace: Duration) -> Result<ExitStatus, ProvisionError> {
        self.terminate();

        let waited = tokio::time::timeout(grace, self.wait()).await;
        match waited {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    command = %self.command,
                    grace_secs = grace.as_secs(),
                    "Backend did not exit in time, killing it"
                );
                self.child.kill().await.map_err(|e| {
                    ProvisionError::backend(format!("failed to kill '{}': {}", self.command, e))
                })?;
                self.wait().await
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // None once the child has been reaped
        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };

        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => info!(command = %self.command, pid, "Sent SIGTERM to backend"),
            Err(e) => warn!(command = %self.command, pid, error = %e, "Failed to signal backend"),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self) {}
}
