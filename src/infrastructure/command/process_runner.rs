use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::command::{CommandOutput, CommandRunner, CommandSpec};

/// Runs commands as child processes via `tokio::process`.
///
/// Children are killed when the returned future is dropped, so a timed-out
/// pull does not leave a stray `git` or `pip` behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommandRunner;

impl ProcessCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        debug!(command = %spec, cwd = ?spec.cwd, "Running command");

        let output = command.output().await?;
        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.is_success() {
            debug!(command = %spec, "Command succeeded");
        } else {
            warn!(
                command = %spec,
                code = ?result.code,
                stderr = %result.stderr.trim(),
                "Command failed"
            );
        }

        Ok(result)
    }
}
