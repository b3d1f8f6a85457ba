//! Scripted command runner for tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::command::{CommandOutput, CommandRunner, CommandSpec};

/// Simulates `git clone` by creating the target directory (plus any seeded
/// files), answers `git pull` successfully, and returns scripted outcomes for
/// every other program. Every invocation is recorded.
#[derive(Debug, Default)]
pub struct FakeCommandRunner {
    calls: Mutex<Vec<CommandSpec>>,
    outcomes: Mutex<HashMap<String, CommandOutput>>,
    clone_files: Mutex<Vec<(String, Vec<u8>)>>,
    delay: Option<Duration>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering, so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Outcome for a program (`pip`, `python3`) or a git subcommand (`git clone`)
    pub fn with_outcome(self, key: impl Into<String>, output: CommandOutput) -> Self {
        self.outcomes.lock().unwrap().insert(key.into(), output);
        self
    }

    /// File created inside every simulated clone
    pub fn with_clone_file(self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.clone_files
            .lock()
            .unwrap()
            .push((name.into(), contents.into()));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|spec| Self::key(spec) == key)
            .count()
    }

    fn key(spec: &CommandSpec) -> String {
        if spec.program == "git" {
            format!("git {}", spec.subcommand().unwrap_or_default())
        } else {
            spec.program.clone()
        }
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = Self::key(spec);
        if let Some(output) = self.outcomes.lock().unwrap().get(&key).cloned() {
            return Ok(output);
        }

        if key == "git clone" {
            let target = PathBuf::from(spec.args.last().cloned().unwrap_or_default());
            if target.exists() {
                return Ok(CommandOutput::failure(
                    128,
                    format!("fatal: destination path '{}' already exists", target.display()),
                ));
            }

            std::fs::create_dir_all(&target)?;
            for (name, contents) in self.clone_files.lock().unwrap().iter() {
                std::fs::write(target.join(name), contents)?;
            }
        }

        Ok(CommandOutput::success())
    }
}
