//! External command execution

mod process_runner;

#[cfg(test)]
pub mod fake;

pub use process_runner::ProcessCommandRunner;
